use async_trait::async_trait;
use confab_llm::{LlmError, Moderation, ModerationModel};
use regex::{Regex, RegexBuilder};

/// Offline moderation: flags text containing any listed word. Matching is on
/// whole words and ignores case.
#[derive(Debug, Clone)]
pub struct BlocklistModeration {
    rules: Vec<(String, Regex)>,
}

impl BlocklistModeration {
    pub fn new() -> Self {
        Self { rules: vec![] }
    }

    /// Flag `words` under `category`
    pub fn block(mut self, category: &str, words: &[&str]) -> Result<Self, LlmError> {
        if words.is_empty() {
            return Ok(self);
        }
        let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
        let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| LlmError::Configuration(format!("invalid blocklist: {}", e)))?;
        self.rules.push((category.to_string(), regex));
        Ok(self)
    }

    /// A small violence and self-harm list, enough for demos and tests
    pub fn with_default_rules() -> Result<Self, LlmError> {
        Self::new()
            .block("violence", &["kill", "murder", "shoot", "stab", "behead"])?
            .block("self-harm", &["suicide", "self-harm"])
    }
}

impl Default for BlocklistModeration {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModerationModel for BlocklistModeration {
    async fn moderate(&self, text: &str) -> Result<Moderation, LlmError> {
        let categories: Vec<String> = self
            .rules
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(category, _)| category.clone())
            .collect();
        if categories.is_empty() {
            Ok(Moderation::allowed())
        } else {
            Ok(Moderation::flagged(categories))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flags_shouting_threat() {
        let moderation = BlocklistModeration::with_default_rules().unwrap();
        let verdict = moderation.moderate("I WILL KILL YOU!!!").await.unwrap();
        assert!(verdict.flagged);
        assert_eq!(verdict.categories, vec!["violence".to_string()]);
    }

    #[tokio::test]
    async fn test_whole_words_only() {
        let moderation = BlocklistModeration::with_default_rules().unwrap();
        assert!(!moderation.moderate("the skill tree of this game").await.unwrap().flagged);
        assert!(!moderation.moderate("Hello, how are you?").await.unwrap().flagged);
    }

    #[tokio::test]
    async fn test_empty_list_allows_everything() {
        let moderation = BlocklistModeration::default();
        assert_eq!(moderation.moderate("kill").await.unwrap(), Moderation::allowed());
    }
}
