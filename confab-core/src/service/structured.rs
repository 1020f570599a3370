// Decoding the final assistant text into typed values
use confab_llm::{parameters_schema_for, ResponseFormat};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ServiceError;

/// How a turn has to be shaped so that its answer decodes into `T`
#[derive(Debug, Clone, PartialEq)]
pub struct OutputShape {
    pub instructions: Option<String>,
    pub response_format: Option<ResponseFormat>,
}

impl OutputShape {
    pub fn of<T: JsonSchema>() -> Self {
        let schema = parameters_schema_for::<T>();
        let instructions = format_instructions(&schema);
        let response_format = match schema.get("type").and_then(Value::as_str) {
            Some("object") => Some(ResponseFormat::JsonObject),
            _ => None,
        };
        Self { instructions, response_format }
    }

    /// The user text with the format instructions appended
    pub fn apply(&self, text: &str) -> String {
        match &self.instructions {
            Some(instructions) => format!("{}\n{}", text, instructions),
            None => text.to_string(),
        }
    }
}

fn enum_values(schema: &Value) -> Option<Vec<String>> {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        return Some(values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());
    }
    // schemars describes documented unit variants as oneOf const
    let variants = schema.get("oneOf").and_then(Value::as_array)?;
    variants
        .iter()
        .map(|v| v.get("const").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn format_instructions(schema: &Value) -> Option<String> {
    if let Some(values) = enum_values(schema) {
        return Some(format!("You must answer strictly with one of these values: {}", values.join(", ")));
    }
    match schema.get("type").and_then(Value::as_str)? {
        "boolean" => Some("You must answer strictly with one of these values: true, false".to_string()),
        "integer" => Some("You must answer strictly with an integer number".to_string()),
        "number" => Some("You must answer strictly with a number".to_string()),
        "object" | "array" => Some(format!(
            "You must answer strictly with JSON following this schema, without any other text:\n{}",
            serde_json::to_string_pretty(schema).unwrap_or_default()
        )),
        _ => None,
    }
}

/// Content of a ```json fenced block, or the trimmed text
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode the answer of a model into `T`. Bare words work for strings and
/// unit enums, `True.` works for booleans.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ServiceError> {
    let body = strip_fence(text);

    let first_error = match serde_json::from_str::<T>(body) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    if let Ok(value) = serde_json::from_value::<T>(Value::String(body.to_string())) {
        return Ok(value);
    }
    let word = body.trim_end_matches(['.', '!']).trim();
    if let Ok(value) = serde_json::from_str::<T>(&word.to_lowercase()) {
        return Ok(value);
    }
    if let Ok(value) = serde_json::from_value::<T>(Value::String(word.to_string())) {
        return Ok(value);
    }

    let excerpt: String = body.chars().take(200).collect();
    Err(ServiceError::ResponseDecode(format!("{} in {:?}", first_error, excerpt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(clippy::upper_case_acronyms)]
    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    enum Sentiment {
        POSITIVE,
        NEUTRAL,
        NEGATIVE,
    }

    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    struct Person {
        first_name: String,
        last_name: String,
        age: u32,
    }

    #[test]
    fn test_decode_bool() {
        assert!(decode::<bool>("true").unwrap());
        assert!(!decode::<bool>(" False. ").unwrap());
        assert!(decode::<bool>("maybe").is_err());
    }

    #[test]
    fn test_decode_enum() {
        assert_eq!(decode::<Sentiment>("POSITIVE").unwrap(), Sentiment::POSITIVE);
        assert_eq!(decode::<Sentiment>("\"NEGATIVE\"").unwrap(), Sentiment::NEGATIVE);
        assert!(matches!(decode::<Sentiment>("happy"), Err(ServiceError::ResponseDecode(_))));
    }

    #[test]
    fn test_decode_struct_in_fence() {
        let text = "```json\n{\"first_name\": \"John\", \"last_name\": \"Doe\", \"age\": 42}\n```";
        assert_eq!(
            decode::<Person>(text).unwrap(),
            Person { first_name: "John".to_string(), last_name: "Doe".to_string(), age: 42 }
        );
    }

    #[test]
    fn test_shape_of_struct_asks_for_json() {
        let shape = OutputShape::of::<Person>();
        assert_eq!(shape.response_format, Some(ResponseFormat::JsonObject));
        let text = shape.apply("Extract the person");
        assert!(text.starts_with("Extract the person\n"));
        assert!(text.contains("first_name"));
    }

    #[test]
    fn test_shape_of_enum_lists_values() {
        let shape = OutputShape::of::<Sentiment>();
        assert_eq!(shape.response_format, None);
        assert_eq!(
            shape.instructions.as_deref(),
            Some("You must answer strictly with one of these values: POSITIVE, NEUTRAL, NEGATIVE")
        );
    }

    #[test]
    fn test_shape_of_bool() {
        let shape = OutputShape::of::<bool>();
        assert!(shape.instructions.unwrap().contains("true, false"));
    }

    #[test]
    fn test_shape_of_string_is_plain() {
        assert_eq!(OutputShape::of::<String>(), OutputShape { instructions: None, response_format: None });
    }
}
