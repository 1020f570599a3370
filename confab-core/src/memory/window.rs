use std::collections::VecDeque;
use confab_llm::Message;
use tracing::debug;

/// Bounded conversation for one id. The system message is pinned at the front
/// and never evicted, the oldest other messages go first.
#[derive(Debug, Clone)]
pub struct MemoryWindow {
    id: String,
    max_messages: usize,
    system: Option<Message>,
    messages: VecDeque<Message>,
}

impl MemoryWindow {
    pub fn new(id: impl Into<String>, max_messages: usize) -> Self {
        Self {
            id: id.into(),
            max_messages: max_messages.max(1),
            system: None,
            messages: VecDeque::new(),
        }
    }

    /// Rebuild a window from persisted messages, the bound is applied right away
    pub fn restore(id: impl Into<String>, max_messages: usize, messages: Vec<Message>) -> Self {
        let mut window = Self::new(id, max_messages);
        for message in messages {
            window.push(message);
        }
        window.enforce();
        window
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn len(&self) -> usize {
        self.messages.len() + usize::from(self.system.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn system(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    /// Messages in conversation order, system message first
    pub fn messages(&self) -> Vec<Message> {
        self.system.iter().chain(self.messages.iter()).cloned().collect()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back().or(self.system.as_ref())
    }

    /// Append and evict, returns how many messages were evicted
    pub fn append(&mut self, message: Message) -> usize {
        self.push(message);
        self.enforce()
    }

    pub fn append_all(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        for message in messages {
            self.push(message);
        }
        self.enforce()
    }

    /// A system message replaces the pinned one instead of adding a second
    fn push(&mut self, message: Message) {
        if message.is_system() {
            self.system = Some(message);
        } else {
            self.messages.push_back(message);
        }
    }

    fn enforce(&mut self) -> usize {
        let mut evicted = 0;
        while self.len() > self.max_messages {
            let Some(_) = self.messages.pop_front() else {
                break;
            };
            evicted += 1;
            evicted += self.drop_orphans();
        }
        // a restored or badly ordered history may start with results
        evicted += self.drop_orphans();

        if evicted > 0 {
            debug!(target: "memory", id = %self.id, evicted, len = self.len(), "window evicted messages");
        }
        evicted
    }

    /// Tool results whose request is gone have to leave with it
    fn drop_orphans(&mut self) -> usize {
        let mut dropped = 0;
        while matches!(self.messages.front(), Some(Message::ToolResult { .. })) {
            self.messages.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.system = None;
        self.messages.clear();
    }
}
