/// Chooses the system message of a conversation from its id. The text is a
/// template rendered with the variables of the turn.
pub trait SystemMessageProvider: Send + Sync {
    fn system_message(&self, id: &str) -> Option<String>;
}

impl<F> SystemMessageProvider for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn system_message(&self, id: &str) -> Option<String> {
        self(id)
    }
}
