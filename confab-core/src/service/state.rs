use std::fmt;
use tracing::debug;

use super::error::ServiceError;

/// Where a turn is. Legal paths:
/// AwaitingUserInput -> ModerationCheck? -> ModelCall -> (ToolExecution -> ModelCall)* -> Done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    AwaitingUserInput,
    ModerationCheck,
    ModelCall { round: usize },
    ToolExecution { round: usize, calls: usize },
    Done,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::AwaitingUserInput => write!(f, "awaiting_user_input"),
            TurnState::ModerationCheck => write!(f, "moderation_check"),
            TurnState::ModelCall { round } => write!(f, "model_call[{}]", round),
            TurnState::ToolExecution { round, calls } => write!(f, "tool_execution[{}]x{}", round, calls),
            TurnState::Done => write!(f, "done"),
        }
    }
}

impl TurnState {
    pub fn can_transition_to(&self, next: &TurnState) -> bool {
        use TurnState::*;
        match (self, next) {
            (AwaitingUserInput, ModerationCheck) => true,
            (AwaitingUserInput, ModelCall { round: 0 }) => true,
            (ModerationCheck, ModelCall { round: 0 }) => true,
            (ModelCall { round }, ToolExecution { round: next, .. }) => *next == round + 1,
            (ModelCall { .. }, Done) => true,
            (ToolExecution { round, .. }, ModelCall { round: next }) => next == round,
            _ => false,
        }
    }
}

/// Tracks one turn and refuses illegal moves
#[derive(Debug)]
pub struct TurnMachine {
    id: String,
    state: TurnState,
    trace: Vec<TurnState>,
}

impl TurnMachine {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: TurnState::AwaitingUserInput,
            trace: vec![TurnState::AwaitingUserInput],
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    /// Every state visited so far, starting with `AwaitingUserInput`
    pub fn trace(&self) -> &[TurnState] {
        &self.trace
    }

    pub fn transition(&mut self, next: TurnState) -> Result<(), ServiceError> {
        if !self.state.can_transition_to(&next) {
            return Err(ServiceError::InvalidStateTransition(format!("{} -> {}", self.state, next)));
        }
        debug!(target: "service::state", id = %self.id, from = %self.state, to = %next);
        self.state = next.clone();
        self.trace.push(next);
        Ok(())
    }
}
