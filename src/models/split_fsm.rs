use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::LedgerError;

/// States of a split execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitExecutionState {
    Pending,
    Processed,
    Failed,
}

impl SplitExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SplitExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events driving the split execution lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitExecutionEvent {
    Process,
    Fail,
    /// Admin retry action; the only way out of Failed.
    Retry,
}

/// The split execution state machine:
/// pending -> processed, pending -> failed, failed -> pending (retry).
/// Processed is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitExecutionStateMachine {
    pub state: SplitExecutionState,
}

impl SplitExecutionStateMachine {
    pub fn new() -> Self {
        Self { state: SplitExecutionState::Pending }
    }

    pub fn from_state(state: SplitExecutionState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> SplitExecutionState {
        self.state
    }

    /// Consumes an event and transitions the state.
    /// Returns the previous state on success.
    pub fn consume(
        &mut self,
        event: SplitExecutionEvent,
    ) -> Result<SplitExecutionState, LedgerError> {
        let prev = self.state;
        let next = match (prev, event) {
            (SplitExecutionState::Pending, SplitExecutionEvent::Process) => {
                SplitExecutionState::Processed
            }
            (SplitExecutionState::Pending, SplitExecutionEvent::Fail) => {
                SplitExecutionState::Failed
            }
            (SplitExecutionState::Failed, SplitExecutionEvent::Retry) => {
                SplitExecutionState::Pending
            }
            _ => {
                return Err(LedgerError::InvalidStateTransition {
                    from: prev.as_str().to_string(),
                    to: format!("{:?}", event),
                })
            }
        };
        self.state = next;
        Ok(prev)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SplitExecutionState::Processed)
    }
}

impl Default for SplitExecutionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SplitExecutionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let mut fsm = SplitExecutionStateMachine::new();
        assert_eq!(fsm.consume(SplitExecutionEvent::Process).unwrap(), SplitExecutionState::Pending);
        assert_eq!(fsm.state(), SplitExecutionState::Processed);
        assert!(fsm.is_terminal());
    }

    #[test]
    fn test_fail_then_retry() {
        let mut fsm = SplitExecutionStateMachine::new();
        fsm.consume(SplitExecutionEvent::Fail).unwrap();
        assert_eq!(fsm.state(), SplitExecutionState::Failed);
        assert!(!fsm.is_terminal());

        fsm.consume(SplitExecutionEvent::Retry).unwrap();
        assert_eq!(fsm.state(), SplitExecutionState::Pending);
        fsm.consume(SplitExecutionEvent::Process).unwrap();
        assert_eq!(fsm.state(), SplitExecutionState::Processed);
    }

    #[test]
    fn test_processed_is_terminal() {
        let mut fsm = SplitExecutionStateMachine::new();
        fsm.consume(SplitExecutionEvent::Process).unwrap();
        assert!(fsm.consume(SplitExecutionEvent::Retry).is_err());
        assert!(fsm.consume(SplitExecutionEvent::Fail).is_err());
    }

    #[test]
    fn test_pending_cannot_retry() {
        let mut fsm = SplitExecutionStateMachine::new();
        let err = fsm.consume(SplitExecutionEvent::Retry).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE_TRANSITION");
    }
}
