//! Task status transition rules.

use super::types::TaskStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

pub struct StatusTransition;

impl StatusTransition {
    /// Within a run a task moves `pending → downloading → terminal` and never
    /// skips `downloading`. Any status may be reset to `pending` by a new
    /// run; re-applying the current status is a no-op.
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        let is_valid = match (from, to) {
            (a, b) if a == b => true,
            (_, TaskStatus::Pending) => true,
            (TaskStatus::Pending, TaskStatus::Downloading) => true,
            (TaskStatus::Downloading, t) if t.is_terminal() => true,
            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use TaskStatus::*;
        assert!(StatusTransition::validate(Pending, Downloading).is_ok());
        assert!(StatusTransition::validate(Downloading, Completed).is_ok());
        assert!(StatusTransition::validate(Downloading, Error).is_ok());
        assert!(StatusTransition::validate(Downloading, Cancelled).is_ok());
        assert!(StatusTransition::validate(Completed, Pending).is_ok());
        assert!(StatusTransition::validate(Completed, Completed).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        use TaskStatus::*;
        assert!(StatusTransition::validate(Pending, Completed).is_err());
        assert!(StatusTransition::validate(Pending, Error).is_err());
        assert!(StatusTransition::validate(Completed, Downloading).is_err());
        assert!(StatusTransition::validate(Error, Completed).is_err());
    }
}
