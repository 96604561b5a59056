//! Experiment status labels
//!
//! The gateway advances an experiment through these states; this crate only
//! reads and classifies them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle state of a submitted experiment
///
/// Forward order: `CREATED → VALIDATED → SCHEDULED → LAUNCHED → EXECUTING`,
/// then `CANCELING → CANCELED`, `COMPLETED` or `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperimentState {
    Created,
    Validated,
    Scheduled,
    Launched,
    Executing,
    Canceling,
    Canceled,
    Completed,
    Failed,
}

impl ExperimentState {
    /// All states in forward order
    pub fn all() -> &'static [ExperimentState] {
        &[
            ExperimentState::Created,
            ExperimentState::Validated,
            ExperimentState::Scheduled,
            ExperimentState::Launched,
            ExperimentState::Executing,
            ExperimentState::Canceling,
            ExperimentState::Canceled,
            ExperimentState::Completed,
            ExperimentState::Failed,
        ]
    }

    /// Upper-case label as reported by the gateway
    pub fn label(&self) -> &'static str {
        match self {
            ExperimentState::Created => "CREATED",
            ExperimentState::Validated => "VALIDATED",
            ExperimentState::Scheduled => "SCHEDULED",
            ExperimentState::Launched => "LAUNCHED",
            ExperimentState::Executing => "EXECUTING",
            ExperimentState::Canceling => "CANCELING",
            ExperimentState::Canceled => "CANCELED",
            ExperimentState::Completed => "COMPLETED",
            ExperimentState::Failed => "FAILED",
        }
    }

    /// True for `CANCELED`, `COMPLETED` and `FAILED`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExperimentState::Canceled | ExperimentState::Completed | ExperimentState::Failed
        )
    }

    /// Map a gateway numeric status code
    pub fn from_code(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::all().get(i).copied())
            .ok_or_else(|| Error::ProtocolMalformed {
                message: format!("unknown experiment state code {}", code),
            })
    }
}

/// Free-standing form of [`ExperimentState::is_terminal`]
pub fn is_terminal(state: ExperimentState) -> bool {
    state.is_terminal()
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExperimentState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        // the gateway has spelled this one both ways
        let upper = match upper.as_str() {
            "CANCELLING" => "CANCELING".to_string(),
            "CANCELLED" => "CANCELED".to_string(),
            _ => upper,
        };
        Self::all()
            .iter()
            .copied()
            .find(|state| state.label() == upper)
            .ok_or_else(|| Error::ProtocolMalformed {
                message: format!("unknown experiment state '{}'", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification_table() {
        let table = [
            (ExperimentState::Created, false),
            (ExperimentState::Validated, false),
            (ExperimentState::Scheduled, false),
            (ExperimentState::Launched, false),
            (ExperimentState::Executing, false),
            (ExperimentState::Canceling, false),
            (ExperimentState::Canceled, true),
            (ExperimentState::Completed, true),
            (ExperimentState::Failed, true),
        ];
        assert_eq!(table.len(), ExperimentState::all().len());
        for (state, terminal) in table {
            assert_eq!(is_terminal(state), terminal, "{}", state);
        }
    }

    #[test]
    fn test_parse_labels() {
        for state in ExperimentState::all() {
            assert_eq!(state.label().parse::<ExperimentState>().unwrap(), *state);
        }
        assert_eq!("executing".parse::<ExperimentState>().unwrap(), ExperimentState::Executing);
        assert_eq!("CANCELLED".parse::<ExperimentState>().unwrap(), ExperimentState::Canceled);
        assert!("QUEUED".parse::<ExperimentState>().is_err());
    }

    #[test]
    fn test_from_code() {
        assert_eq!(ExperimentState::from_code(0).unwrap(), ExperimentState::Created);
        assert_eq!(ExperimentState::from_code(7).unwrap(), ExperimentState::Completed);
        assert!(ExperimentState::from_code(9).is_err());
        assert!(ExperimentState::from_code(-1).is_err());
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&ExperimentState::Canceling).unwrap();
        assert_eq!(json, "\"CANCELING\"");
    }
}
