//! One-way review state machine shared by role requests, donation requests
//! and donations
//!
//! ```text
//! pending --approve--> approved
//! pending --reject---> rejected
//! ```
//!
//! Terminal states never transition again; deciding twice is a conflict.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{WorkflowError, WorkflowResult};

/// Review status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Admin decision applied to a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }

    /// Apply a decision, failing with a conflict when already decided
    pub fn decide(self, decision: Decision) -> WorkflowResult<ReviewStatus> {
        if self.is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "request has already been {}",
                self
            )));
        }

        Ok(match decision {
            Decision::Approve => ReviewStatus::Approved,
            Decision::Reject => ReviewStatus::Rejected,
        })
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(WorkflowError::Validation(format!(
                "Unknown review status: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transitions() {
        assert_eq!(
            ReviewStatus::Pending.decide(Decision::Approve).unwrap(),
            ReviewStatus::Approved
        );
        assert_eq!(
            ReviewStatus::Pending.decide(Decision::Reject).unwrap(),
            ReviewStatus::Rejected
        );
    }

    #[test]
    fn test_terminal_states_conflict_for_any_decision() {
        for status in [ReviewStatus::Approved, ReviewStatus::Rejected] {
            for decision in [Decision::Approve, Decision::Reject] {
                let err = status.decide(decision).unwrap_err();
                assert_eq!(err.kind(), "conflict");
            }
        }
    }

    #[test]
    fn test_parse_round_trips_storage_names() {
        for status in [
            ReviewStatus::Pending,
            ReviewStatus::Approved,
            ReviewStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ReviewStatus>().unwrap(), status);
        }
        assert!("done".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn test_decision_deserializes_from_action() {
        let decision: Decision = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(decision, Decision::Approve);
        let decision: Decision = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(decision, Decision::Reject);
    }
}
