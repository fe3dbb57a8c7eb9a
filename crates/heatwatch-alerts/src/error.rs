//! Alert-specific error types.

use thiserror::Error;

use crate::rule::RuleId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("Invalid alert rule: {0}")]
    InvalidRule(String),

    #[error("Alert rule not found: {0}")]
    RuleNotFound(RuleId),

    #[error("Poll interval must be greater than zero")]
    InvalidInterval,
}

impl AlertError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidRule(_) => "Alert details are incomplete. Check the location and email.",
            Self::RuleNotFound(_) => "Alert not found",
            Self::InvalidInterval => "Check interval must be at least one second",
        }
    }
}
