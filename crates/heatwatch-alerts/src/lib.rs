//! Temperature alert rules and their periodic evaluation
//!
//! Rules live in a copy-on-write [`RuleStore`]. [`evaluate`] checks them
//! against a snapshot of readings, and [`PollScheduler`] runs that check on an
//! interval until stopped.

pub mod engine;
pub mod error;
pub mod rule;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod test_support;

pub use engine::evaluate;
pub use error::AlertError;
pub use rule::{AlertRule, NewAlertRule, RuleId};
pub use scheduler::{AlertReport, PollScheduler, DEFAULT_POLL_INTERVAL};
pub use store::{RuleMap, RuleStore};
