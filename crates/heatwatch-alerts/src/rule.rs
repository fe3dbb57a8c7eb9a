use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-unique rule identifier, increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A temperature threshold watched for one location.
///
/// Everything except `active` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: RuleId,
    pub location_key: String,
    pub location_name: String,
    /// Degrees Celsius; triggers strictly above.
    pub threshold: f64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Whether `temperature` breaches this rule's threshold.
    pub fn is_exceeded_by(&self, temperature: f64) -> bool {
        temperature > self.threshold
    }
}

/// Request to create a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlertRule {
    pub location_key: String,
    pub location_name: String,
    pub threshold: f64,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl NewAlertRule {
    pub fn new(
        location_key: impl Into<String>,
        location_name: impl Into<String>,
        threshold: f64,
        email: impl Into<String>,
    ) -> Self {
        Self {
            location_key: location_key.into(),
            location_name: location_name.into(),
            threshold,
            email: email.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let rule = AlertRule {
            id: RuleId(1),
            location_key: "308526".into(),
            location_name: "Madrid".into(),
            threshold: 35.0,
            email: "a@example.com".into(),
            phone: None,
            active: true,
            created_at: Utc::now(),
        };

        assert!(!rule.is_exceeded_by(35.0));
        assert!(rule.is_exceeded_by(35.5));
        assert!(!rule.is_exceeded_by(20.0));
    }

    #[test]
    fn test_new_rule_builder() {
        let rule = NewAlertRule::new("1", "Madrid", 35.0, "a@example.com").with_phone("+34 600");
        assert_eq!(rule.phone.as_deref(), Some("+34 600"));
    }
}
