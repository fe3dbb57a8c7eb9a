//! Threshold evaluation over a reading snapshot.

use heatwatch_weather::Readings;

use crate::rule::AlertRule;
use crate::store::RuleMap;

/// Rules triggered by `readings`, ordered by id.
///
/// A rule triggers when it is active, its location has a reading, and that
/// reading is strictly above the threshold. Pure: the same inputs always give
/// the same output, and nothing remembers earlier triggers.
pub fn evaluate(rules: &RuleMap, readings: &Readings) -> Vec<AlertRule> {
    rules
        .values()
        .filter(|rule| rule.active)
        .filter(|rule| {
            readings
                .get(&rule.location_key)
                .is_some_and(|located| rule.is_exceeded_by(located.reading.temperature))
        })
        .cloned()
        .collect()
}
