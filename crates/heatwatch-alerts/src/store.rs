//! Copy-on-write rule store.
//!
//! Writers clone the map and swap the `Arc`; readers hold a snapshot that
//! never changes underneath them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::error::AlertError;
use crate::rule::{AlertRule, NewAlertRule, RuleId};

pub type RuleMap = BTreeMap<RuleId, AlertRule>;

#[derive(Debug, Default)]
pub struct RuleStore {
    rules: RwLock<Arc<RuleMap>>,
    // Serializes read-modify-write so concurrent writers don't lose updates.
    write_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert a new active rule.
    pub fn add(&self, request: NewAlertRule) -> Result<AlertRule, AlertError> {
        validate(&request)?;

        let id = RuleId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let rule = AlertRule {
            id,
            location_key: request.location_key.trim().to_string(),
            location_name: request.location_name.trim().to_string(),
            threshold: request.threshold,
            email: request.email.trim().to_string(),
            phone: request
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            active: true,
            created_at: Utc::now(),
        };

        self.update(|rules| {
            rules.insert(id, rule.clone());
        });
        tracing::info!(
            "Added alert rule {} for {} above {}°C",
            id,
            rule.location_name,
            rule.threshold
        );
        Ok(rule)
    }

    pub fn remove(&self, id: RuleId) -> Option<AlertRule> {
        let removed = self.update(|rules| rules.remove(&id));
        if removed.is_some() {
            tracing::info!("Removed alert rule {}", id);
        }
        removed
    }

    /// Toggle a rule. The only mutation a rule allows after creation.
    pub fn set_active(&self, id: RuleId, active: bool) -> Result<AlertRule, AlertError> {
        self.update(|rules| {
            let rule = rules.get_mut(&id).ok_or(AlertError::RuleNotFound(id))?;
            rule.active = active;
            Ok(rule.clone())
        })
    }

    pub fn get(&self, id: RuleId) -> Option<AlertRule> {
        self.rules.read().get(&id).cloned()
    }

    /// All rules ordered by id.
    pub fn list(&self) -> Vec<AlertRule> {
        self.snapshot().values().cloned().collect()
    }

    pub fn snapshot(&self) -> Arc<RuleMap> {
        Arc::clone(&self.rules.read())
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    fn update<T>(&self, mutate: impl FnOnce(&mut RuleMap) -> T) -> T {
        let _guard = self.write_lock.lock();
        let mut next = RuleMap::clone(&self.rules.read());
        let result = mutate(&mut next);
        *self.rules.write() = Arc::new(next);
        result
    }
}

fn validate(request: &NewAlertRule) -> Result<(), AlertError> {
    if request.location_key.trim().is_empty() {
        return Err(AlertError::InvalidRule("location is required".to_string()));
    }
    if request.email.trim().is_empty() {
        return Err(AlertError::InvalidRule("email is required".to_string()));
    }
    if !request.threshold.is_finite() {
        return Err(AlertError::InvalidRule(
            "threshold must be a number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn madrid(threshold: f64) -> NewAlertRule {
        NewAlertRule::new("308526", "Madrid", threshold, "ops@example.com")
    }

    #[test]
    fn test_ids_increase() {
        let store = RuleStore::new();
        let a = store.add(madrid(35.0)).unwrap();
        let b = store.add(madrid(38.0)).unwrap();

        assert!(b.id > a.id);
        assert!(a.active);
        assert_eq!(store.len(), 2);
        let ids: Vec<RuleId> = store.list().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn test_validation() {
        let store = RuleStore::new();

        let err = store
            .add(NewAlertRule::new("308526", "Madrid", 35.0, "  "))
            .unwrap_err();
        assert!(matches!(err, AlertError::InvalidRule(_)));

        let err = store
            .add(NewAlertRule::new("", "Madrid", 35.0, "a@example.com"))
            .unwrap_err();
        assert!(matches!(err, AlertError::InvalidRule(_)));

        assert!(store.add(madrid(f64::NAN)).is_err());
        assert!(store.add(madrid(f64::INFINITY)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_blank_phone_is_dropped() {
        let store = RuleStore::new();
        let rule = store.add(madrid(35.0).with_phone("  ")).unwrap();
        assert!(rule.phone.is_none());
    }

    #[test]
    fn test_snapshot_unaffected_by_later_writes() {
        let store = RuleStore::new();
        let rule = store.add(madrid(35.0)).unwrap();
        let snapshot = store.snapshot();

        store.set_active(rule.id, false).unwrap();
        store.add(madrid(40.0)).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[&rule.id].active);
        assert!(!store.get(rule.id).unwrap().active);
    }

    #[test]
    fn test_remove_and_missing() {
        let store = RuleStore::new();
        let rule = store.add(madrid(35.0)).unwrap();

        assert_eq!(store.remove(rule.id).map(|r| r.id), Some(rule.id));
        assert!(store.remove(rule.id).is_none());
        assert_eq!(
            store.set_active(rule.id, true),
            Err(AlertError::RuleNotFound(rule.id))
        );
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let store = Arc::new(RuleStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.add(madrid(30.0 + i as f64)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 200);
    }
}
