//! Periodic alert evaluation over cached readings.
//!
//! The scheduler never fetches; it only reads whatever the reading store
//! holds at each tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use heatwatch_weather::ReadingStore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::evaluate;
use crate::error::AlertError;
use crate::rule::AlertRule;
use crate::store::RuleStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Result of one evaluation pass
#[derive(Debug, Clone)]
pub struct AlertReport {
    /// Triggered rules, ordered by id
    pub triggered: Vec<AlertRule>,
    pub rules_evaluated: usize,
    pub readings_evaluated: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl AlertReport {
    pub fn has_alerts(&self) -> bool {
        !self.triggered.is_empty()
    }
}

struct Schedule {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Schedule {
    /// Cancel and wait for the task to exit.
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::error!("Alert schedule task panicked: {}", e);
            }
        }
    }
}

/// Drives the rule engine on a fixed interval.
pub struct PollScheduler {
    rules: Arc<RuleStore>,
    readings: Arc<ReadingStore>,
    schedule: Mutex<Option<Schedule>>,
    evaluations: Arc<AtomicU64>,
}

impl PollScheduler {
    pub fn new(rules: Arc<RuleStore>, readings: Arc<ReadingStore>) -> Self {
        Self {
            rules,
            readings,
            schedule: Mutex::new(None),
            evaluations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start evaluating every `interval`, replacing any running schedule.
    ///
    /// The first evaluation happens one interval from now. The previous
    /// schedule, if any, is stopped before the new one starts, which closes
    /// its report channel.
    pub async fn start(
        &self,
        interval: Duration,
    ) -> Result<UnboundedReceiver<AlertReport>, AlertError> {
        if interval.is_zero() {
            return Err(AlertError::InvalidInterval);
        }

        let mut slot = self.schedule.lock().await;
        if let Some(previous) = slot.take() {
            tracing::debug!("Replacing running alert schedule");
            previous.shutdown().await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.rules),
            Arc::clone(&self.readings),
            Arc::clone(&self.evaluations),
            interval,
            cancel.clone(),
            tx,
        ));
        *slot = Some(Schedule { cancel, handle });

        tracing::info!("Alert checks scheduled every {:?}", interval);
        Ok(rx)
    }

    /// Stop the schedule. Returns whether one was running.
    ///
    /// Once this returns no further evaluation happens.
    pub async fn stop(&self) -> bool {
        let previous = self.schedule.lock().await.take();
        match previous {
            Some(schedule) => {
                schedule.shutdown().await;
                tracing::info!("Alert checks stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.schedule
            .lock()
            .await
            .as_ref()
            .is_some_and(|schedule| !schedule.handle.is_finished())
    }

    /// One-off evaluation outside the schedule.
    pub fn evaluate_now(&self) -> AlertReport {
        evaluate_stores(&self.rules, &self.readings, &self.evaluations)
    }

    /// Evaluations performed so far, scheduled or not.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.load(Ordering::SeqCst)
    }
}

async fn run_schedule(
    rules: Arc<RuleStore>,
    readings: Arc<ReadingStore>,
    evaluations: Arc<AtomicU64>,
    period: Duration,
    cancel: CancellationToken,
    tx: UnboundedSender<AlertReport>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let report = evaluate_stores(&rules, &readings, &evaluations);
                if tx.send(report).is_err() {
                    tracing::debug!("Alert report receiver dropped, ending schedule");
                    break;
                }
            }
        }
    }
}

fn evaluate_stores(
    rules: &RuleStore,
    readings: &ReadingStore,
    evaluations: &AtomicU64,
) -> AlertReport {
    let rule_snapshot = rules.snapshot();
    let reading_snapshot = readings.snapshot();
    let triggered = evaluate(&rule_snapshot, &reading_snapshot);
    evaluations.fetch_add(1, Ordering::SeqCst);

    tracing::debug!(
        "Evaluated {} rules against {} readings, {} triggered",
        rule_snapshot.len(),
        reading_snapshot.len(),
        triggered.len()
    );

    AlertReport {
        triggered,
        rules_evaluated: rule_snapshot.len(),
        readings_evaluated: reading_snapshot.len(),
        evaluated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::NewAlertRule;
    use crate::test_support::readings;

    fn scheduler_with(
        rules: &[NewAlertRule],
        entries: &[(&str, f64)],
    ) -> (PollScheduler, Arc<RuleStore>, Arc<ReadingStore>) {
        let rule_store = Arc::new(RuleStore::new());
        for rule in rules {
            rule_store.add(rule.clone()).unwrap();
        }
        let reading_store = Arc::new(ReadingStore::new());
        reading_store.set_readings(readings(entries));
        let scheduler = PollScheduler::new(rule_store.clone(), reading_store.clone());
        (scheduler, rule_store, reading_store)
    }

    fn madrid_rule() -> NewAlertRule {
        NewAlertRule::new("308526", "Madrid", 35.0, "ops@example.com")
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (scheduler, _, _) = scheduler_with(&[], &[]);
        assert!(matches!(
            scheduler.start(Duration::ZERO).await,
            Err(AlertError::InvalidInterval)
        ));
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let (scheduler, _, _) = scheduler_with(&[madrid_rule()], &[("308526", 38.0)]);
        let started = Instant::now();

        let mut rx = scheduler.start(Duration::from_secs(60)).await.unwrap();
        let report = rx.recv().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(report.triggered[0].location_name, "Madrid");
        assert_eq!(report.rules_evaluated, 1);
        assert_eq!(report.readings_evaluated, 1);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_follow_latest_readings() {
        let (scheduler, _, reading_store) =
            scheduler_with(&[madrid_rule()], &[("308526", 35.0)]);

        let mut rx = scheduler.start(Duration::from_secs(10)).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert!(!first.has_alerts());

        reading_store.set_readings(readings(&[("308526", 38.0)]));
        let second = rx.recv().await.unwrap();
        assert!(second.has_alerts());
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_evaluation_after_stop() {
        let (scheduler, _, _) = scheduler_with(&[madrid_rule()], &[("308526", 38.0)]);

        let mut rx = scheduler.start(Duration::from_secs(10)).await.unwrap();
        rx.recv().await.unwrap();

        assert!(scheduler.stop().await);
        let count = scheduler.evaluation_count();

        tokio::time::sleep(Duration::from_secs(100)).await;

        assert_eq!(scheduler.evaluation_count(), count);
        assert!(rx.recv().await.is_none());
        assert!(!scheduler.is_running().await);
        assert!(!scheduler.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_replaces_previous_schedule() {
        let (scheduler, _, _) = scheduler_with(&[madrid_rule()], &[("308526", 38.0)]);

        let mut old_rx = scheduler.start(Duration::from_secs(10)).await.unwrap();
        let mut new_rx = scheduler.start(Duration::from_secs(20)).await.unwrap();

        assert!(old_rx.recv().await.is_none());
        assert!(new_rx.recv().await.is_some());
        assert!(scheduler.is_running().await);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_empty_readings_trigger_nothing() {
        let (scheduler, _, _) = scheduler_with(&[madrid_rule()], &[]);

        let report = scheduler.evaluate_now();

        assert!(report.triggered.is_empty());
        assert_eq!(report.readings_evaluated, 0);
        assert_eq!(scheduler.evaluation_count(), 1);
    }

    #[tokio::test]
    async fn test_rule_changes_seen_by_next_evaluation() {
        let (scheduler, rule_store, _) = scheduler_with(&[madrid_rule()], &[("308526", 38.0)]);
        assert_eq!(scheduler.evaluate_now().triggered.len(), 1);

        let id = rule_store.list()[0].id;
        rule_store.set_active(id, false).unwrap();

        assert!(scheduler.evaluate_now().triggered.is_empty());
    }
}
