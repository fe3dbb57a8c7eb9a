use anyhow::Result;
use heatwatch_alerts::AlertReport;
use heatwatch_core::{Config, HeatMonitor};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[tokio::main]
async fn main() -> Result<()> {
    heatwatch_core::init()?;

    let (config, _) = Config::load_validated()?;
    let monitor = HeatMonitor::new(config)?;

    tracing::info!(
        "HeatWatch started, monitoring {} cities",
        monitor.config().monitor.cities.len()
    );

    refresh(&monitor, "Initial").await;

    for entry in monitor.heat_map() {
        println!(
            "{:>5.0}°C  {:<9} {}, {} ({})",
            entry.temperature, entry.severity.as_str(), entry.name, entry.country, entry.condition
        );
    }

    let rules = monitor.add_configured_rules().await;
    tracing::info!("{} alert rules active", rules.len());
    log_alerts(&monitor.check_alerts());

    let mut reports = monitor.start_alerts().await?;

    // Keep readings current between alert checks.
    let mut refresh_ticker: Option<Interval> = monitor.config().refresh_interval().map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Interrupt received");
                break;
            }
            _ = next_refresh(&mut refresh_ticker) => {
                refresh(&monitor, "Scheduled").await;
            }
            report = reports.recv() => {
                let Some(report) = report else { break };
                log_alerts(&report);
            }
        }
    }

    monitor.shutdown().await;
    Ok(())
}

async fn refresh(monitor: &HeatMonitor, label: &str) {
    match monitor.refresh_monitored().await {
        Ok(summary) => tracing::info!(
            "{} refresh published {} readings ({} cities unresolved, {} fetches failed)",
            label,
            summary.published,
            summary.requested - summary.resolved,
            summary.failures.len()
        ),
        Err(e) => tracing::error!("{} refresh failed: {} ({})", label, e, e.user_message()),
    }
}

/// Waits for the next refresh tick, forever when refresh is disabled.
async fn next_refresh(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn log_alerts(report: &AlertReport) {
    for rule in &report.triggered {
        tracing::warn!(
            "Heat alert {}: {} above {}°C (notify {})",
            rule.id,
            rule.location_name,
            rule.threshold,
            rule.email
        );
    }
}
