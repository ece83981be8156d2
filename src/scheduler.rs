//! Trigger registration and the reconcile backstop loop
//!
//! The engine owns no timers. This module registers one cron job per
//! boundary tuple the engine reports (`find_hours_to_create_jobs`) and runs
//! a coarse reconcile loop as the correctness backstop for lost or
//! duplicated ticks. Call `register_jobs` again after a configuration
//! change; reconciliation self-heals in between.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Weekday;
use tokio::time::sleep;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::BusinessHours;
use crate::health::ReconcileMetrics;
use crate::model::ScheduledHour;
use crate::week::weekday_name;

/// Cron day token for a weekday
fn cron_day(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// Six-field cron line (`sec min hour dom mon dow`) for the boundary's real
/// UTC fire tick, day carry included.
pub fn cron_expression(boundary: &ScheduledHour) -> String {
    let (day, time) = boundary.fire_at_utc();
    format!("0 {} {} * * {}", time.minute(), time.hour(), cron_day(day))
}

/// Register open/close trigger jobs for every boundary tuple currently
/// configured. Returns how many triggers were registered.
///
/// A tuple does not say whether it is a start or a finish (some window may
/// declare it as either), so each tick fires the open trigger and then the
/// close trigger; the repository matches starts for open and finishes for
/// close. The cron scheduler runs these expressions in UTC.
pub async fn register_jobs(engine: Arc<dyn BusinessHours>, sched: &JobScheduler) -> Result<usize> {
    let boundaries = engine
        .find_hours_to_create_jobs()
        .await
        .context("failed to derive trigger boundaries")?;

    for boundary in &boundaries {
        let expr = cron_expression(boundary);
        debug!(
            day = weekday_name(boundary.day),
            time = %boundary.time,
            offset = %boundary.utc_offset,
            cron = %expr,
            "registering trigger"
        );

        let job = Job::new_async(expr.as_str(), {
            let engine = engine.clone();
            let boundary = boundary.clone();
            move |_id, _sched| {
                let engine = engine.clone();
                let boundary = boundary.clone();
                Box::pin(async move {
                    if let Err(e) = engine
                        .open_business_hours_by_day_hour_and_utc(
                            boundary.day,
                            boundary.time,
                            boundary.utc_offset,
                        )
                        .await
                    {
                        error!("Open trigger failed: {}", e);
                    }
                    if let Err(e) = engine
                        .close_business_hours_by_day_and_hour(
                            boundary.day,
                            boundary.time,
                            boundary.utc_offset,
                        )
                        .await
                    {
                        error!("Close trigger failed: {}", e);
                    }
                })
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to build trigger job for {expr:?}: {e}"))?;

        sched
            .add(job)
            .await
            .map_err(|e| anyhow::anyhow!("failed to register trigger job for {expr:?}: {e}"))?;
    }

    info!("Registered {} business hour triggers", boundaries.len());
    Ok(boundaries.len())
}

/// Format duration for logging
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Run the reconcile backstop loop until cancelled. Each pass recomputes the
/// open set from scratch, so a pass that lands after a missed or duplicated
/// cron tick converges to the correct state.
pub async fn run_reconcile_loop(
    engine: Arc<dyn BusinessHours>,
    interval: Duration,
    metrics: Arc<ReconcileMetrics>,
    cancel_token: CancellationToken,
) {
    info!(
        "Reconcile backstop running every {}",
        format_duration(interval)
    );

    loop {
        match engine.open_business_hours_if_needed().await {
            Ok(()) => {
                debug!("Reconcile pass complete");
                metrics.record_success();
            }
            Err(e) => {
                error!("Reconcile pass failed: {}", e);
                metrics.record_failure();
            }
        }

        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Reconcile loop stopped");
                return;
            }
            _ = sleep(interval) => {}
        }
    }
}
