use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::cycle::{CycleError, Poller};

/// Accept classic 5-field cron by prefixing a zero seconds field.
pub fn normalize_cron(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

/// Run a cycle, logging instead of failing when one is already in flight.
pub async fn run_logged(poller: &Poller, trigger: &'static str) {
    match poller.run_cycle().await {
        Ok(report) => info!(
            trigger,
            published = report.published.len(),
            failed = report.failures.len(),
            "cycle complete"
        ),
        Err(CycleError::Busy) => warn!(trigger, "skipping cycle; another one is still running"),
    }
}

/// Start a scheduler that runs a poll cycle on every tick of `expr`.
pub async fn start(poller: Arc<Poller>, expr: &str) -> Result<JobScheduler> {
    let cron = normalize_cron(expr);
    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
        let poller = Arc::clone(&poller);
        Box::pin(async move {
            run_logged(&poller, "schedule").await;
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    sched.start().await.context("starting scheduler")?;
    info!(cron = %cron, "scheduled poll cycles");
    Ok(sched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_cron_gains_seconds() {
        assert_eq!(normalize_cron("*/5 * * * *"), "0 */5 * * * *");
        assert_eq!(normalize_cron("  0  6 * * 1-5 "), "0 0 6 * * 1-5");
    }

    #[test]
    fn six_field_cron_is_kept() {
        assert_eq!(normalize_cron("30 */5 * * * *"), "30 */5 * * * *");
    }
}
