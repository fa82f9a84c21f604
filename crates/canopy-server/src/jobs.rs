//! Scheduled daily sales report generation.
//!
//! Shortly after each business-day midnight the job reports the day that
//! just ended for every dispensary that had orders in it. Dispensaries are
//! processed concurrently; one failing never stops the others.

use std::sync::Arc;
use std::time::Duration;

use canopy_compliance::day;
use canopy_core::context::TenantContext;
use canopy_core::error::CanopyResult;
use canopy_core::models::report::DailySalesReport;
use canopy_core::repository::{OrderRepository, TenantRepository};
use chrono::{FixedOffset, NaiveDate, Utc};
use surrealdb::Connection;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ReportJobConfig;
use crate::state::AppState;

/// Outcome of one run over a business date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportRunSummary {
    pub generated: usize,
    pub failed: usize,
}

async fn generate_one<C: Connection>(
    state: &AppState<C>,
    tenant_id: Uuid,
    dispensary_id: Uuid,
    date: NaiveDate,
) -> CanopyResult<DailySalesReport> {
    let tenant = state.tenants.get_by_id(tenant_id).await?;
    let ctx = TenantContext::for_tenant(&tenant);
    state
        .reports
        .generate_daily_report(&ctx, dispensary_id, date)
        .await
}

async fn generate_with_retry<C: Connection>(
    state: Arc<AppState<C>>,
    tenant_id: Uuid,
    dispensary_id: Uuid,
    date: NaiveDate,
    config: ReportJobConfig,
) -> bool {
    let attempts = config.max_attempts.max(1);
    let mut backoff = config.retry_backoff;

    for attempt in 1..=attempts {
        match generate_one(&state, tenant_id, dispensary_id, date).await {
            Ok(_) => return true,
            Err(e) if attempt < attempts => {
                warn!(
                    %tenant_id,
                    %dispensary_id,
                    %date,
                    attempt,
                    error = %e,
                    "Daily report attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => {
                error!(
                    %tenant_id,
                    %dispensary_id,
                    %date,
                    attempts,
                    error = %e,
                    "Daily report generation gave up"
                );
            }
        }
    }
    false
}

/// Generate the report for `date` for every dispensary, in every tenant,
/// that has at least one order on that business day.
pub async fn run_daily_reports<C: Connection>(
    state: Arc<AppState<C>>,
    date: NaiveDate,
    offset: FixedOffset,
    config: &ReportJobConfig,
) -> ReportRunSummary {
    let (start, end) = day::day_window(date, offset);
    let targets = match state.orders.dispensaries_with_orders(start, end).await {
        Ok(targets) => targets,
        Err(e) => {
            error!(%date, error = %e, "Failed to list dispensaries for daily reports");
            return ReportRunSummary::default();
        }
    };

    let mut tasks = JoinSet::new();
    for (tenant_id, dispensary_id) in targets {
        tasks.spawn(generate_with_retry(
            Arc::clone(&state),
            tenant_id,
            dispensary_id,
            date,
            config.clone(),
        ));
    }

    let mut summary = ReportRunSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => summary.generated += 1,
            Ok(false) => summary.failed += 1,
            Err(e) => {
                error!(%date, error = %e, "Daily report task panicked");
                summary.failed += 1;
            }
        }
    }

    info!(
        %date,
        generated = summary.generated,
        failed = summary.failed,
        "Daily report run finished"
    );
    summary
}

/// Time from `now` until the next business-day midnight plus `delay`.
fn until_next_run(now: chrono::DateTime<Utc>, offset: FixedOffset, delay: Duration) -> Duration {
    let today = day::business_date(now, offset);
    let mut next = day::day_start(today, offset);
    while next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default() + delay
}

/// Run the report job forever in the background, once per business day.
pub fn spawn_daily_report_job<C: Connection>(
    state: Arc<AppState<C>>,
    offset: FixedOffset,
    config: ReportJobConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_run(Utc::now(), offset, config.run_after_midnight);
            info!(wait_secs = wait.as_secs(), "Next daily report run scheduled");
            tokio::time::sleep(wait).await;

            let Some(yesterday) = day::business_date(Utc::now(), offset).pred_opt() else {
                continue;
            };
            run_daily_reports(Arc::clone(&state), yesterday, offset, &config).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Offset, TimeZone};

    use super::*;

    #[test]
    fn next_run_is_after_the_coming_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 22, 0, 0).unwrap();
        let wait = until_next_run(now, Utc.fix(), Duration::from_secs(15 * 60));
        assert_eq!(wait, Duration::from_secs(2 * 3600 + 15 * 60));
    }

    #[test]
    fn next_run_honours_the_business_day_offset() {
        // 22:00 UTC is 15:00 at UTC-7; the next local midnight is 07:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 22, 0, 0).unwrap();
        let offset = FixedOffset::west_opt(7 * 3600).unwrap();
        let wait = until_next_run(now, offset, Duration::ZERO);
        assert_eq!(wait, Duration::from_secs(9 * 3600));
    }

    #[test]
    fn exactly_midnight_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2026, 2, 11, 0, 0, 0).unwrap();
        let wait = until_next_run(now, Utc.fix(), Duration::ZERO);
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }
}
