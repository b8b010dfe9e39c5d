use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use tokio::time::sleep;

use crate::models::BillMonth;
use crate::state::AppState;

/// When the monthly estimated-bill job fires: on or after `run_day` at
/// `run_hour`, local to `tz`, once per month.
#[derive(Debug, Clone, Copy)]
pub struct MonthlySchedule {
    pub tz: Tz,
    pub run_day: u32,
    pub run_hour: u32,
}

impl MonthlySchedule {
    /// The month to run for at `now`, or `None` if the run time has not
    /// arrived or `last_run` already covers it.
    pub fn due(&self, now: DateTime<Utc>, last_run: Option<BillMonth>) -> Option<BillMonth> {
        let local = now.with_timezone(&self.tz);
        let month = BillMonth::containing(local.date_naive());
        if last_run == Some(month) {
            return None;
        }
        let reached = (local.day(), local.hour()) >= (self.run_day, self.run_hour);
        reached.then_some(month)
    }
}

/// Background loop for the monthly estimated-bill run. Checks once a minute;
/// the per-month guard lives in memory, and bill uniqueness makes a repeat
/// run after restart harmless.
pub async fn run_billing_scheduler(state: AppState) {
    let schedule = MonthlySchedule {
        tz: state.config.billing_tz(),
        run_day: state.config.billing_run_day,
        run_hour: state.config.billing_run_hour,
    };
    tracing::info!(
        timezone = %schedule.tz,
        run_day = schedule.run_day,
        run_hour = schedule.run_hour,
        "Billing scheduler started"
    );

    let mut last_run: Option<BillMonth> = None;
    loop {
        sleep(Duration::from_secs(60)).await;

        let Some(bill_month) = schedule.due(Utc::now(), last_run) else {
            continue;
        };
        last_run = Some(bill_month);

        let billing = state.billing.clone();
        let handle = tokio::spawn(async move {
            billing.generate_monthly_estimated_bills(bill_month).await
        });
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                tracing::error!(bill_month = %bill_month, error = %error, "Monthly estimated bill run failed");
            }
            Err(error) => {
                tracing::error!(bill_month = %bill_month, error = %error, "Monthly estimated bill task panicked");
            }
        }
    }
}
