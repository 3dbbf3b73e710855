//! Loop interval selection and failure backoff

use chrono::{Local, NaiveDate};
use std::time::Duration;
use tracing::warn;

use crate::infrastructure::config::ScheduleConfig;

/// Interval for `today`: the first window containing it, else the default
pub fn interval_for(schedule: &ScheduleConfig, today: NaiveDate) -> Duration {
    for window in &schedule.windows {
        match window.date_range() {
            Ok((start, end)) if (start..=end).contains(&today) => {
                return Duration::from_secs(window.interval_secs);
            }
            Ok(_) => {}
            Err(e) => warn!("⚠️ Ignoring schedule window: {}", e),
        }
    }
    Duration::from_secs(schedule.default_interval_secs)
}

pub fn current_interval(schedule: &ScheduleConfig) -> Duration {
    interval_for(schedule, Local::now().date_naive())
}

/// Pause after `consecutive_failures` failed cycles: base doubled per extra
/// failure, capped at the configured maximum
pub fn failure_backoff(schedule: &ScheduleConfig, consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(16);
    let secs = schedule
        .failure_backoff_base_secs
        .saturating_mul(1_u64 << exponent)
        .min(schedule.failure_backoff_max_secs);
    Duration::from_secs(secs)
}
