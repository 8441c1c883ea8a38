use std::time::Duration;

use chrono::{DateTime, Utc};

/// Timing constants of the auto-refresh scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTuning {
    /// Lead time before expiry at which a refresh is due.
    pub guard_band: Duration,
    /// Shortest delay a timer is ever armed with.
    pub min_delay: Duration,
    /// Delay used when the token expiry is unknown.
    pub unknown_expiry_fallback: Duration,
}

impl Default for RefreshTuning {
    fn default() -> Self {
        Self {
            guard_band: Duration::from_millis(60_000),
            min_delay: Duration::from_millis(5_000),
            unknown_expiry_fallback: Duration::from_millis(600_000),
        }
    }
}

/// What `schedule_next` should do for a given expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePlan {
    /// Expiry unknown: arm the long safety-net timer.
    Fallback { delay: Duration },
    /// Inside the guard band or past expiry.
    RefreshNow,
    /// Arm a timer for the start of the guard band.
    Wait { delay: Duration },
}

pub fn plan_schedule(
    tuning: &RefreshTuning,
    now: DateTime<Utc>,
    expiry: Option<DateTime<Utc>>,
) -> SchedulePlan {
    let Some(remaining_ms) = millis_until_guard_band(tuning, now, expiry) else {
        return SchedulePlan::Fallback {
            delay: tuning.unknown_expiry_fallback,
        };
    };
    if remaining_ms <= 0 {
        return SchedulePlan::RefreshNow;
    }
    SchedulePlan::Wait {
        delay: Duration::from_millis(remaining_ms as u64).max(tuning.min_delay),
    }
}

/// Whether a refresh is due right now. Unknown expiry counts as due.
pub fn is_due(tuning: &RefreshTuning, now: DateTime<Utc>, expiry: Option<DateTime<Utc>>) -> bool {
    millis_until_guard_band(tuning, now, expiry).map_or(true, |remaining| remaining <= 0)
}

fn millis_until_guard_band(
    tuning: &RefreshTuning,
    now: DateTime<Utc>,
    expiry: Option<DateTime<Utc>>,
) -> Option<i64> {
    let guard_ms = i64::try_from(tuning.guard_band.as_millis()).unwrap_or(i64::MAX);
    let refresh_at = expiry?.timestamp_millis().saturating_sub(guard_ms);
    Some(refresh_at.saturating_sub(now.timestamp_millis()))
}
