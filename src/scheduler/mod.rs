//! Token auto-refresh scheduling.
//!
//! [`TokenRefreshScheduler`] keeps one timer per tenant armed for the start
//! of the guard band before the access token expires, runs at most one
//! refresh at a time, and re-checks expiry whenever the host regains the
//! foreground.

pub mod auto_refresh;
pub mod clock;
pub mod policy;

pub use auto_refresh::{
    PendingRefresh, RefreshReason, RefreshTrigger, SchedulerOptions, TokenRefreshScheduler,
};
pub use clock::{AnchoredClock, Clock, SystemClock};
pub use policy::{is_due, plan_schedule, RefreshTuning, SchedulePlan};
