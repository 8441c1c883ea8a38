use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bon::Builder;
use chrono::{DateTime, Utc};
use strum::Display;
use tokio::task::JoinHandle;

use super::clock::{Clock, SystemClock};
use super::policy::{is_due, plan_schedule, RefreshTuning, SchedulePlan};
use crate::auth::{RefreshOutcome, TokenRefresher, TokenStore};
use crate::error::{Result, SessionError};
use crate::lifecycle::{LifecycleHub, Subscription};

/// Why a refresh was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RefreshReason {
    #[strum(to_string = "timer")]
    Timer,
    #[strum(to_string = "expiry-due")]
    ExpiryDue,
    #[strum(to_string = "resume/focus")]
    ResumeOrFocus,
    #[strum(to_string = "manual")]
    Manual,
}

/// What [`TokenRefreshScheduler::refresh_now`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The refresher ran to completion.
    Ran(RefreshOutcome),
    /// Another refresh was already in flight; nothing was called.
    SkippedInFlight,
    /// The scheduler is disabled.
    Disabled,
}

/// The currently armed refresh timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRefresh {
    pub fire_at: DateTime<Utc>,
    pub delay: Duration,
}

/// Optional knobs for [`TokenRefreshScheduler::with_options`].
#[derive(Debug, Clone, Builder)]
pub struct SchedulerOptions {
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    pub clock: Arc<dyn Clock>,
    #[builder(default)]
    pub tuning: RefreshTuning,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Keeps a tenant's access token fresh.
///
/// Refreshes `guard_band` before expiry, never runs two refreshes at once,
/// keeps at most one timer armed, and re-checks when the host regains the
/// foreground. Cloning shares the same scheduler; dropping the last clone
/// cancels the timer and unregisters lifecycle listeners.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use lms_session::auth::{AuthEventBus, HttpTokenRefresher, MemoryTokenStore, TokenStore};
/// use lms_session::config::ClientConfig;
/// use lms_session::lifecycle::LifecycleHub;
/// use lms_session::scheduler::TokenRefreshScheduler;
///
/// # async fn example() -> lms_session::error::Result<()> {
/// let config = ClientConfig::builder().api_base_url("https://lms.example.com/api").build();
/// let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
/// let refresher = HttpTokenRefresher::new(&config, store.clone(), AuthEventBus::new())?;
///
/// let scheduler = TokenRefreshScheduler::new(&config.tenant, store, Arc::new(refresher));
/// let hub = LifecycleHub::new();
/// scheduler.attach(&hub)?;
/// scheduler.enable(true).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TokenRefreshScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenRefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefreshScheduler")
            .field("tenant", &self.inner.tenant)
            .field("enabled", &self.is_enabled())
            .field("in_flight", &self.is_refresh_in_flight())
            .field("pending", &self.pending_refresh())
            .finish()
    }
}

impl TokenRefreshScheduler {
    pub fn new(
        tenant: impl Into<String>,
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self::with_options(tenant, store, refresher, SchedulerOptions::default())
    }

    pub fn with_options(
        tenant: impl Into<String>,
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tenant: tenant.into(),
                store,
                refresher,
                clock: options.clock,
                tuning: options.tuning,
                in_flight: AtomicBool::new(false),
                pending_timers: Arc::new(AtomicUsize::new(0)),
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Turn scheduling on or off. Turning it on installs a schedule;
    /// turning it off cancels the timer but lets an in-flight refresh finish.
    pub async fn enable(&self, flag: bool) {
        self.inner.enable(flag).await;
    }

    /// Cancel the pending timer and arm a new one from the stored expiry,
    /// refreshing first when the token is already inside the guard band.
    pub async fn schedule_next(&self) {
        self.inner.schedule_next().await;
    }

    /// Refresh unless another refresh is in flight.
    pub async fn refresh_now(&self, reason: RefreshReason) -> RefreshTrigger {
        self.inner.refresh_now(reason).await
    }

    /// Foreground re-check: refresh if due (or expiry unknown), then reschedule.
    pub async fn check_on_resume_or_focus(&self) {
        self.inner.check_on_resume_or_focus().await;
    }

    /// Run [`check_on_resume_or_focus`](Self::check_on_resume_or_focus) for
    /// every signal emitted on `hub`, until [`shutdown`](Self::shutdown).
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self, hub: &LifecycleHub) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SessionError::Configuration("attaching the scheduler requires a tokio runtime".into())
        })?;
        let weak = Arc::downgrade(&self.inner);
        let subscription = hub.subscribe(move |signal| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tracing::debug!(tenant = %inner.tenant, %signal, "foreground re-check");
            runtime.spawn(async move {
                inner.check_on_resume_or_focus().await;
            });
        });
        self.inner.state().subscriptions.push(subscription);
        Ok(())
    }

    /// Disable, cancel the timer and drop every lifecycle subscription.
    pub fn shutdown(&self) {
        let subscriptions = {
            let mut state = self.inner.state();
            state.enabled = false;
            state.epoch += 1;
            state.cancel_timer();
            std::mem::take(&mut state.subscriptions)
        };
        drop(subscriptions);
        tracing::debug!(tenant = %self.inner.tenant, "auto-refresh shut down");
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    pub fn is_refresh_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn pending_refresh(&self) -> Option<PendingRefresh> {
        self.inner.state().timer.as_ref().map(|timer| timer.pending)
    }

    /// Timer tasks that are armed and have not fired or been cancelled yet.
    pub fn pending_timer_count(&self) -> usize {
        self.inner.pending_timers.load(Ordering::Acquire)
    }

    pub fn last_refresh_reason(&self) -> Option<RefreshReason> {
        self.inner.state().last_reason
    }

    pub fn tuning(&self) -> RefreshTuning {
        self.inner.tuning
    }
}

struct Inner {
    tenant: String,
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    clock: Arc<dyn Clock>,
    tuning: RefreshTuning,
    in_flight: AtomicBool,
    pending_timers: Arc<AtomicUsize>,
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    enabled: bool,
    /// Bumped on every enable/disable so stale schedules are never installed.
    epoch: u64,
    next_timer_id: u64,
    timer: Option<ArmedTimer>,
    last_reason: Option<RefreshReason>,
    subscriptions: Vec<Subscription>,
}

impl SchedulerState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

struct ArmedTimer {
    id: u64,
    pending: PendingRefresh,
    handle: JoinHandle<()>,
}

/// Counts a timer task as pending until it fires or is dropped.
struct PendingTimerGuard(Arc<AtomicUsize>);

impl PendingTimerGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for PendingTimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Clears the single-flight flag however the refresh ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    async fn enable(self: &Arc<Self>, flag: bool) {
        {
            let mut state = self.state();
            if state.enabled == flag {
                return;
            }
            state.enabled = flag;
            state.epoch += 1;
            if !flag {
                state.cancel_timer();
            }
        }

        if flag {
            tracing::debug!(tenant = %self.tenant, "auto-refresh enabled");
            self.schedule_next().await;
        } else {
            tracing::debug!(tenant = %self.tenant, "auto-refresh disabled");
        }
    }

    /// Cancel the armed timer and return the epoch to schedule under,
    /// or `None` when disabled.
    fn begin_schedule(&self) -> Option<u64> {
        let mut state = self.state();
        if !state.enabled {
            return None;
        }
        state.cancel_timer();
        Some(state.epoch)
    }

    async fn schedule_next(self: &Arc<Self>) {
        self.reschedule(true).await;
    }

    /// Arm the next timer. With `may_refresh` set, a token already inside the
    /// guard band is refreshed once first; otherwise it gets the floor delay.
    async fn reschedule(self: &Arc<Self>, mut may_refresh: bool) {
        loop {
            let Some(epoch) = self.begin_schedule() else {
                return;
            };
            let expiry = self.read_expiry().await;
            let now = self.clock.now();

            match plan_schedule(&self.tuning, now, expiry) {
                SchedulePlan::RefreshNow if may_refresh => {
                    may_refresh = false;
                    self.refresh_now(RefreshReason::ExpiryDue).await;
                }
                SchedulePlan::RefreshNow => {
                    tracing::debug!(tenant = %self.tenant, ?expiry, "token still due after refresh");
                    self.arm(epoch, now, self.tuning.min_delay);
                    return;
                }
                SchedulePlan::Fallback { delay } => {
                    tracing::debug!(tenant = %self.tenant, "token expiry unknown; arming fallback");
                    self.arm(epoch, now, delay);
                    return;
                }
                SchedulePlan::Wait { delay } => {
                    self.arm(epoch, now, delay);
                    return;
                }
            }
        }
    }

    fn arm(self: &Arc<Self>, epoch: u64, now: DateTime<Utc>, delay: Duration) {
        let mut state = self.state();
        if !state.enabled || state.epoch != epoch {
            tracing::debug!(tenant = %self.tenant, "dropping schedule computed before enable change");
            return;
        }
        state.cancel_timer();

        let id = state.next_timer_id;
        state.next_timer_id += 1;
        let fire_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let guard = PendingTimerGuard::new(self.pending_timers.clone());
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            drop(guard);
            if let Some(inner) = weak.upgrade() {
                inner.on_timer_fired(id).await;
            }
        });

        state.timer = Some(ArmedTimer {
            id,
            pending: PendingRefresh { fire_at, delay },
            handle,
        });
        tracing::debug!(
            tenant = %self.tenant,
            delay_ms = delay.as_millis() as u64,
            %fire_at,
            "refresh timer armed"
        );
    }

    async fn on_timer_fired(self: &Arc<Self>, id: u64) {
        {
            let mut state = self.state();
            match &state.timer {
                // Detach our own handle; aborting it here would cancel this task.
                Some(timer) if timer.id == id => state.timer = None,
                _ => return,
            }
        }
        self.refresh_now(RefreshReason::Timer).await;
        self.reschedule(false).await;
    }

    async fn refresh_now(&self, reason: RefreshReason) -> RefreshTrigger {
        if !self.is_enabled() {
            return RefreshTrigger::Disabled;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(tenant = %self.tenant, %reason, "refresh already in flight; skipping");
            return RefreshTrigger::SkippedInFlight;
        }
        let _flight = InFlightGuard(&self.in_flight);
        self.state().last_reason = Some(reason);

        tracing::debug!(tenant = %self.tenant, %reason, "refreshing access token");
        let outcome = self.refresher.refresh().await;
        match &outcome {
            RefreshOutcome::Refreshed { expires_at } => {
                tracing::info!(tenant = %self.tenant, %reason, ?expires_at, "access token refreshed")
            }
            RefreshOutcome::Failed { error } => {
                tracing::warn!(tenant = %self.tenant, %reason, %error, "access token refresh failed")
            }
        }
        RefreshTrigger::Ran(outcome)
    }

    async fn check_on_resume_or_focus(self: &Arc<Self>) {
        if !self.is_enabled() {
            return;
        }
        let expiry = self.read_expiry().await;
        if is_due(&self.tuning, self.clock.now(), expiry) {
            self.refresh_now(RefreshReason::ResumeOrFocus).await;
            self.reschedule(false).await;
        } else {
            self.reschedule(true).await;
        }
    }

    /// A failed read is treated as unknown expiry.
    async fn read_expiry(&self) -> Option<DateTime<Utc>> {
        match self.store.expiry(&self.tenant).await {
            Ok(expiry) => expiry,
            Err(error) => {
                tracing::warn!(tenant = %self.tenant, %error, "could not read token expiry; treating as unknown");
                None
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel_timer();
    }
}
