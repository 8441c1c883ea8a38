//! Foreground signals from the host platform.
//!
//! Browser hosts forward `focus` and `visibilitychange` (visible), native
//! hosts forward app resume. Everything funnels through one [`LifecycleHub`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use strum::{Display, EnumString};

/// The application regained the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ForegroundSignal {
    /// Window or tab received focus.
    Focus,
    /// Document visibility changed to visible.
    Visible,
    /// Native app resumed from background.
    #[strum(to_string = "resume", serialize = "native_resume")]
    NativeResume,
}

type Listener = Arc<dyn Fn(ForegroundSignal) + Send + Sync>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Listener registry for [`ForegroundSignal`]s. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct LifecycleHub {
    inner: Arc<Mutex<HubInner>>,
}

impl std::fmt::Debug for LifecycleHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl LifecycleHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe(
        &self,
        listener: impl Fn(ForegroundSignal) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, Arc::new(listener));
        Subscription {
            hub: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Deliver a signal to every registered listener.
    pub fn emit(&self, signal: ForegroundSignal) {
        // Snapshot so listeners may subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener> = self.lock().listeners.values().cloned().collect();
        tracing::debug!(%signal, listeners = listeners.len(), "foreground signal");
        for listener in listeners {
            listener(signal);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Teardown handle for a registered listener.
#[derive(Debug)]
pub struct Subscription {
    hub: Weak<Mutex<HubInner>>,
    id: Option<u64>,
}

impl Subscription {
    /// Remove the listener now. Idempotent.
    pub fn unsubscribe(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(hub) = self.hub.upgrade() {
            hub.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.hub.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
