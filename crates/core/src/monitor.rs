//! Inactivity timeout with an advance warning
//!
//! The monitor arms a single timer task per reset. Each arming carries a
//! generation number; a callback only runs while its generation is still the
//! current one, so neither callback can fire after [`InactivityMonitor::stop`]
//! or after a newer [`InactivityMonitor::start`] superseded it.
//!
//! A callback that is already running when the monitor is stopped is allowed
//! to finish; only the callbacks after it are skipped.

use crate::error::{CoreError, CoreResult};
use crate::session::SessionStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

/// Timing of the inactivity monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Inactivity after which the session is ended
    pub timeout: Duration,
    /// How long before the timeout the warning fires
    pub warning_lead: Duration,
    /// Activity closer together than this does not re-arm the timers
    pub activity_debounce: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15 * 60),
            warning_lead: Duration::from_secs(2 * 60),
            activity_debounce: Duration::from_secs(1),
        }
    }
}

impl MonitorConfig {
    pub fn new(timeout: Duration, warning_lead: Duration) -> CoreResult<Self> {
        let config = Self {
            timeout,
            warning_lead,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn with_activity_debounce(mut self, debounce: Duration) -> Self {
        self.activity_debounce = debounce;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.timeout.is_zero() {
            return Err(CoreError::invalid_config(
                "inactivity timeout must be greater than zero",
            ));
        }
        if self.warning_lead >= self.timeout {
            return Err(CoreError::invalid_config(format!(
                "warning lead ({:?}) must be shorter than the timeout ({:?})",
                self.warning_lead, self.timeout
            )));
        }
        Ok(())
    }

    /// Delay from the last reset until the warning
    pub fn warning_after(&self) -> Duration {
        self.timeout.saturating_sub(self.warning_lead)
    }
}

/// Receives monitor callbacks
#[async_trait]
pub trait MonitorListener: Send + Sync {
    /// The session will expire in `remaining` unless activity resets it
    async fn on_warning(&self, _remaining: Duration) {}

    /// The inactivity timeout elapsed
    async fn on_expire(&self) {}
}

/// Keeps a listener registered; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    /// Unsubscribe now rather than on drop
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[derive(Default)]
struct Armed {
    task: Option<JoinHandle<()>>,
    last_reset: Option<Instant>,
    /// The task is inside listener callbacks and must not be aborted
    dispatching: bool,
}

struct Shared {
    config: MonitorConfig,
    listeners: Mutex<BTreeMap<u64, Arc<dyn MonitorListener>>>,
    next_listener_id: AtomicU64,
    generation: AtomicU64,
    armed: Mutex<Armed>,
}

impl Shared {
    fn listeners(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<dyn MonitorListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn armed(&self) -> MutexGuard<'_, Armed> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn snapshot(&self) -> Vec<Arc<dyn MonitorListener>> {
        self.listeners().values().cloned().collect()
    }

    /// Mark the task of `generation` as dispatching, unless it was superseded
    fn begin_dispatch(&self, generation: u64) -> bool {
        let mut armed = self.armed();
        if !self.is_current(generation) {
            return false;
        }
        armed.dispatching = true;
        true
    }

    fn end_dispatch(&self, generation: u64) {
        let mut armed = self.armed();
        if self.is_current(generation) {
            armed.dispatching = false;
        }
    }

    async fn run(self: Arc<Self>, generation: u64, reset_at: Instant) {
        sleep_until(reset_at + self.config.warning_after()).await;
        if !self.begin_dispatch(generation) {
            return;
        }
        info!(remaining = ?self.config.warning_lead, "Session about to expire");
        for listener in self.snapshot() {
            if !self.is_current(generation) {
                return;
            }
            listener.on_warning(self.config.warning_lead).await;
        }
        self.end_dispatch(generation);

        sleep_until(reset_at + self.config.timeout).await;
        if !self.begin_dispatch(generation) {
            return;
        }
        info!("Inactivity timeout reached");
        for listener in self.snapshot() {
            if !self.is_current(generation) {
                return;
            }
            listener.on_expire().await;
        }
        self.end_dispatch(generation);
    }
}

/// Timer-driven inactivity watcher, independent of the session store
pub struct InactivityMonitor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for InactivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InactivityMonitor")
            .field("config", &self.shared.config)
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl InactivityMonitor {
    pub fn new(config: MonitorConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                listeners: Mutex::new(BTreeMap::new()),
                next_listener_id: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                armed: Mutex::new(Armed::default()),
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Register a listener for warning and expiry callbacks
    pub fn subscribe(&self, listener: Arc<dyn MonitorListener>) -> Subscription {
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners().insert(id, listener);
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// (Re)arm both timers relative to now. Must be called from within a
    /// tokio runtime.
    pub fn start(&self) {
        let mut armed = self.shared.armed();
        self.arm(&mut armed);
    }

    /// Reset the timers for user activity, unless the last reset was within
    /// the debounce window. Returns whether the timers were reset.
    ///
    /// Activity never re-arms a stopped monitor.
    pub fn record_activity(&self) -> bool {
        let mut armed = self.shared.armed();
        match armed.last_reset {
            Some(last) if last.elapsed() >= self.shared.config.activity_debounce => {
                self.arm(&mut armed);
                true
            }
            _ => false,
        }
    }

    /// Cancel both timers. A callback already in progress runs to completion
    /// in the background.
    pub fn stop(&self) {
        drop(self.halt());
    }

    /// Cancel both timers and wait for a callback already in progress
    pub async fn shutdown(self) {
        if let Some(task) = self.halt() {
            debug!("Waiting for in-flight monitor callback");
            let _ = task.await;
        }
    }

    /// Whether a timer task is pending
    pub fn is_armed(&self) -> bool {
        self.shared
            .armed()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Invalidate the current arming. Returns the task if it is inside a
    /// callback; otherwise the task is aborted.
    fn halt(&self) -> Option<JoinHandle<()>> {
        let mut armed = self.shared.armed();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        armed.last_reset = None;
        let task = Self::release(&mut armed)?;
        debug!("Inactivity monitor stopped");
        Some(task)
    }

    /// Take the armed task, aborting it unless it is dispatching
    fn release(armed: &mut Armed) -> Option<JoinHandle<()>> {
        let task = armed.task.take()?;
        if std::mem::take(&mut armed.dispatching) {
            Some(task)
        } else {
            task.abort();
            None
        }
    }

    fn arm(&self, armed: &mut Armed) {
        drop(Self::release(armed));
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let reset_at = Instant::now();
        armed.last_reset = Some(reset_at);
        armed.task = Some(tokio::spawn(
            Arc::clone(&self.shared).run(generation, reset_at),
        ));
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ends the session when the inactivity timeout fires
#[derive(Debug, Clone)]
pub struct SignOutOnExpire {
    store: SessionStore,
}

impl SignOutOnExpire {
    pub const fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MonitorListener for SignOutOnExpire {
    async fn on_expire(&self) {
        info!("Signing out after inactivity");
        self.store.sign_out().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockAuthBackend;
    use crate::backend::AuthGrant;
    use crate::identity::Credentials;
    use crate::identity::test_tokens::token_for;
    use crate::session::SessionState;
    use crate::storage::test_support::SlowStorage;
    use crate::storage::{AUTH_TOKEN_KEY, MemoryTokenStorage, TokenStorage};
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    #[derive(Default)]
    struct Counter {
        warnings: AtomicUsize,
        expiries: AtomicUsize,
    }

    impl Counter {
        fn counts(&self) -> (usize, usize) {
            (
                self.warnings.load(Ordering::SeqCst),
                self.expiries.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl MonitorListener for Counter {
        async fn on_warning(&self, remaining: Duration) {
            assert_eq!(remaining, Duration::from_secs(2));
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_expire(&self) {
            self.expiries.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ten_second_monitor() -> (InactivityMonitor, Arc<Counter>, Subscription) {
        let config = MonitorConfig::new(Duration::from_secs(10), Duration::from_secs(2))
            .unwrap()
            .with_activity_debounce(Duration::from_secs(1));
        let monitor = InactivityMonitor::new(config).unwrap();
        let counter = Arc::new(Counter::default());
        let subscription = monitor.subscribe(counter.clone());
        (monitor, counter, subscription)
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_then_expiry_fire_once() {
        let (monitor, counter, _sub) = ten_second_monitor();
        monitor.start();

        sleep(Duration::from_millis(7_900)).await;
        assert_eq!(counter.counts(), (0, 0));

        sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.counts(), (1, 0));

        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(counter.counts(), (1, 1));
        assert!(!monitor.is_armed());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.counts(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_callbacks() {
        let (monitor, counter, _sub) = ten_second_monitor();

        monitor.start();
        sleep(Duration::from_secs(5)).await;
        monitor.stop();
        assert!(!monitor.is_armed());
        sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.counts(), (0, 0));

        monitor.start();
        sleep(Duration::from_secs(9)).await;
        monitor.stop();
        sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.counts(), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_arming() {
        let (monitor, counter, _sub) = ten_second_monitor();

        monitor.start();
        sleep(Duration::from_secs(5)).await;
        monitor.start();

        sleep(Duration::from_millis(7_900)).await;
        assert_eq!(counter.counts(), (0, 0));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.counts(), (1, 0));
        sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.counts(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_sequences_expire_at_most_once_per_start() {
        let (monitor, counter, _sub) = ten_second_monitor();

        for round in 1..=3 {
            monitor.start();
            monitor.start();
            sleep(Duration::from_secs(11)).await;
            assert_eq!(counter.counts(), (round, round));
            monitor.stop();
            monitor.stop();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_is_debounced() {
        let (monitor, counter, _sub) = ten_second_monitor();

        monitor.start();
        sleep(Duration::from_millis(500)).await;
        assert!(!monitor.record_activity());

        sleep(Duration::from_millis(1_500)).await;
        assert!(monitor.record_activity());

        // Reset at t=2s, so nothing before t=10s
        sleep(Duration::from_millis(7_900)).await;
        assert_eq!(counter.counts(), (0, 0));
        sleep(Duration::from_secs(3)).await;
        assert_eq!(counter.counts(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_does_not_rearm_stopped_monitor() {
        let (monitor, counter, _sub) = ten_second_monitor();
        assert!(!monitor.record_activity());

        monitor.start();
        monitor.stop();
        sleep(Duration::from_secs(2)).await;
        assert!(!monitor.record_activity());
        sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.counts(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribed_listener_is_not_called() {
        let (monitor, counter, sub) = ten_second_monitor();
        sub.unsubscribe();

        monitor.start();
        sleep(Duration::from_secs(11)).await;
        assert_eq!(counter.counts(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_monitor_cancels_timers() {
        let (monitor, counter, _sub) = ten_second_monitor();
        monitor.start();
        drop(monitor);

        sleep(Duration::from_secs(11)).await;
        assert_eq!(counter.counts(), (0, 0));
    }

    #[test]
    fn test_config_validation() {
        assert!(MonitorConfig::new(Duration::ZERO, Duration::ZERO).is_err());
        assert!(MonitorConfig::new(Duration::from_secs(2), Duration::from_secs(2)).is_err());
        let config = MonitorConfig::new(Duration::from_secs(10), Duration::from_secs(2)).unwrap();
        assert_eq!(config.warning_after(), Duration::from_secs(8));
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_signs_out_session() {
        let mut backend = MockAuthBackend::new();
        backend.expect_sign_in().returning(|_| {
            Ok(AuthGrant {
                access_token: token_for("u-1", "hospital", 4_102_444_800),
                identity: None,
            })
        });
        backend.expect_sign_out().times(1).returning(|_| Ok(()));

        let store = SessionStore::new(Arc::new(backend), Arc::new(MemoryTokenStorage::new()));
        store.initialize().await;
        store
            .sign_in(&Credentials::new("u-1@example.org", "pw"))
            .await
            .unwrap();

        let (monitor, counter, _sub) = ten_second_monitor();
        let _sign_out = monitor.subscribe(Arc::new(SignOutOnExpire::new(store.clone())));
        monitor.start();

        sleep(Duration::from_millis(8_100)).await;
        assert_eq!(counter.counts(), (1, 0));
        assert!(store.is_authenticated());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.counts(), (1, 1));
        assert_eq!(store.state(), SessionState::Unauthenticated);
    }

    /// Expiry listener that takes a second to finish
    #[derive(Default)]
    struct SlowExpiry {
        finished: AtomicUsize,
    }

    #[async_trait]
    impl MonitorListener for SlowExpiry {
        async fn on_expire(&self) {
            sleep(Duration::from_secs(1)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn slow_then_counting_monitor()
    -> (InactivityMonitor, Arc<SlowExpiry>, Arc<Counter>, [Subscription; 2]) {
        let config = MonitorConfig::new(Duration::from_secs(10), Duration::from_secs(2)).unwrap();
        let monitor = InactivityMonitor::new(config).unwrap();
        let slow = Arc::new(SlowExpiry::default());
        let counter = Arc::new(Counter::default());
        let subs = [
            monitor.subscribe(slow.clone()),
            monitor.subscribe(counter.clone()),
        ];
        (monitor, slow, counter, subs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_running_callback_finish() {
        let (monitor, slow, counter, _subs) = slow_then_counting_monitor();
        monitor.start();

        sleep(Duration::from_millis(10_500)).await;
        monitor.stop();
        assert!(!monitor.is_armed());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(slow.finished.load(Ordering::SeqCst), 1);
        // Listeners after the running one are skipped
        assert_eq!(counter.counts(), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_running_callback() {
        let (monitor, slow, _counter, _subs) = slow_then_counting_monitor();
        monitor.start();

        sleep(Duration::from_millis(10_500)).await;
        monitor.shutdown().await;
        assert_eq!(slow.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_on_sign_out_still_clears_and_revokes() {
        let mut backend = MockAuthBackend::new();
        backend.expect_sign_in().returning(|_| {
            Ok(AuthGrant {
                access_token: token_for("u-1", "hospital", 4_102_444_800),
                identity: None,
            })
        });
        backend.expect_sign_out().times(1).returning(|_| Ok(()));

        let storage = Arc::new(SlowStorage::default());
        let store = SessionStore::new(Arc::new(backend), storage.clone());
        store.initialize().await;
        store
            .sign_in(&Credentials::new("u-1@example.org", "pw"))
            .await
            .unwrap();

        let config = MonitorConfig::new(Duration::from_secs(10), Duration::from_secs(2)).unwrap();
        let monitor = Arc::new(InactivityMonitor::new(config).unwrap());
        let _sign_out = monitor.subscribe(Arc::new(SignOutOnExpire::new(store.clone())));
        monitor.start();

        // Stop the monitor as soon as the session ends, the way a front end would
        let watcher = tokio::spawn({
            let monitor = monitor.clone();
            let mut rx = store.subscribe();
            async move {
                while rx.borrow_and_update().is_authenticated() {
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
                monitor.stop();
            }
        });

        sleep(Duration::from_secs(11)).await;
        watcher.await.unwrap();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(store.state(), SessionState::Unauthenticated);
        assert_eq!(storage.get(AUTH_TOKEN_KEY).await.unwrap(), None);
    }
}
