//! A single pool of interchangeable resources.
//!
//! # Responsibilities
//! - Create resources on demand, up to `max`, and keep at least `min` alive
//! - Queue callers by priority once the pool is at capacity
//! - Validate idle resources before handing them out
//! - Reap resources that stayed idle longer than `idle_timeout`
//! - Drain: stop accepting callers and wait for every resource to return

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::observability::metrics;
use crate::pool::factory::{Create, Factory};
use crate::pool::wait_queue::WaitQueue;
use crate::pool::{PoolError, PoolStats};

/// A resource parked in the pool, with the instant it becomes reapable.
struct Idle<R> {
    resource: R,
    expires_at: Instant,
}

struct State<R> {
    idle: VecDeque<Idle<R>>,
    waiting: WaitQueue<R>,
    /// Live resources, including those still being created.
    size: usize,
    creating: usize,
    draining: bool,
    stats: PoolStats,
}

/// A pool of resources produced by one creation procedure.
///
/// Pools are always handled through an `Arc`; the background creation and
/// reaper tasks keep their own references.
pub struct Pool<R> {
    name: String,
    factory: Factory<R>,
    create: Box<dyn Create<R>>,
    state: Mutex<State<R>>,
    drained: Notify,
}

impl<R: Send + 'static> Pool<R> {
    /// Build a pool and start its background work.
    ///
    /// Creation of the `min` resources and idle reaping run on the current
    /// Tokio runtime. Outside a runtime the pool still works, but resources
    /// can only be created once callers acquire from inside one.
    pub fn new<C>(name: impl Into<String>, factory: Factory<R>, create: C) -> Arc<Self>
    where
        C: Create<R>,
    {
        let priority_range = factory.config().priority_range;
        let pool = Arc::new(Self {
            name: name.into(),
            factory,
            create: Box::new(create),
            state: Mutex::new(State {
                idle: VecDeque::new(),
                waiting: WaitQueue::new(priority_range),
                size: 0,
                creating: 0,
                draining: false,
                stats: PoolStats::default(),
            }),
            drained: Notify::new(),
        });

        pool.ensure_minimum();
        pool.spawn_reaper();
        pool
    }

    /// Queue a request for a resource.
    ///
    /// The caller is registered before this returns, so `pending_count`
    /// reflects it immediately. Lower `priority` values are served first;
    /// `None` or an out-of-range value means least urgent.
    pub fn acquire(self: &Arc<Self>, priority: Option<usize>) -> Checkout<R> {
        let (reply, rx) = oneshot::channel();
        {
            let mut state = self.lock();
            if state.draining {
                let _ = reply.send(Err(PoolError::Draining));
                return Checkout::new(self, rx);
            }
            state.waiting.push(priority, reply);
        }
        self.dispense();
        Checkout::new(self, rx)
    }

    /// Return a resource so it can be handed to the next caller.
    pub fn release(self: &Arc<Self>, resource: R) {
        {
            let mut state = self.lock();
            let expires_at = Instant::now() + self.factory.config().idle_timeout();
            state.idle.push_back(Idle {
                resource,
                expires_at,
            });
            if self.factory.config().log {
                debug!(pool = %self.name, idle = state.idle.len(), "resource released");
            }
        }
        self.dispense();
    }

    /// Take a resource out of circulation for good.
    pub fn destroy(self: &Arc<Self>, resource: R) {
        {
            let mut state = self.lock();
            state.size = state.size.saturating_sub(1);
            state.stats.destroyed += 1;
        }
        self.factory.dispose(resource);
        metrics::record_destroyed(&self.name, 1);
        self.ensure_minimum();
        self.dispense();
    }

    /// Stop accepting callers and wait until nobody is waiting and every
    /// resource is back in the pool.
    pub async fn drain(self: &Arc<Self>) {
        self.lock().draining = true;
        debug!(pool = %self.name, "draining");
        loop {
            let notified = self.drained.notified();
            if self.is_quiescent() {
                return;
            }
            notified.await;
        }
    }

    /// Destroy every idle resource right away.
    pub fn destroy_all_now(self: &Arc<Self>) {
        let doomed: Vec<R> = {
            let mut state = self.lock();
            let doomed: Vec<R> = state.idle.drain(..).map(|idle| idle.resource).collect();
            state.size -= doomed.len();
            state.stats.destroyed += doomed.len() as u64;
            doomed
        };
        metrics::record_destroyed(&self.name, doomed.len());
        for resource in doomed {
            self.factory.dispose(resource);
        }
        self.drained.notify_waiters();
    }

    fn dispense(self: &Arc<Self>) {
        let mut doomed = Vec::new();
        loop {
            let candidate = {
                let mut state = self.lock();
                state.waiting.prune();
                if state.waiting.is_empty() {
                    break;
                }
                match state.idle.pop_front() {
                    Some(idle) => idle,
                    None => break,
                }
            };

            // The validate hook runs unlocked so it may inspect the pool.
            let valid = self.factory.is_valid(&candidate.resource);
            let mut state = self.lock();
            if !valid {
                state.size -= 1;
                state.stats.destroyed += 1;
                doomed.push(candidate.resource);
                continue;
            }

            match state.waiting.hand_over(candidate.resource) {
                Ok(()) => state.stats.acquired += 1,
                Err(resource) => {
                    state.idle.push_front(Idle {
                        resource,
                        expires_at: candidate.expires_at,
                    });
                    break;
                }
            }
        }

        let to_create = {
            let mut state = self.lock();
            let max = self.factory.config().max;
            let mut to_create = 0;
            while state.waiting.len() > state.creating && state.size < max {
                state.size += 1;
                state.creating += 1;
                to_create += 1;
            }
            metrics::record_waiting(&self.name, state.waiting.len());
            to_create
        };

        if !doomed.is_empty() {
            if self.factory.config().log {
                debug!(pool = %self.name, count = doomed.len(), "destroying invalid resources");
            }
            metrics::record_destroyed(&self.name, doomed.len());
            for resource in doomed {
                self.factory.dispose(resource);
            }
            self.ensure_minimum();
        }

        for _ in 0..to_create {
            self.spawn_create();
        }

        if self.lock().draining {
            self.drained.notify_waiters();
        }
    }

    /// Start creations until the pool holds at least `min` resources.
    fn ensure_minimum(self: &Arc<Self>) {
        let missing = {
            let mut state = self.lock();
            if state.draining {
                0
            } else {
                let missing = self.factory.config().min.saturating_sub(state.size);
                state.size += missing;
                state.creating += missing;
                missing
            }
        };
        for _ in 0..missing {
            self.spawn_create();
        }
    }

    /// Run one creation. `size` and `creating` were already bumped.
    fn spawn_create(self: &Arc<Self>) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(pool = %self.name, "no async runtime, cannot create resource");
                self.finish_create(Err(PoolError::NoRuntime));
                return;
            }
        };

        let pool = Arc::clone(self);
        let creation = self.create.create();
        handle.spawn(async move {
            let outcome = creation.await.map_err(PoolError::Create);
            pool.finish_create(outcome);
        });
    }

    fn finish_create(self: &Arc<Self>, outcome: Result<R, PoolError>) {
        {
            let mut state = self.lock();
            state.creating -= 1;
            match outcome {
                Ok(resource) => {
                    state.stats.created += 1;
                    metrics::record_created(&self.name);
                    match state.waiting.hand_over(resource) {
                        Ok(()) => state.stats.acquired += 1,
                        Err(resource) => {
                            let expires_at = Instant::now() + self.factory.config().idle_timeout();
                            state.idle.push_back(Idle {
                                resource,
                                expires_at,
                            });
                        }
                    }
                    if self.factory.config().log {
                        debug!(pool = %self.name, size = state.size, "resource created");
                    }
                }
                Err(error) => {
                    state.size -= 1;
                    state.stats.create_failures += 1;
                    warn!(pool = %self.name, error = %error, "resource creation failed");
                    if let Some(reply) = state.waiting.pop() {
                        let _ = reply.send(Err(error));
                    }
                }
            }
        }
        self.dispense();
    }

    /// Destroy idle resources whose lifetime ran out.
    fn reap_idle(self: &Arc<Self>) {
        let now = Instant::now();
        let doomed: Vec<R> = {
            let mut state = self.lock();
            let mut removable = if self.factory.config().refresh_idle {
                usize::MAX
            } else {
                state.size.saturating_sub(self.factory.config().min)
            };

            let mut kept = VecDeque::with_capacity(state.idle.len());
            let mut doomed = Vec::new();
            for idle in state.idle.drain(..) {
                if idle.expires_at <= now && removable > 0 {
                    removable -= 1;
                    doomed.push(idle.resource);
                } else {
                    kept.push_back(idle);
                }
            }
            state.idle = kept;
            state.size -= doomed.len();
            state.stats.destroyed += doomed.len() as u64;
            doomed
        };

        if doomed.is_empty() {
            return;
        }
        if self.factory.config().log {
            debug!(pool = %self.name, count = doomed.len(), "reaped idle resources");
        }
        metrics::record_destroyed(&self.name, doomed.len());
        for resource in doomed {
            self.factory.dispose(resource);
        }
        self.ensure_minimum();
        if self.lock().draining {
            self.drained.notify_waiters();
        }
    }

    fn spawn_reaper(self: &Arc<Self>) {
        let Ok(handle) = Handle::try_current() else {
            debug!(pool = %self.name, "no async runtime, idle reaping disabled");
            return;
        };

        let pool = Arc::downgrade(self);
        let period = self.factory.config().reap_interval();
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                pool.reap_idle();
            }
        });
    }
}

impl<R> Pool<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of callers queued for a resource.
    pub fn pending_count(&self) -> usize {
        self.lock().waiting.len()
    }

    /// Live resources, idle or in use, including ones being created.
    pub fn size(&self) -> usize {
        self.lock().size
    }

    /// Idle resources ready to be handed out.
    pub fn available(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn min(&self) -> usize {
        self.factory.config().min
    }

    pub fn max(&self) -> usize {
        self.factory.config().max
    }

    /// True while the pool may still grow.
    pub fn has_headroom(&self) -> bool {
        self.lock().size < self.factory.config().max
    }

    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    fn is_quiescent(&self) -> bool {
        let state = self.lock();
        state.waiting.is_empty() && state.creating == 0 && state.idle.len() == state.size
    }

    fn lock(&self) -> MutexGuard<'_, State<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("size", &state.size)
            .field("idle", &state.idle.len())
            .field("waiting", &state.waiting.len())
            .field("draining", &state.draining)
            .finish()
    }
}

/// A pending request for a resource from a [`Pool`].
///
/// Dropping it before it resolves withdraws the request. A resource that was
/// already delivered but never collected goes back to the pool.
#[must_use = "the request is withdrawn when the checkout is dropped"]
pub struct Checkout<R: Send + 'static> {
    pool: Weak<Pool<R>>,
    rx: oneshot::Receiver<Result<R, PoolError>>,
}

impl<R: Send + 'static> Checkout<R> {
    fn new(pool: &Arc<Pool<R>>, rx: oneshot::Receiver<Result<R, PoolError>>) -> Self {
        Self {
            pool: Arc::downgrade(pool),
            rx,
        }
    }
}

impl<R: Send + 'static> Future for Checkout<R> {
    type Output = Result<R, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|delivered| delivered.unwrap_or(Err(PoolError::Closed)))
    }
}

impl<R: Send + 'static> Drop for Checkout<R> {
    fn drop(&mut self) {
        // Closing first makes any later hand-over fail and move on to the
        // next waiter, so only a resource already in flight is left here.
        self.rx.close();
        if let Ok(Ok(resource)) = self.rx.try_recv() {
            match self.pool.upgrade() {
                Some(pool) => pool.release(resource),
                None => drop(resource),
            }
        }
    }
}

impl<R: Send + 'static> fmt::Debug for Checkout<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkout").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::pool::BoxError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    fn factory(config: PoolConfig) -> Factory<usize> {
        Factory::new(config).unwrap()
    }

    fn counting(counter: Arc<AtomicUsize>) -> impl Create<usize> {
        move || {
            let serial = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, BoxError>(serial) }
        }
    }

    #[tokio::test]
    async fn test_queues_beyond_max() {
        let created = Arc::new(AtomicUsize::new(0));
        let config = PoolConfig {
            max: 2,
            ..PoolConfig::default()
        };
        let pool = Pool::new("p", factory(config), counting(created.clone()));

        let a = pool.acquire(None).await.unwrap();
        let b = pool.acquire(None).await.unwrap();
        assert!(!pool.has_headroom());

        let third = pool.acquire(None);
        assert_eq!(pool.pending_count(), 1);

        pool.release(a);
        assert_eq!(third.await.unwrap(), a);
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(created.load(Ordering::SeqCst), 2);
        pool.release(b);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_invalid_idle_resource_is_replaced() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let factory = factory(PoolConfig::default())
            .with_validate(|serial: &usize| *serial != 0)
            .with_destroy(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let pool = Pool::new("p", factory, counting(created));

        let first = pool.acquire(None).await.unwrap();
        assert_eq!(first, 0);
        pool.release(first);

        assert_eq!(pool.acquire(None).await.unwrap(), 1);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().destroyed, 1);
    }

    #[tokio::test]
    async fn test_creation_failure_reaches_caller() {
        let config = PoolConfig::default();
        let pool = Pool::new("p", factory(config), || async {
            Err::<usize, BoxError>("backend down".into())
        });

        let err = pool.acquire(None).await.unwrap_err();
        assert!(matches!(err, PoolError::Create(_)));
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.stats().create_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creates_minimum_up_front() {
        let created = Arc::new(AtomicUsize::new(0));
        let config = PoolConfig {
            min: 2,
            max: 3,
            ..PoolConfig::default()
        };
        let pool = Pool::new("p", factory(config), counting(created.clone()));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(pool.size(), 2);
        assert_eq!(pool.available(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaps_expired_idle_resources() {
        let config = PoolConfig {
            max: 2,
            idle_timeout_ms: 1_000,
            reap_interval_ms: 500,
            ..PoolConfig::default()
        };
        let pool = Pool::new("p", factory(config), counting(Arc::new(AtomicUsize::new(0))));

        let resource = pool.acquire(None).await.unwrap();
        pool.release(resource);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(pool.available(), 1);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.stats().destroyed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaping_keeps_minimum_without_refresh() {
        let created = Arc::new(AtomicUsize::new(0));
        let config = PoolConfig {
            min: 1,
            max: 2,
            idle_timeout_ms: 100,
            reap_interval_ms: 100,
            refresh_idle: false,
            ..PoolConfig::default()
        };
        let pool = Pool::new("p", factory(config), counting(created.clone()));

        let a = pool.acquire(None).await.unwrap();
        let b = pool.acquire(None).await.unwrap();
        pool.release(a);
        pool.release(b);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(pool.size(), 1);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_checkout_is_not_pending() {
        let config = PoolConfig::default();
        let pool = Pool::new("p", factory(config), counting(Arc::new(AtomicUsize::new(0))));

        let held = pool.acquire(None).await.unwrap();
        let abandoned = pool.acquire(None);
        assert_eq!(pool.pending_count(), 1);
        drop(abandoned);
        assert_eq!(pool.pending_count(), 0);

        pool.release(held);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_uncollected_resource_returns_on_drop() {
        let created = Arc::new(AtomicUsize::new(0));
        let pool = Pool::new("p", factory(PoolConfig::default()), counting(created.clone()));

        let held = pool.acquire(None).await.unwrap();
        let waiter = pool.acquire(None);
        pool.release(held);
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.available(), 0);

        drop(waiter);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.size(), 1);

        let again = tokio::time::timeout(Duration::from_secs(1), pool.acquire(None))
            .await
            .expect("resource should be back in the pool")
            .unwrap();
        assert_eq!(again, held);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validate_hook_may_inspect_the_pool() {
        let slot: Arc<OnceLock<Weak<Pool<usize>>>> = Arc::new(OnceLock::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let factory = factory(PoolConfig::default()).with_validate({
            let slot = slot.clone();
            let seen = seen.clone();
            move |_: &usize| {
                if let Some(pool) = slot.get().and_then(Weak::upgrade) {
                    seen.store(pool.size() + pool.available(), Ordering::SeqCst);
                }
                true
            }
        });
        let pool = Pool::new("p", factory, counting(Arc::new(AtomicUsize::new(0))));
        slot.set(Arc::downgrade(&pool)).unwrap();

        let resource = pool.acquire(None).await.unwrap();
        pool.release(resource);
        assert_eq!(pool.acquire(None).await.unwrap(), resource);
        // The candidate is out of the idle list while it is checked.
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_outstanding_resources() {
        let config = PoolConfig::default();
        let pool = Pool::new("p", factory(config), counting(Arc::new(AtomicUsize::new(0))));
        let held = pool.acquire(None).await.unwrap();

        let draining = tokio::spawn({
            let pool = pool.clone();
            async move { pool.drain().await }
        });
        tokio::task::yield_now().await;
        assert!(matches!(pool.acquire(None).await, Err(PoolError::Draining)));
        assert!(!draining.is_finished());

        pool.release(held);
        draining.await.unwrap();
        pool.destroy_all_now();
        assert_eq!(pool.size(), 0);
    }
}
