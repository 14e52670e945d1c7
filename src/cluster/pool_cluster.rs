//! A cluster of pools treated as one virtual pool.
//!
//! # Responsibilities
//! - Register one pool per backend, sharing a single factory
//! - Route each acquisition to a pool picked by `selection.rs`
//! - Hand back the pool alongside the resource so it is released correctly

use std::sync::Arc;

use tracing::debug;

use crate::cluster::lease::Acquisition;
use crate::cluster::selection::Rotation;
use crate::cluster::ClusterError;
use crate::observability::metrics;
use crate::pool::{Create, Factory, Pool};

/// Ordered set of pools with a shared rotation cursor.
#[derive(Debug)]
pub struct PoolCluster<R> {
    factory: Factory<R>,
    pools: Vec<Arc<Pool<R>>>,
    rotation: Rotation,
}

impl<R: Send + 'static> PoolCluster<R> {
    /// Create an empty cluster. Every pool added later is built from a
    /// clone of `factory`.
    pub fn new(factory: Factory<R>) -> Self {
        Self {
            factory,
            pools: Vec::new(),
            rotation: Rotation::new(),
        }
    }

    /// Register a backend pool whose resources come from `create`.
    ///
    /// The pool is named `<config name>-<index>` and joins the rotation
    /// after the pools registered before it.
    pub fn add<C>(&mut self, create: C) -> &Arc<Pool<R>>
    where
        C: Create<R>,
    {
        let name = format!("{}-{}", self.factory.config().name, self.pools.len());
        self.add_named(name, create)
    }

    /// Register a backend pool under an explicit name.
    pub fn add_named<C>(&mut self, name: impl Into<String>, create: C) -> &Arc<Pool<R>>
    where
        C: Create<R>,
    {
        let pool = Pool::new(name, self.factory.clone(), create);
        debug!(pool = %pool.name(), index = self.pools.len(), "pool registered");
        self.pools.push(pool);
        &self.pools[self.pools.len() - 1]
    }

    /// Route a request for a resource to one of the pools.
    ///
    /// The pool is chosen and the request queued on it before this returns;
    /// the resource arrives when the returned [`Acquisition`] is awaited.
    /// `priority` is passed to the pool untouched.
    ///
    /// Fails only when no pool has been registered.
    pub fn acquire(&self, priority: Option<usize>) -> Result<Acquisition<R>, ClusterError> {
        let acquisition = self
            .rotation
            .dispatch(&self.pools, |index, pool| {
                let checkout = pool.acquire(priority);
                Acquisition::new(Arc::clone(pool), index, pool.has_headroom(), checkout)
            })
            .ok_or(ClusterError::NoPools)?;

        debug!(
            pool = %acquisition.pool().name(),
            index = acquisition.index(),
            pending = acquisition.pool().pending_count(),
            has_capacity = acquisition.has_capacity(),
            "request dispatched"
        );
        metrics::record_dispatch(acquisition.pool().name());
        Ok(acquisition)
    }
}

impl<R> PoolCluster<R> {
    /// Pools in rotation order.
    pub fn pools(&self) -> &[Arc<Pool<R>>] {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Index the next selection starts scanning from.
    pub fn next_index(&self) -> usize {
        self.rotation.cursor()
    }
}
