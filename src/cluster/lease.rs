//! Acquisition results handed out by the cluster.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::cluster::ClusterError;
use crate::pool::{Checkout, Pool};

/// A request routed to one pool of the cluster, not yet fulfilled.
///
/// Await it for the [`Lease`]. Dropping it first withdraws the request from
/// the pool's queue; a resource already delivered to it goes back to that
/// pool.
#[must_use = "the request is withdrawn when the acquisition is dropped"]
pub struct Acquisition<R: Send + 'static> {
    pool: Arc<Pool<R>>,
    index: usize,
    has_capacity: bool,
    checkout: Checkout<R>,
}

impl<R: Send + 'static> Acquisition<R> {
    pub(crate) fn new(
        pool: Arc<Pool<R>>,
        index: usize,
        has_capacity: bool,
        checkout: Checkout<R>,
    ) -> Self {
        Self {
            pool,
            index,
            has_capacity,
            checkout,
        }
    }

    /// The pool the request was routed to.
    pub fn pool(&self) -> &Arc<Pool<R>> {
        &self.pool
    }

    /// Registration index of that pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Best-effort hint about the selected pool only, taken right after the
    /// request was queued on it: `true` while that pool is below `max`.
    /// It says nothing about the other pools of the cluster. `false` means
    /// the request may have to wait for a release.
    pub fn has_capacity(&self) -> bool {
        self.has_capacity
    }
}

impl<R: Send + 'static> Future for Acquisition<R> {
    type Output = Result<Lease<R>, ClusterError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.checkout).poll(cx).map(|delivered| match delivered {
            Ok(resource) => Ok(Lease {
                resource: Some(resource),
                pool: Arc::clone(&this.pool),
                index: this.index,
            }),
            Err(source) => Err(ClusterError::Pool {
                pool: this.pool.name().to_string(),
                index: this.index,
                source,
            }),
        })
    }
}

impl<R: Send + 'static> fmt::Debug for Acquisition<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquisition")
            .field("pool", &self.pool.name())
            .field("index", &self.index)
            .field("has_capacity", &self.has_capacity)
            .finish()
    }
}

/// A resource on loan from one pool of the cluster.
///
/// Dereferences to the resource. Dropping the lease releases the resource
/// to the pool it came from, and only to that pool.
pub struct Lease<R: Send + 'static> {
    // Invariant: `Some` for the whole life of the lease. Only the consuming
    // methods (`destroy`, `detach`) and `Drop` take it out.
    resource: Option<R>,
    pool: Arc<Pool<R>>,
    index: usize,
}

impl<R: Send + 'static> Lease<R> {
    /// The pool the resource belongs to.
    pub fn pool(&self) -> &Arc<Pool<R>> {
        &self.pool
    }

    /// Registration index of that pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Give the resource back to its pool.
    pub fn release(self) {
        drop(self);
    }

    /// Destroy the resource instead of returning it, e.g. after it broke.
    pub fn destroy(mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.destroy(resource);
        }
    }

    /// Take the resource out of the lease. The caller becomes responsible
    /// for releasing it to the returned pool.
    pub fn detach(mut self) -> (R, Arc<Pool<R>>) {
        // invariant: `self` is consumed here, so nothing took the resource yet.
        let resource = self
            .resource
            .take()
            .expect("lease holds its resource until consumed");
        (resource, Arc::clone(&self.pool))
    }
}

impl<R: Send + 'static> Deref for Lease<R> {
    type Target = R;

    fn deref(&self) -> &R {
        // invariant: a live lease always holds its resource.
        self.resource.as_ref().expect("lease holds its resource until consumed")
    }
}

impl<R: Send + 'static> DerefMut for Lease<R> {
    fn deref_mut(&mut self) -> &mut R {
        // invariant: a live lease always holds its resource.
        self.resource.as_mut().expect("lease holds its resource until consumed")
    }
}

impl<R: Send + 'static> Drop for Lease<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release(resource);
        }
    }
}

impl<R: Send + fmt::Debug + 'static> fmt::Debug for Lease<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("resource", &self.resource)
            .field("pool", &self.pool.name())
            .field("index", &self.index)
            .finish()
    }
}
