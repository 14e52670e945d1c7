//! Shared helpers for cluster integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cluster_pool::config::PoolConfig;
use cluster_pool::pool::{BoxError, Create, Factory};
use cluster_pool::PoolCluster;

/// A resource that remembers which backend produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conn {
    pub backend: usize,
    pub serial: usize,
}

/// Creator for backend `backend`, counting every resource it makes.
pub fn conn_creator(backend: usize, created: Arc<AtomicUsize>) -> impl Create<Conn> {
    move || {
        let serial = created.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, BoxError>(Conn { backend, serial }) }
    }
}

/// Creator whose backend is always down.
#[allow(dead_code)]
pub fn failing_creator() -> impl Create<Conn> {
    || async { Err::<Conn, BoxError>("connection refused".into()) }
}

/// Cluster of `backends` pools sharing `config`, plus per-pool creation
/// counters.
pub fn cluster_with(config: PoolConfig, backends: usize) -> (PoolCluster<Conn>, Vec<Arc<AtomicUsize>>) {
    let mut cluster = PoolCluster::new(Factory::new(config).unwrap());
    let created: Vec<Arc<AtomicUsize>> = (0..backends).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for (backend, counter) in created.iter().enumerate() {
        cluster.add(conn_creator(backend, counter.clone()));
    }
    (cluster, created)
}
