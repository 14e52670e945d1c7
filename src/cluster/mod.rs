//! Pool cluster subsystem.
//!
//! # Data Flow
//! ```text
//! acquire(priority)
//!     → no pools? → ClusterError::NoPools
//!     → selection.rs (rotate from cursor, prefer a pool with no waiters)
//!     → advance cursor past the picked pool
//!     → pool.acquire(priority) (caller queued on the picked pool)
//!     → Acquisition (hint + pool handle), awaited for a Lease
//!     → Lease dropped → resource released to the same pool
//! ```
//!
//! # Design Decisions
//! - The cluster is stateless apart from the rotation cursor
//! - Pools own capacity, queuing and resource lifecycle
//! - Pool errors pass through untouched, tagged with the pool they came from
//! - Pools are registered up front (`&mut self`) and never removed

pub mod lease;
pub mod pool_cluster;
pub mod selection;

use thiserror::Error;

use crate::pool::PoolError;

pub use lease::{Acquisition, Lease};
pub use pool_cluster::PoolCluster;
pub use selection::{Backlog, Rotation};

/// Errors returned by cluster acquisitions.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// `acquire` was called before any pool was added.
    #[error("no pools registered")]
    NoPools,

    /// The selected pool could not provide a resource.
    #[error("pool `{pool}` (index {index}) failed: {source}")]
    Pool {
        pool: String,
        index: usize,
        #[source]
        source: PoolError,
    },
}

impl ClusterError {
    /// Index of the pool involved, if any.
    pub fn pool_index(&self) -> Option<usize> {
        match self {
            ClusterError::NoPools => None,
            ClusterError::Pool { index, .. } => Some(*index),
        }
    }
}
