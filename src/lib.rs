//! Load-balancing cluster of resource pools.
//!
//! A [`PoolCluster`] holds one [`Pool`] per backend server and routes every
//! acquisition to one of them: round-robin under light load, skipping pools
//! that already have callers queued when another pool has nobody waiting.

pub mod cluster;
pub mod config;
pub mod observability;
pub mod pool;

pub use cluster::{Acquisition, ClusterError, Lease, PoolCluster};
pub use config::{ClusterConfig, PoolConfig};
pub use pool::{Factory, Pool, PoolError};
