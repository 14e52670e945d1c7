//! Metrics collection.
//!
//! # Metrics
//! - `cluster_pool_dispatched_total` (counter): requests routed to a pool
//! - `cluster_pool_created_total` (counter): resources created per pool
//! - `cluster_pool_destroyed_total` (counter): resources destroyed per pool
//! - `cluster_pool_waiting` (gauge): callers queued per pool
//!
//! # Design Decisions
//! - Labelled by pool name
//! - No exporter here; the embedding application installs a recorder

use metrics::{counter, gauge};

pub fn record_dispatch(pool: &str) {
    counter!("cluster_pool_dispatched_total", "pool" => pool.to_string()).increment(1);
}

pub fn record_created(pool: &str) {
    counter!("cluster_pool_created_total", "pool" => pool.to_string()).increment(1);
}

pub fn record_destroyed(pool: &str, count: usize) {
    if count > 0 {
        counter!("cluster_pool_destroyed_total", "pool" => pool.to_string())
            .increment(count as u64);
    }
}

pub fn record_waiting(pool: &str, waiting: usize) {
    gauge!("cluster_pool_waiting", "pool" => pool.to_string()).set(waiting as f64);
}
