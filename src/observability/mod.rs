//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pools and the cluster produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → Whatever subscriber / recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing a subscriber or recorder is the
//!   application's call (`logging::init` covers the common case)
//! - Verbose per-pool events are gated by `PoolConfig::log`
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
