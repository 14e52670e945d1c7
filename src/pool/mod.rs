//! Resource pool subsystem.
//!
//! # Data Flow
//! ```text
//! acquire(priority)
//!     → wait_queue.rs (register caller in its priority lane)
//!     → generic.rs dispense:
//!         - idle resource available → validate → hand to head waiter
//!         - below max → spawn creation (factory.rs Create) → hand to head waiter
//!         - at max → caller stays queued until a release
//!     → Checkout resolves with the resource or a PoolError
//!
//! release(resource) → parked idle (stamped with expiry) → dispense
//! reaper tick → destroy expired idle resources → refill to min
//! ```
//!
//! # Design Decisions
//! - Callers are registered synchronously so queue depth is observable at once
//! - One creation per queued caller, never beyond max
//! - Pool state sits behind a std mutex that is never held across an await

pub mod factory;
pub mod generic;
mod wait_queue;

use thiserror::Error;

pub use factory::{BoxError, Create, Factory};
pub use generic::{Checkout, Pool};

/// Errors a pool reports to the caller waiting on a [`Checkout`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// The creation procedure failed.
    #[error("resource creation failed: {0}")]
    Create(#[source] BoxError),

    /// The pool stopped accepting callers.
    #[error("pool is draining")]
    Draining,

    /// The pool went away before a resource became available.
    #[error("pool closed before a resource became available")]
    Closed,

    /// Resources cannot be created outside an async runtime.
    #[error("no async runtime available to create resources")]
    NoRuntime,
}

/// Lifetime counters of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Resources successfully created.
    pub created: u64,
    /// Resources destroyed (invalid, reaped or explicitly destroyed).
    pub destroyed: u64,
    /// Resources handed to callers.
    pub acquired: u64,
    /// Failed creation attempts.
    pub create_failures: u64,
}
