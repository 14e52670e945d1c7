//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClusterConfig (validated, immutable)
//!     → PoolConfig cloned into each pool's Factory
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; pools copy what they need at creation
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BackendConfig;
pub use schema::ClusterConfig;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
pub use validation::ValidationError;
