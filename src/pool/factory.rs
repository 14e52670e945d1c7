//! Shared pool factory and per-pool creation procedures.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::config::validation::validate_pool;
use crate::config::{ConfigError, PoolConfig};

/// Error type returned by creation procedures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Procedure that produces a fresh resource for one pool.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<R, BoxError>>`,
/// so a closure is usually all a caller needs.
pub trait Create<R>: Send + Sync + 'static {
    fn create(&self) -> BoxFuture<'static, Result<R, BoxError>>;
}

impl<R, F, Fut> Create<R> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
{
    fn create(&self) -> BoxFuture<'static, Result<R, BoxError>> {
        (self)().boxed()
    }
}

type ValidateFn<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;
type DestroyFn<R> = Arc<dyn Fn(R) + Send + Sync>;

/// Everything a pool needs except its creation procedure.
///
/// A cluster keeps one factory and clones it into every pool it registers.
pub struct Factory<R> {
    config: PoolConfig,
    validate: Option<ValidateFn<R>>,
    destroy: Option<DestroyFn<R>>,
}

impl<R> Factory<R> {
    /// Create a factory from validated tunables.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        validate_pool(&config).map_err(ConfigError::Validation)?;
        Ok(Self {
            config,
            validate: None,
            destroy: None,
        })
    }

    /// Check idle resources before they are handed out; `false` destroys them.
    ///
    /// The hook runs without the pool's lock held, so it may query the pool.
    /// It can run inside `PoolCluster::acquire`, so it must not acquire from
    /// the cluster itself.
    pub fn with_validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Close a resource gently before it is dropped.
    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(R) + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(destroy));
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(crate) fn is_valid(&self, resource: &R) -> bool {
        self.validate.as_ref().map_or(true, |validate| validate(resource))
    }

    pub(crate) fn dispose(&self, resource: R) {
        if let Some(destroy) = &self.destroy {
            destroy(resource);
        }
    }
}

impl<R> Clone for Factory<R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            validate: self.validate.clone(),
            destroy: self.destroy.clone(),
        }
    }
}

impl<R> fmt::Debug for Factory<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("config", &self.config)
            .field("validate", &self.validate.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_rejects_invalid_config() {
        let config = PoolConfig {
            max: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            Factory::<u32>::new(config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_hooks_survive_clone() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let factory = Factory::new(PoolConfig::default())
            .unwrap()
            .with_validate(|value: &u32| *value < 10)
            .with_destroy(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let copy = factory.clone();
        assert!(copy.is_valid(&3));
        assert!(!copy.is_valid(&11));
        copy.dispose(11);
        factory.dispose(12);
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closure_is_a_creator() {
        let create = || async { Ok::<_, BoxError>(7u32) };
        assert_eq!(Create::<u32>::create(&create).await.unwrap(), 7);
    }
}
