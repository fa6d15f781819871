use crate::di::Container;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A unit of work driven by the [`Service`](super::Service).
///
/// Runners are expected to return once `cancel` fires. A returned error or
/// a panic stops every other runner of the same run.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, cancel: CancellationToken, container: Arc<Container>) -> anyhow::Result<()>;

    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Runner executing an async closure.
pub struct FnRunner<F> {
    name: String,
    run: F,
}

/// Wraps a closure into a [`Runner`].
///
/// ```
/// use corekit::service::runner_fn;
///
/// let runner = runner_fn("ticker", |cancel, _container| async move {
///     cancel.cancelled().await;
///     anyhow::Ok(())
/// });
/// # let _ = runner;
/// ```
pub fn runner_fn<F, Fut>(name: impl Into<String>, run: F) -> FnRunner<F>
where
    F: Fn(CancellationToken, Arc<Container>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnRunner {
        name: name.into(),
        run,
    }
}

#[async_trait]
impl<F, Fut> Runner for FnRunner<F>
where
    F: Fn(CancellationToken, Arc<Container>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, cancel: CancellationToken, container: Arc<Container>) -> anyhow::Result<()> {
        (self.run)(cancel, container).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
