use crate::di::Container;
use crate::service::{Runner, ServiceError};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A long-lived server, such as an HTTP router, serving until canceled.
#[async_trait]
pub trait Router: Send + Sync {
    async fn serve(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// Runner driving a [`Router`].
pub struct RouterRunner {
    router: Arc<dyn Router>,
}

impl RouterRunner {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Runner for RouterRunner {
    async fn run(&self, cancel: CancellationToken, _: Arc<Container>) -> anyhow::Result<()> {
        self.router.serve(cancel).await.context("run router")
    }
}

/// A router that only waits for cancellation, then reports it.
#[derive(Debug, Default)]
pub struct NopRouter;

#[async_trait]
impl Router for NopRouter {
    async fn serve(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        cancel.cancelled().await;
        Err(ServiceError::Canceled.into())
    }
}
