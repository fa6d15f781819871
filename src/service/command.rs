use crate::di::Container;
use crate::service::Runner;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// A one-shot CLI command.
#[async_trait]
pub trait Command: Send + Sync {
    async fn execute(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// Runner executing a [`Command`] once.
pub struct CommandRunner {
    command: Arc<dyn Command>,
}

impl CommandRunner {
    pub fn new(command: Arc<dyn Command>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Runner for CommandRunner {
    async fn run(&self, cancel: CancellationToken, _: Arc<Container>) -> anyhow::Result<()> {
        self.command.execute(cancel).await.context("command execute")
    }
}

/// A command doing nothing but remembering it was executed.
#[derive(Debug, Default)]
pub struct NopCommand {
    executed: AtomicBool,
}

impl NopCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Command for NopCommand {
    async fn execute(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        anyhow::ensure!(!cancel.is_cancelled(), "canceled");
        self.executed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
