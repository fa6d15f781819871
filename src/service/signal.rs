//! Shutdown signal sources
//!
//! The supervisor subscribes to one [`ShutdownSignal`] per run, before any
//! runner is spawned. [`OsSignals`] is the default; [`ManualSignal`] lets
//! embedders and tests trigger the same shutdown path without involving
//! the OS.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Source of termination requests.
pub trait ShutdownSignal: Send + Sync {
    /// Starts listening right away. The returned future completes with the
    /// signal name once a termination is requested.
    ///
    /// Must be called from within a Tokio runtime.
    fn subscribe(&self) -> BoxFuture<'static, String>;
}

/// Interrupt, hang-up and terminate signals of the current process.
///
/// On Windows only Ctrl+C is observed. Handlers are installed by
/// [`ShutdownSignal::subscribe`], so a signal delivered after that call is
/// never lost to the default action.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignals;

impl ShutdownSignal for OsSignals {
    #[cfg(unix)]
    fn subscribe(&self) -> BoxFuture<'static, String> {
        use tokio::signal::unix::SignalKind;

        let interrupt = install(SignalKind::interrupt(), "SIGINT");
        let hangup = install(SignalKind::hangup(), "SIGHUP");
        let terminate = install(SignalKind::terminate(), "SIGTERM");

        async move {
            tokio::select! {
                name = recv(interrupt, "SIGINT") => name,
                name = recv(hangup, "SIGHUP") => name,
                name = recv(terminate, "SIGTERM") => name,
            }
        }
        .boxed()
    }

    #[cfg(windows)]
    fn subscribe(&self) -> BoxFuture<'static, String> {
        let ctrl_c = tokio::signal::windows::ctrl_c()
            .map_err(|err| tracing::error!(error = %err, "Failed to install Ctrl+C handler"))
            .ok();

        async move {
            if let Some(mut ctrl_c) = ctrl_c {
                if ctrl_c.recv().await.is_some() {
                    return "Ctrl+C".to_string();
                }
            }
            std::future::pending().await
        }
        .boxed()
    }
}

#[cfg(unix)]
fn install(kind: tokio::signal::unix::SignalKind, name: &'static str) -> Option<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(kind)
        .map_err(|err| tracing::error!(signal = name, error = %err, "Failed to install signal handler"))
        .ok()
}

// A handler that could not be installed never fires.
#[cfg(unix)]
async fn recv(stream: Option<tokio::signal::unix::Signal>, name: &'static str) -> String {
    if let Some(mut stream) = stream {
        if stream.recv().await.is_some() {
            return name.to_string();
        }
    }
    std::future::pending().await
}

/// Signal triggered from code.
///
/// Once triggered it stays triggered; a trigger issued before anyone
/// subscribes is not lost.
#[derive(Debug, Default, Clone)]
pub struct ManualSignal {
    inner: Arc<ManualInner>,
}

#[derive(Debug, Default)]
struct ManualInner {
    name: Mutex<Option<String>>,
    notify: Notify,
}

impl ManualInner {
    fn current(&self) -> Option<String> {
        self.name.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ManualSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, name: impl Into<String>) {
        let mut slot = self.inner.name.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(name.into());
        }
        drop(slot);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.current().is_some()
    }
}

impl ShutdownSignal for ManualSignal {
    fn subscribe(&self) -> BoxFuture<'static, String> {
        let inner = Arc::clone(&self.inner);
        async move {
            loop {
                let notified = inner.notify.notified();
                if let Some(name) = inner.current() {
                    return name;
                }
                notified.await;
            }
        }
        .boxed()
    }
}
