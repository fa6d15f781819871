//! Runner supervisor
//!
//! ```text
//! idle ──run()──▶ running ──▶ draining ──▶ completed   (every runner returned Ok)
//!                                     └──▶ terminated  (signal, runner error or panic)
//! ```
//!
//! One task per runner plus one signal listener share a single
//! [`CancellationToken`]. Whatever cancels it first (a signal, a failing
//! runner, or the last runner finishing) ends the run; the others become
//! no-ops. The container is closed once the run returns.

use super::exit::ExitSlot;
use super::{ExitStatus, OsSignals, Runner, ServiceError, ShutdownSignal, panic_message};
use crate::di::Container;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

/// Drives registered runners against a shared container.
///
/// # Example
///
/// ```rust,no_run
/// use corekit::di::ContainerBuilder;
/// use corekit::service::{runner_fn, Service};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     let container = ContainerBuilder::new().build().expect("container");
///     let service = Service::new(container);
///
///     service.register_runner(runner_fn("worker", |cancel, _container| async move {
///         cancel.cancelled().await;
///         anyhow::Ok(())
///     }));
///
///     service.run(CancellationToken::new()).await.into()
/// }
/// ```
pub struct Service {
    container: Arc<Container>,
    runners: Mutex<Vec<Arc<dyn Runner>>>,
    executed: AtomicBool,
    signal: Arc<dyn ShutdownSignal>,
    span: Span,
}

struct RunState {
    container: Arc<Container>,
    cancel: CancellationToken,
    exit: ExitSlot,
    remaining: AtomicUsize,
}

impl Service {
    pub fn new(container: impl Into<Arc<Container>>) -> Self {
        Self {
            container: container.into(),
            runners: Mutex::new(Vec::new()),
            executed: AtomicBool::new(false),
            signal: Arc::new(OsSignals),
            span: tracing::info_span!("service", who = "corekit.Service"),
        }
    }

    /// Replaces the OS signal listener.
    pub fn with_shutdown_signal(mut self, signal: impl ShutdownSignal + 'static) -> Self {
        self.signal = Arc::new(signal);
        self
    }

    /// Span wrapping every supervised task.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn runner_count(&self) -> usize {
        self.lock_runners().len()
    }

    pub fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    /// # Panics
    ///
    /// Panics if [`Service::run`] has already been called.
    pub fn register_runner(&self, runner: impl Runner + 'static) {
        self.register_runners([Arc::new(runner) as Arc<dyn Runner>]);
    }

    /// # Panics
    ///
    /// Panics if [`Service::run`] has already been called.
    pub fn register_runners(&self, runners: impl IntoIterator<Item = Arc<dyn Runner>>) {
        let mut registered = self.lock_runners();
        if self.executed.load(Ordering::SeqCst) {
            tracing::error!(parent: &self.span, "Service is already executed, cannot register the runner");
            drop(registered);
            panic!("service is already executed, cannot register the runner");
        }
        registered.extend(runners);
    }

    /// Runs every registered runner until all finish or the run is cut
    /// short, then closes the container. Returns the exit status.
    pub async fn run(&self, ctx: CancellationToken) -> ExitStatus {
        let runners = {
            let mut registered = self.lock_runners();
            self.executed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *registered)
        };

        let _close = CloseOnDrop {
            container: &self.container,
            span: &self.span,
        };

        let cancel = ctx.child_token();
        let status = self
            .supervise(runners, &cancel)
            .instrument(self.span.clone())
            .await;
        cancel.cancel();

        tracing::debug!(parent: &self.span, code = status.code(), "Got exit code");
        status
    }

    async fn supervise(&self, runners: Vec<Arc<dyn Runner>>, cancel: &CancellationToken) -> ExitStatus {
        if runners.is_empty() {
            tracing::error!("No runners registered in the service");
            return ExitStatus::NoRunners;
        }
        if cancel.is_cancelled() {
            tracing::warn!("Context canceled before any runner started");
            return ExitStatus::Canceled;
        }

        let state = Arc::new(RunState {
            container: Arc::clone(&self.container),
            cancel: cancel.clone(),
            exit: ExitSlot::default(),
            remaining: AtomicUsize::new(runners.len()),
        });
        // Handlers must be in place before any runner can be scheduled.
        let shutdown = self.signal.subscribe();
        let mut tasks = JoinSet::new();

        tasks.spawn(listen_shutdown(shutdown, Arc::clone(&state)).instrument(Span::current()));

        tracing::info!("Starting {} runners", runners.len());
        for runner in runners {
            tasks.spawn(drive_runner(runner, Arc::clone(&state)).instrument(Span::current()));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_shutdown() => {
                    tracing::debug!(reason = %err, "Supervised task finished");
                }
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "Supervised task failed");
                }
                Err(join_err) => {
                    let err = ServiceError::TaskAborted(join_err.to_string());
                    tracing::error!(error = %err, "Supervised task failed");
                    state.exit.record(ExitStatus::RunnerFailed);
                    state.cancel.cancel();
                }
            }
        }

        state.exit.load()
    }

    fn lock_runners(&self) -> MutexGuard<'_, Vec<Arc<dyn Runner>>> {
        self.runners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn listen_shutdown(shutdown: BoxFuture<'static, String>, state: Arc<RunState>) -> Result<(), ServiceError> {
    tokio::select! {
        signal = shutdown => {
            tracing::info!(signal = %signal, "Got shutdown signal");
            state.exit.record(ExitStatus::Terminated);
            state.cancel.cancel();
            Err(ServiceError::Terminated { signal })
        }
        () = state.cancel.cancelled() => {
            tracing::debug!("Finalizing the service");
            Err(ServiceError::Canceled)
        }
    }
}

async fn drive_runner(runner: Arc<dyn Runner>, state: Arc<RunState>) -> Result<(), ServiceError> {
    let name = runner.name().to_string();

    if state.cancel.is_cancelled() {
        state.exit.record(ExitStatus::Canceled);
        tracing::debug!(runner = %name, "Context canceled, runner skipped");
        return Err(ServiceError::Canceled);
    }

    tracing::debug!(runner = %name, "Runner started");
    let outcome = AssertUnwindSafe(runner.run(state.cancel.clone(), Arc::clone(&state.container)))
        .catch_unwind()
        .await;

    let err = match outcome {
        Ok(Ok(())) => {
            tracing::debug!(runner = %name, "Runner completed");
            if state.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                tracing::debug!("All runners completed");
                state.cancel.cancel();
            }
            return Ok(());
        }
        Ok(Err(source)) => ServiceError::RunnerFailed { runner: name, source },
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(runner = %name, is_panic = true, "{message}");
            ServiceError::RunnerPanicked { runner: name, message }
        }
    };

    state.exit.record(ExitStatus::RunnerFailed);
    state.cancel.cancel();
    Err(err)
}

struct CloseOnDrop<'a> {
    container: &'a Container,
    span: &'a Span,
}

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.container.close() {
            tracing::warn!(parent: self.span, error = %err, "Close container");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{ContainerBuilder, Definition};
    use crate::service::{
        Command, CommandRunner, ManualSignal, NopCommand, NopRouter, RouterRunner, runner_fn,
    };
    use async_trait::async_trait;
    use std::time::{Duration, Instant};
    use tokio::sync::Notify;

    /// Panics once `sibling_started` is notified.
    struct PanickingCmd {
        sibling_started: Arc<Notify>,
    }

    #[async_trait]
    impl Command for PanickingCmd {
        async fn execute(&self, _: CancellationToken) -> anyhow::Result<()> {
            self.sibling_started.notified().await;
            panic!("test panic")
        }
    }

    async fn fail(message: &'static str) -> anyhow::Result<()> {
        anyhow::bail!(message)
    }

    fn get_srv() -> Service {
        Service::new(Container::new()).with_shutdown_signal(ManualSignal::new())
    }

    fn nop_command() -> (Arc<NopCommand>, CommandRunner) {
        let command = Arc::new(NopCommand::new());
        let runner = CommandRunner::new(command.clone());
        (command, runner)
    }

    #[tokio::test]
    async fn test_run_all_succeed() {
        let srv = get_srv();
        let (cmd1, runner1) = nop_command();
        let (cmd2, runner2) = nop_command();

        srv.register_runners([Arc::new(runner1) as Arc<dyn Runner>, Arc::new(runner2)]);
        let code = srv.run(CancellationToken::new()).await;

        assert_eq!(code, ExitStatus::Success);
        assert!(cmd1.is_executed());
        assert!(cmd2.is_executed());
    }

    #[tokio::test]
    async fn test_run_waits_for_every_runner() {
        let srv = get_srv();
        let finished = Arc::new(AtomicUsize::new(0));

        for delay in [5u64, 30, 60] {
            let finished = Arc::clone(&finished);
            srv.register_runner(runner_fn(format!("sleep-{delay}"), move |_, _| {
                let finished = Arc::clone(&finished);
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            }));
        }

        let code = srv.run(CancellationToken::new()).await;

        assert_eq!(code, ExitStatus::Success);
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_when_no_runners() {
        let srv = Service::new(Container::new());
        assert_eq!(srv.run(CancellationToken::new()).await, ExitStatus::NoRunners);
    }

    #[tokio::test]
    async fn test_run_when_canceled() {
        let srv = get_srv();
        let (cmd, runner) = nop_command();
        let ctx = CancellationToken::new();
        ctx.cancel();

        srv.register_runner(runner);
        srv.register_runner(RouterRunner::new(Arc::new(NopRouter)));
        let code = srv.run(ctx).await;

        assert_eq!(code, ExitStatus::Canceled);
        assert!(!cmd.is_executed());
    }

    #[tokio::test]
    async fn test_run_when_timeout() {
        let srv = get_srv();
        let (cmd, runner) = nop_command();
        let ctx = CancellationToken::new();
        let start = Instant::now();

        tokio::spawn({
            let ctx = ctx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                ctx.cancel();
            }
        });

        srv.register_runner(runner);
        srv.register_runner(RouterRunner::new(Arc::new(NopRouter)));
        let code = srv.run(ctx).await;

        assert_ne!(code, ExitStatus::Success);
        assert!(cmd.is_executed());
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    #[should_panic(expected = "service is already executed")]
    async fn test_register_runner_after_run() {
        let srv = get_srv();
        let (_, runner) = nop_command();

        srv.register_runner(runner);
        srv.run(CancellationToken::new()).await;

        let (_, late) = nop_command();
        srv.register_runner(late);
    }

    #[tokio::test]
    async fn test_run_when_runner_panicked() {
        let srv = get_srv();
        let started = Arc::new(Notify::new());
        let sibling_stopped = Arc::new(AtomicBool::new(false));

        srv.register_runner(CommandRunner::new(Arc::new(PanickingCmd {
            sibling_started: Arc::clone(&started),
        })));
        srv.register_runner(runner_fn("sibling", {
            let started = Arc::clone(&started);
            let sibling_stopped = Arc::clone(&sibling_stopped);
            move |cancel: CancellationToken, _| {
                let started = Arc::clone(&started);
                let sibling_stopped = Arc::clone(&sibling_stopped);
                async move {
                    started.notify_one();
                    cancel.cancelled().await;
                    sibling_stopped.store(true, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            }
        }));

        let code = srv.run(CancellationToken::new()).await;

        assert_eq!(code, ExitStatus::RunnerFailed);
        assert!(sibling_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_skips_runner_after_failure() {
        // Single-threaded test runtime: tasks are polled in spawn order.
        let srv = get_srv();
        let (cmd, runner) = nop_command();

        srv.register_runner(runner_fn("failing", |_, _| fail("runner error")));
        srv.register_runner(runner);

        let code = srv.run(CancellationToken::new()).await;

        assert_eq!(code, ExitStatus::RunnerFailed);
        assert!(!cmd.is_executed());
    }

    #[tokio::test]
    async fn test_run_when_runner_failed() {
        let srv = get_srv();

        srv.register_runner(runner_fn("failing", |_, _| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            fail("runner error").await
        }));
        srv.register_runner(RouterRunner::new(Arc::new(NopRouter)));

        assert_eq!(srv.run(CancellationToken::new()).await, ExitStatus::RunnerFailed);
    }

    #[tokio::test]
    async fn test_run_when_dependency_missing() {
        let srv = get_srv();

        srv.register_runner(runner_fn("needs-db", |_, container: Arc<Container>| async move {
            let _db = container.get::<String>("db");
            anyhow::Ok(())
        }));

        assert_eq!(srv.run(CancellationToken::new()).await, ExitStatus::RunnerFailed);
    }

    #[tokio::test]
    async fn test_run_when_terminated() {
        let signal = ManualSignal::new();
        let srv = Service::new(Container::new()).with_shutdown_signal(signal.clone());
        let stopped = Arc::new(AtomicUsize::new(0));

        for name in ["server-a", "server-b"] {
            let stopped = Arc::clone(&stopped);
            srv.register_runner(runner_fn(name, move |cancel: CancellationToken, _| {
                let stopped = Arc::clone(&stopped);
                async move {
                    cancel.cancelled().await;
                    stopped.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            }));
        }
        srv.register_runner(RouterRunner::new(Arc::new(NopRouter)));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signal.trigger("SIGTERM");
        });

        let code = srv.run(CancellationToken::new()).await;

        assert_eq!(code, ExitStatus::Terminated);
        assert_eq!(code.code(), 128);
        assert_eq!(stopped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_container_closed_once_after_run() {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        let mut builder = ContainerBuilder::new();
        builder
            .add([Definition::new("pool")
                .build(|_| Ok(String::from("pool")))
                .close(move |_: &String| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })])
            .unwrap();

        let srv = Service::new(builder.build().unwrap()).with_shutdown_signal(ManualSignal::new());
        srv.register_runner(runner_fn("failing", |_, _| fail("runner error")));

        assert_eq!(srv.run(CancellationToken::new()).await, ExitStatus::RunnerFailed);
        assert_eq!(srv.run(CancellationToken::new()).await, ExitStatus::NoRunners);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_runners_share_container() {
        let mut builder = ContainerBuilder::new();
        builder
            .add([Definition::new("counter").lazy().build(|_| Ok(AtomicUsize::new(0)))])
            .unwrap();
        let srv = Service::new(builder.build().unwrap()).with_shutdown_signal(ManualSignal::new());

        for i in 0..4 {
            srv.register_runner(runner_fn(format!("worker-{i}"), |_, container: Arc<Container>| async move {
                container.get::<AtomicUsize>("counter").fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }));
        }

        assert_eq!(srv.run(CancellationToken::new()).await, ExitStatus::Success);
        assert_eq!(srv.container().get::<AtomicUsize>("counter").load(Ordering::SeqCst), 4);
        assert!(srv.is_executed());
    }
}
