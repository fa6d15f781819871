//! # Corekit
//!
//! Application lifecycle kernel: a lazily-built dependency registry and a
//! service supervisor that drives long-running workers to completion.
//!
//! ## Features
//!
//! - **Dependency Registry**: Named definitions built on first access, once, from any thread
//! - **Ordered Teardown**: Close hooks run in reverse registration order, errors are joined
//! - **Supervised Runners**: Runners share one cancellation token, first failure stops the rest
//! - **Exit Codes**: Every run resolves to a process exit status (0, 1, 2, 3 or 128)
//! - **Panic Containment**: A panicking runner becomes a failure, never a crash
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use corekit::prelude::*;
//! use corekit::defaults::{DefinitionKeys, default_builder};
//! use corekit::config::ConfigService;
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let keys = DefinitionKeys::default();
//!     let mut builder = default_builder(&keys, ConfigService::from_env(), "APP").unwrap();
//!     builder
//!         .add([Definition::new("greeting").build(|_| Ok(String::from("hello")))])
//!         .unwrap();
//!
//!     let container = Arc::new(builder.build().unwrap());
//!     let span = keys.logger(&container).unwrap();
//!
//!     let service = Service::new(container).with_span(span);
//!     service.register_runner(runner_fn("greeter", |_cancel, container: Arc<Container>| async move {
//!         let greeting = container.safe_get::<String>("greeting")?;
//!         tracing::info!(%greeting, "Ready");
//!         anyhow::Ok(())
//!     }));
//!
//!     service.run(CancellationToken::new()).await.into()
//! }
//! ```

pub mod config;
pub mod defaults;
pub mod di;
pub mod error;
pub mod logging;
pub mod service;

// Re-export core types
pub use di::{Container, ContainerBuilder, Definition, Value};
pub use error::{RegistryError, Result};
pub use service::{ExitStatus, Runner, Service, ServiceError};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// ```
/// use corekit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::di::{Container, ContainerBuilder, Definition, Value};
    pub use crate::error::{RegistryError, Result};
    pub use crate::service::{
        Command, CommandRunner, ExitStatus, ManualSignal, OsSignals, Router, RouterRunner, Runner,
        Service, ServiceError, ShutdownSignal, runner_fn,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
