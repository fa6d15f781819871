//! Service supervisor
//!
//! A [`Service`] owns a [`Container`](crate::di::Container) and a list of
//! [`Runner`]s. [`Service::run`] drives every runner concurrently, listens
//! for termination signals, contains panics and turns the outcome into an
//! [`ExitStatus`]:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | every runner completed |
//! | 1    | no runners registered |
//! | 2    | context canceled before any runner started |
//! | 3    | a runner returned an error or panicked |
//! | 128  | an OS termination signal was received |

mod command;
mod error;
mod exit;
mod panic;
mod router;
mod runner;
mod signal;
mod supervisor;

pub use command::{Command, CommandRunner, NopCommand};
pub use error::ServiceError;
pub use exit::ExitStatus;
pub use panic::panic_message;
pub use router::{NopRouter, Router, RouterRunner};
pub use runner::{FnRunner, Runner, runner_fn};
pub use signal::{ManualSignal, OsSignals, ShutdownSignal};
pub use supervisor::Service;
