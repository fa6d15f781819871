use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Process exit status decided by a [`Service`](super::Service) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    /// Nothing was registered to run.
    NoRunners = 1,
    /// The context was canceled before a runner could start.
    Canceled = 2,
    /// A runner returned an error or panicked.
    RunnerFailed = 3,
    /// An OS termination signal was received.
    Terminated = 128,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        i32::from(self as u8)
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    fn from_u8(code: u8) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::NoRunners,
            2 => Self::Canceled,
            3 => Self::RunnerFailed,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status as u8)
    }
}

/// Single shared exit code slot. The first non-zero status recorded wins.
#[derive(Debug, Default)]
pub(crate) struct ExitSlot(AtomicU8);

impl ExitSlot {
    pub(crate) fn record(&self, status: ExitStatus) -> bool {
        self.0
            .compare_exchange(0, status as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn load(&self) -> ExitStatus {
        ExitStatus::from_u8(self.0.load(Ordering::SeqCst))
    }
}
