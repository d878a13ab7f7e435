//! Tune session states.

use std::fmt;

/// State of the tuner session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TuneState {
    /// No tune in progress.
    #[default]
    Idle,
    /// Determining the frontend's control dialect.
    Probing,
    /// Building and submitting the tune command.
    Tuning,
    /// Command accepted, debouncing the lock condition.
    WaitingForLock,
    /// Stable lock confirmed.
    Locked,
    /// Lock not achieved within the timeout.
    Failed,
    /// Tune aborted by the caller.
    Cancelled,
}

impl TuneState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TuneState::Locked | TuneState::Failed | TuneState::Cancelled
        )
    }
}

impl fmt::Display for TuneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuneState::Idle => write!(f, "IDLE"),
            TuneState::Probing => write!(f, "PROBING"),
            TuneState::Tuning => write!(f, "TUNING"),
            TuneState::WaitingForLock => write!(f, "WAITING_FOR_LOCK"),
            TuneState::Locked => write!(f, "LOCKED"),
            TuneState::Failed => write!(f, "FAILED"),
            TuneState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}
