//! Type definitions shared by both continuation strategies.
//!
//! - Abrupt: non-normal completions of an evaluator body
//! - Evaluation: what a snapshot-strategy evaluator hands back
//! - ContinuationState: lifecycle of one activation
//! - ContinuationError: failures reported to the driving caller

use crate::resumption::{ResumptionPoint, ReturnValue};
use crate::worker::WorkerError;

/// Result of a continuation operation
pub type ContinuationResult<T, F> = Result<T, ContinuationError<F>>;

/// Abrupt completion of an evaluator body
#[derive(Debug, Clone, PartialEq)]
pub enum Abrupt<V, E, F> {
    /// Script-level exception; terminates the continuation normally
    Throw(E),
    /// Forced return propagating out of the body after `finally` blocks ran
    Return(ReturnValue<V>),
    /// Internal failure; rethrown unchanged to the caller
    Fault(F),
    /// The owning continuation was dropped while the body was suspended.
    /// Only produced by the thread strategy; the body must unwind.
    Detached,
}

/// Completion of one `SnapshotEvaluator::evaluate` call
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation<V> {
    /// The body reached a suspend point; the snapshot is the suspend token
    Suspended(ResumptionPoint<V>),
    /// The body returned normally
    Returned(V),
}

/// Lifecycle of a continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationState {
    /// Created, `start` not yet called
    NotStarted,
    /// Parked at a suspend point, waiting for `resume`/`force_return`/`throw`
    Suspended,
    /// Returned, threw, or faulted; no further operation is valid
    Closed,
}

/// Errors reported by continuation operations
#[derive(Debug)]
pub enum ContinuationError<F> {
    /// `resume`/`force_return`/`throw` called before `start`
    NotStarted,
    /// `start` called a second time
    AlreadyStarted,
    /// Operation called after the continuation reached a terminal outcome
    Closed,
    /// Generator nesting reached the worker depth ceiling
    StackOverflow { depth: usize },
    /// The OS refused to create a generator worker
    Spawn(std::io::Error),
    /// The worker body panicked
    WorkerPanicked(String),
    /// The worker vanished without completing the handoff protocol
    Disconnected,
    /// Internal evaluator failure, passed through unchanged
    Fault(F),
}

impl<F> ContinuationError<F> {
    /// True for calls that violate the start/resume/close protocol
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::NotStarted | Self::AlreadyStarted | Self::Closed)
    }

    pub fn fault(&self) -> Option<&F> {
        match self {
            Self::Fault(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_fault(self) -> Option<F> {
        match self {
            Self::Fault(f) => Some(f),
            _ => None,
        }
    }
}

impl<F: std::fmt::Display> std::fmt::Display for ContinuationError<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "Continuation has not been started"),
            Self::AlreadyStarted => write!(f, "Continuation has already been started"),
            Self::Closed => write!(f, "Continuation is closed"),
            Self::StackOverflow { depth } => {
                write!(f, "Stack overflow: generator nesting depth {}", depth)
            }
            Self::Spawn(e) => write!(f, "Failed to spawn generator worker: {}", e),
            Self::WorkerPanicked(msg) => write!(f, "Generator worker panicked: {}", msg),
            Self::Disconnected => write!(f, "Generator worker disconnected"),
            Self::Fault(fault) => write!(f, "{}", fault),
        }
    }
}

impl<F: std::fmt::Debug + std::fmt::Display> std::error::Error for ContinuationError<F> {}

impl<F> From<WorkerError> for ContinuationError<F> {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::StackOverflow { depth } => Self::StackOverflow { depth },
            WorkerError::Spawn(e) => Self::Spawn(e),
        }
    }
}

/// Render a panic payload from a joined worker
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
