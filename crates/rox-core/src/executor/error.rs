//! Errors returned by the executor.

use thiserror::Error;

use crate::retry::FailureClass;

/// Why a resilient run did not produce a value.
///
/// The last underlying error is carried unchanged in `Failed` so callers can
/// decide what to surface; `class` tells "gave up after retrying"
/// (`Retryable` / `Unknown`) apart from "never worth retrying" (`NonRetryable`).
#[derive(Debug, Error)]
pub enum ExecutorError<E> {
    /// The breaker for `target` refused the run; the operation was not invoked.
    #[error("circuit open for {target}")]
    CircuitOpen { target: String },

    /// Non-retryable failure, exhausted attempt budget, or the breaker opened mid-run.
    #[error("{class} failure after {attempts} attempt(s)")]
    Failed {
        class: FailureClass,
        attempts: u32,
        #[source]
        last_error: E,
    },

    /// Cancellation was requested before an attempt or during a suspension.
    #[error("canceled after {attempts} attempt(s)")]
    Canceled { attempts: u32 },
}

impl<E> ExecutorError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ExecutorError::CircuitOpen { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, ExecutorError::Canceled { .. })
    }

    /// Class of the final failure, if the operation ran at all.
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            ExecutorError::Failed { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// The underlying error of the last attempt, if any.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            ExecutorError::Failed { last_error, .. } => Some(last_error),
            _ => None,
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            ExecutorError::Failed { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}
