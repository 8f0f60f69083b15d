use crate::trajectory::Trajectory;
use std::fmt;
use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Analysis outcomes that are expected to happen in normal use (coral never
/// recovering, a bisection running out of depth) are not errors; see
/// [`crate::analysis::RecoveryTime`] and [`crate::analysis::Bisection`].
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid model or management configuration, detected before integration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The solver could not produce a finite trajectory.
    #[error("integration failed at t = {time}: {reason}")]
    Integration {
        time: f64,
        reason: String,
        /// Rows computed before the failure, if any.
        partial: Option<Box<Trajectory>>,
    },
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Prefix a configuration message with what was being checked.
    pub fn prefixed(self, ctx: impl fmt::Display) -> Self {
        match self {
            Self::Configuration(msg) => Self::Configuration(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
