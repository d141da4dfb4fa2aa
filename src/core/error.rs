//! Error types for scheduling decisions

use std::fmt;

/// Why the scheduler could not pick a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// No backend with fresh metrics survived filtering
    NoBackends,
    /// Sheddable request rejected because the cluster is saturated
    Shed,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::NoBackends => {
                write!(f, "no backend available to serve the request")
            }
            ScheduleError::Shed => {
                write!(f, "sheddable request rejected: cluster saturated")
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Result type for scheduling operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;
