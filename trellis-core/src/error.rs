use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The plan parser rejected the workflow input.
    InvalidPlan(String),
    /// A query filter token named an unknown field or carried no operator.
    InvalidFilter(String),
    /// The external submitter exited non-zero or its stdout lacked the
    /// `Submitted batch job N` line.
    SubmitFailed(String),
    /// Retry was attempted on a job that is not in a terminal failure state.
    NotRetryable { job_id: String, status: String },
    /// The named job is not recorded in the store.
    JobNotFound(String),
    /// A foreign-key or uniqueness violation in the store. This is a walker
    /// bug, not an operational condition.
    StoreIntegrity(String),
    /// The accounting or cancel command is missing or failing. Queries
    /// degrade to UNKNOWN instead of propagating this.
    SchedulerUnavailable(String),
    Store(rusqlite::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPlan(context) => write!(f, "invalid plan: {context}"),
            Error::InvalidFilter(context) => write!(f, "invalid filter: {context}"),
            Error::SubmitFailed(context) => write!(f, "submission failed: {context}"),
            Error::NotRetryable { job_id, status } => {
                write!(
                    f,
                    "job {job_id} is {status}, not in a retryable state (use force to override)"
                )
            }
            Error::JobNotFound(job_id) => {
                write!(f, "job {job_id} is not recorded in the store")
            }
            Error::StoreIntegrity(context) => {
                write!(f, "store integrity violation: {context}")
            }
            Error::SchedulerUnavailable(context) => {
                write!(f, "scheduler unavailable: {context}")
            }
            Error::Store(e) => write!(f, "store error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::StoreIntegrity(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            _ => Error::Store(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<trellis_kernel::PlanError> for Error {
    fn from(e: trellis_kernel::PlanError) -> Self {
        Error::InvalidPlan(e.to_string())
    }
}
