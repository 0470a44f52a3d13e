pub mod config;
pub mod error;
pub mod filter;
pub mod query;
pub mod retry;
pub mod slurm;
pub mod store;
pub mod submit;
pub mod viz;

pub use config::Config;
pub use error::{Error, Result};
pub use query::{HydratedJob, get_jobs};
pub use slurm::{JobState, JobStatus, SlurmClient};
pub use store::{JobRecord, JobStore, StoredJob};
pub use submit::JobSubmitter;
