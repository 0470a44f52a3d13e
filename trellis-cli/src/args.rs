use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use trellis_kernel::DepKind;

/// Workflow compiler and dependency tracker for Slurm-style schedulers.
#[derive(Parser, Debug)]
#[command(name = "trellis", version, about, arg_required_else_help = true)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalOpts,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(ClapArgs, Debug, Default)]
pub(crate) struct GlobalOpts {
    /// SQLite store path (defaults to the user cache directory)
    #[arg(long, global = true)]
    pub(crate) db: Option<PathBuf>,

    /// Config file to load instead of the canonical search path
    #[arg(short = 'C', long = "config-file", global = true)]
    pub(crate) config_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum DepKindArg {
    Afterok,
    Afterany,
}

impl From<DepKindArg> for DepKind {
    fn from(value: DepKindArg) -> Self {
        match value {
            DepKindArg::Afterok => DepKind::Afterok,
            DepKindArg::Afterany => DepKind::Afterany,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum VizModeArg {
    Main,
    Mermaid,
    Group,
    Json,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Submit jobs from a YAML workflow
    Submit {
        /// Path to workflow.yaml
        #[arg(long)]
        file: PathBuf,

        /// Append --dry to every job command
        #[arg(long)]
        dry: bool,

        /// Don't call the submitter, just print and record
        #[arg(long)]
        debug: bool,

        /// Dependency directive used for every edge
        #[arg(long, value_enum)]
        deptype: Option<DepKindArg>,
    },

    /// Show a job status table
    Status {
        /// Filter jobs (e.g. id=123 or command~train)
        filters: Vec<String>,

        /// Columns to display (comma-separated)
        #[arg(long, value_delimiter = ',')]
        cols: Vec<String>,
    },

    /// Visualize job dependencies
    Viz {
        /// Filter jobs (e.g. node_id=123456 or status=failed)
        #[arg(long, num_args = 0..)]
        filters: Vec<String>,

        /// Visualization mode
        #[arg(long, value_enum, default_value = "main")]
        mode: VizModeArg,
    },

    /// Cancel jobs (no IDs cancels every recorded job)
    Cancel {
        /// Job IDs to cancel
        job_ids: Vec<String>,
    },

    /// Resubmit jobs, preserving downstream dependencies
    Retry {
        /// Job IDs to retry
        job_ids: Vec<String>,

        /// Retry every job belonging to these plan nodes instead
        #[arg(short = 'n', long = "node-ids", num_args = 0..)]
        node_ids: Vec<String>,

        /// Resubmit even if the job is not in a failed state
        #[arg(long)]
        force: bool,

        /// Don't call the submitter, just print and record
        #[arg(long)]
        debug: bool,

        /// Append --dry to the resubmitted command
        #[arg(long)]
        dry: bool,

        /// Dependency directive used for the rewritten edges
        #[arg(long, value_enum)]
        deptype: Option<DepKindArg>,
    },

    /// Delete jobs from the store (no IDs drops the whole database)
    Delete {
        /// Job IDs to delete, cascading to their children
        #[arg(short = 'j', long = "job-ids", num_args = 0..)]
        job_ids: Vec<String>,

        /// Delete jobs belonging to these plan nodes only
        #[arg(short = 'n', long = "node-ids", num_args = 0..)]
        node_ids: Vec<String>,
    },

    /// Pass arguments straight through to the submitter
    Batch {
        /// Arguments forwarded verbatim
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the cache directory and store location
    Info,
}
