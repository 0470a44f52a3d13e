use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::filter;
use crate::slurm::{JobState, JobStatus, SlurmClient};
use crate::store::{JobStore, StoredJob};

lazy_static! {
    static ref OUTPUT_RE: Regex = Regex::new(r"(?m)^#SBATCH --output=(\S+)").unwrap();
    static ref ERROR_RE: Regex = Regex::new(r"(?m)^#SBATCH --error=(\S+)").unwrap();
}

/// A stored job joined with live scheduler state and resolved log paths.
#[derive(Debug, Clone, Serialize)]
pub struct HydratedJob {
    pub id: String,
    pub command: String,
    pub preamble: String,
    pub created_at: String,
    pub updated_at: String,
    pub node_id: String,
    pub node_name: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub status: JobStatus,
    pub start: Option<String>,
    pub end: Option<String>,
    pub workdir: Option<String>,
    pub stdout_path: Option<String>,
    pub stderr_path: Option<String>,
}

/// The query surface. One accounting call covers the whole result set; a
/// `status=` filter is applied afterwards. An unavailable scheduler degrades
/// every row to UNKNOWN instead of failing the query.
pub fn get_jobs(
    store: &JobStore,
    client: &SlurmClient,
    filters: &[String],
    include_live_state: bool,
) -> Result<Vec<HydratedJob>> {
    let parsed = filter::parse(filters)?;
    let rows = store.select_jobs(&parsed.sql)?;
    let ids: Vec<String> = rows.iter().map(|job| job.id.clone()).collect();

    let states: HashMap<String, JobState> = if include_live_state {
        match client.state(&ids) {
            Ok(states) => states,
            Err(Error::SchedulerUnavailable(context)) => {
                eprintln!("warning: {context}; statuses reported as UNKNOWN");
                HashMap::new()
            }
            Err(e) => return Err(e),
        }
    } else {
        HashMap::new()
    };

    let mut jobs = Vec::with_capacity(rows.len());
    for row in rows {
        let state = states
            .get(&row.id)
            .cloned()
            .unwrap_or_else(JobState::unknown);
        let job = hydrate(row, state);
        if let Some(status_filter) = &parsed.status {
            if !status_filter.matches_status(job.status.as_str()) {
                continue;
            }
        }
        jobs.push(job);
    }
    Ok(jobs)
}

fn hydrate(row: StoredJob, state: JobState) -> HydratedJob {
    let stdout_path = resolve_log_path(&row.preamble, &OUTPUT_RE, &row.id, state.workdir.as_deref());
    let stderr_path = resolve_log_path(&row.preamble, &ERROR_RE, &row.id, state.workdir.as_deref());

    HydratedJob {
        id: row.id,
        command: row.command,
        preamble: row.preamble,
        created_at: row.created_at,
        updated_at: row.updated_at,
        node_id: row.node_id,
        node_name: row.node_name,
        parents: row.parents,
        children: row.children,
        status: state.status,
        start: state.start,
        end: state.end,
        workdir: state.workdir,
        stdout_path,
        stderr_path,
    }
}

/// Resolves a log path from a preamble directive: `%j`/`%J` become the job
/// ID and relative paths are joined onto the accounting-reported workdir.
fn resolve_log_path(
    preamble: &str,
    pattern: &Regex,
    job_id: &str,
    workdir: Option<&str>,
) -> Option<String> {
    let raw = pattern.captures(preamble)?.get(1)?.as_str();
    let resolved = raw.replace("%j", job_id).replace("%J", job_id);
    if Path::new(&resolved).is_absolute() {
        return Some(resolved);
    }
    match workdir {
        Some(dir) => Some(Path::new(dir).join(resolved).to_string_lossy().into_owned()),
        None => Some(resolved),
    }
}
