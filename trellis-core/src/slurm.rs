use std::collections::HashMap;
use std::io::Write;
use std::process::Command;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use trellis_kernel::ids::six_digit_token;

use crate::error::{Error, Result};

lazy_static! {
    static ref JOB_ID_RE: Regex = Regex::new(r"Submitted batch job (\d+)").unwrap();
}

/// Job states as derived from the scheduler's accounting view. The core only
/// reports these; it never drives a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    Blocked,
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Timeout => "TIMEOUT",
            JobStatus::Blocked => "BLOCKED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Timeout
        )
    }

    /// States the retry planner accepts without `force`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::Cancelled | JobStatus::Timeout | JobStatus::Blocked
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accounting row, keyed by job ID in [`SlurmClient::state`].
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    pub status: JobStatus,
    pub start: Option<String>,
    pub end: Option<String>,
    pub workdir: Option<String>,
}

impl JobState {
    pub fn unknown() -> Self {
        JobState {
            status: JobStatus::Unknown,
            start: None,
            end: None,
            workdir: None,
        }
    }
}

/// Adapter over the external scheduler commands. The command names are
/// configuration so tests can point them at fakes.
#[derive(Debug, Clone)]
pub struct SlurmClient {
    pub submit_cmd: String,
    pub state_cmd: String,
    pub cancel_cmd: String,
    pub debug: bool,
}

impl SlurmClient {
    /// Submits a rendered script and returns the scheduler-assigned job ID.
    /// The script is staged in a temp file that is removed on every exit
    /// path. In debug mode the script is printed and a synthetic six-digit
    /// ID is returned without touching the submitter.
    pub fn submit_script(&self, script: &str) -> Result<String> {
        if self.debug {
            println!("DEBUG submission:\n{script}\n");
            return Ok(six_digit_token());
        }

        let mut file = tempfile::Builder::new().suffix(".sh").tempfile()?;
        file.write_all(script.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;

        let output = Command::new(&self.submit_cmd)
            .arg(file.path())
            .output()
            .map_err(|e| {
                Error::SubmitFailed(format!("failed to run `{}`: {e}", self.submit_cmd))
            })?;

        if !output.status.success() {
            return Err(Error::SubmitFailed(format!(
                "`{}` exited with {}: {}",
                self.submit_cmd,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_submit_output(&stdout).ok_or_else(|| {
            Error::SubmitFailed(format!(
                "could not parse a job id from `{}` output: {}",
                self.submit_cmd,
                stdout.trim()
            ))
        })
    }

    /// Fire-and-forget cancellation; failures are reported, not propagated.
    pub fn cancel(&self, job_id: &str) {
        match Command::new(&self.cancel_cmd).arg(job_id).status() {
            Ok(status) if status.success() => println!("Cancelled job {job_id}"),
            Ok(status) => eprintln!("`{}` exited with {status} for job {job_id}", self.cancel_cmd),
            Err(e) => eprintln!("failed to run `{}`: {e}", self.cancel_cmd),
        }
    }

    /// One accounting call for the whole ID set. IDs the scheduler does not
    /// report come back as UNKNOWN.
    pub fn state(&self, ids: &[String]) -> Result<HashMap<String, JobState>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let output = Command::new(&self.state_cmd)
            .args([
                "-j",
                &ids.join(","),
                "--format",
                "jobid,state,start,end,workdir",
                "--noheader",
                "--parsable2",
            ])
            .output()
            .map_err(|e| {
                Error::SchedulerUnavailable(format!("failed to run `{}`: {e}", self.state_cmd))
            })?;

        if !output.status.success() {
            return Err(Error::SchedulerUnavailable(format!(
                "`{}` exited with {}: {}",
                self.state_cmd,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut states = parse_accounting(&String::from_utf8_lossy(&output.stdout));
        for id in ids {
            states.entry(id.clone()).or_insert_with(JobState::unknown);
        }
        Ok(states)
    }
}

/// Extracts the scheduler-assigned ID from submitter stdout.
pub fn parse_submit_output(stdout: &str) -> Option<String> {
    JOB_ID_RE
        .captures(stdout)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parses `--parsable2` accounting rows. Sub-job rows (`1234.batch`) are
/// skipped; a PENDING state whose reason text mentions
/// `DependencyNeverSatisfied` is remapped to BLOCKED.
fn parse_accounting(text: &str) -> HashMap<String, JobState> {
    let mut states = HashMap::new();

    for line in text.lines() {
        let fields: Vec<&str> = line.trim().split('|').collect();
        if fields.len() < 2 || fields[0].is_empty() || fields[0].contains('.') {
            continue;
        }

        let mut words = fields[1].split_whitespace();
        let raw_status = words.next().unwrap_or_default();
        let reason = words.collect::<Vec<_>>().join(" ");

        let mut status = parse_status(raw_status);
        if status == JobStatus::Pending && reason.contains("DependencyNeverSatisfied") {
            status = JobStatus::Blocked;
        }

        let state = JobState {
            status,
            start: field_value(&fields, 2),
            end: field_value(&fields, 3),
            workdir: field_value(&fields, 4),
        };
        states.entry(fields[0].to_string()).or_insert(state);
    }

    states
}

fn parse_status(raw: &str) -> JobStatus {
    match raw {
        "PENDING" => JobStatus::Pending,
        "RUNNING" => JobStatus::Running,
        "COMPLETED" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        "TIMEOUT" => JobStatus::Timeout,
        "BLOCKED" => JobStatus::Blocked,
        raw if raw.starts_with("CANCELLED") => JobStatus::Cancelled,
        _ => JobStatus::Unknown,
    }
}

fn field_value(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .map(|f| f.trim())
        .filter(|f| !f.is_empty() && *f != "Unknown" && *f != "None")
        .map(str::to_string)
}
