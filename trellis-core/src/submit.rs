use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use trellis_kernel::ids::six_digit_token;
use trellis_kernel::{DepKind, LeafSpec, PGroup, SubmitPort, Walker, render_script};

use crate::error::{Error, Result};
use crate::slurm::SlurmClient;
use crate::store::{JobRecord, JobStore};

/// A parsed workflow file: the preamble map plus the root group.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub preambles: HashMap<String, String>,
    pub group: PGroup,
}

/// The submission boundary. Implements the kernel's [`SubmitPort`]: renders
/// each lowered leaf to a script, drives the scheduler adapter, and records
/// the job plus its parent edges in one store transaction.
pub struct JobSubmitter {
    pub store: JobStore,
    pub client: SlurmClient,
    pub dep_kind: DepKind,
    pub dry: bool,
}

impl JobSubmitter {
    pub fn new(store: JobStore, client: SlurmClient, dep_kind: DepKind) -> Self {
        JobSubmitter {
            store,
            client,
            dep_kind,
            dry: false,
        }
    }

    /// Reads a workflow file, lowers the tree, and submits every leaf.
    /// Returns the scheduler-assigned IDs in submission order.
    pub fn submit_workflow(&mut self, file: &Path) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(file)?;
        let workflow = parse_workflow(&text)?;
        let preambles = workflow.preambles;
        let group = workflow.group;
        let mut walker = Walker::new(&preambles, self);
        walker.run(&group)
    }

    /// Raw pass-through submission: the arguments go to the submitter
    /// verbatim and the job is recorded with an empty preamble, no parents.
    pub fn submit_passthrough(&mut self, args: &[String]) -> Result<String> {
        let output = Command::new(&self.client.submit_cmd)
            .args(args)
            .output()
            .map_err(|e| {
                Error::SubmitFailed(format!("failed to run `{}`: {e}", self.client.submit_cmd))
            })?;
        if !output.status.success() {
            return Err(Error::SubmitFailed(format!(
                "`{}` exited with {}: {}",
                self.client.submit_cmd,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = crate::slurm::parse_submit_output(&stdout).ok_or_else(|| {
            Error::SubmitFailed(format!(
                "could not parse a job id from `{}` output: {}",
                self.client.submit_cmd,
                stdout.trim()
            ))
        })?;

        self.store.create_job(&JobRecord {
            id: job_id.clone(),
            command: args.join(" "),
            preamble: String::new(),
            node_id: six_digit_token(),
            node_name: "batch".to_string(),
        })?;
        Ok(job_id)
    }

    pub fn cancel(&self, job_ids: &[String]) {
        for job_id in job_ids {
            self.client.cancel(job_id);
        }
    }

    /// Cancels every job the store knows about.
    pub fn cancel_all(&self) -> Result<()> {
        for job in self.store.select_jobs(&[])? {
            self.client.cancel(&job.id);
        }
        Ok(())
    }
}

impl SubmitPort for JobSubmitter {
    type Error = Error;

    fn submit(&mut self, leaf: &LeafSpec) -> Result<String> {
        let mut command = leaf.command.clone();
        if self.dry {
            command.push_str(" --dry");
        }

        let script = render_script(&leaf.preamble, &leaf.parents, self.dep_kind, &command);
        let job_id = self.client.submit_script(&script)?;

        let record = JobRecord {
            id: job_id.clone(),
            command,
            preamble: leaf.preamble.clone(),
            node_id: leaf.node_id.clone(),
            node_name: leaf.node_name.clone(),
        };
        self.store
            .create_job_with_edges(&record, &leaf.parents, self.dep_kind)?;

        println!("Submitted job {job_id}");
        Ok(job_id)
    }
}

/// Parses the workflow file shape: a `preambles` mapping (key to a string or
/// a list of lines) and the root `group`.
pub fn parse_workflow(text: &str) -> Result<Workflow> {
    let value: Value = serde_yaml::from_str(text)
        .map_err(|e| Error::InvalidPlan(format!("workflow file is not valid YAML: {e}")))?;
    let map = value
        .as_object()
        .ok_or_else(|| Error::InvalidPlan("workflow file must be a mapping".to_string()))?;

    let preamble_entries = map
        .get("preambles")
        .ok_or_else(|| Error::InvalidPlan("workflow file is missing `preambles`".to_string()))?
        .as_object()
        .ok_or_else(|| Error::InvalidPlan("`preambles` must be a mapping".to_string()))?;

    let mut preambles = HashMap::new();
    for (key, entry) in preamble_entries {
        preambles.insert(key.clone(), preamble_text(key, entry)?);
    }

    let group_value = map
        .get("group")
        .ok_or_else(|| Error::InvalidPlan("workflow file is missing `group`".to_string()))?;
    let group = PGroup::from_value(group_value)?;

    Ok(Workflow { preambles, group })
}

fn preamble_text(key: &str, entry: &Value) -> Result<String> {
    match entry {
        Value::String(text) => Ok(text.clone()),
        Value::Array(lines) => {
            let mut rendered = Vec::with_capacity(lines.len());
            for line in lines {
                match line.as_str() {
                    Some(line) => rendered.push(line.to_string()),
                    None => {
                        return Err(Error::InvalidPlan(format!(
                            "preamble `{key}` holds a non-string line"
                        )));
                    }
                }
            }
            Ok(rendered.join("\n"))
        }
        _ => Err(Error::InvalidPlan(format!(
            "preamble `{key}` must be a string or a list of lines"
        ))),
    }
}
