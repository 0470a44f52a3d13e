use std::collections::{HashMap, HashSet, VecDeque};

use trellis_kernel::{LeafSpec, SubmitPort};

use crate::error::{Error, Result};
use crate::query;
use crate::slurm::JobStatus;
use crate::store::JobStore;
use crate::submit::JobSubmitter;

/// Resubmits a job with its stored command, preamble, and parent set.
///
/// The new submission takes over the old job's identity in the graph: every
/// edge that pointed out of the old ID is rewired to the new one (keeping
/// each edge's dep_kind), then the old row is dropped. Children whose live
/// state is BLOCKED are resubmitted too — rewriting their edge alone would
/// never make the scheduler re-evaluate dependency satisfaction.
pub fn retry(submitter: &mut JobSubmitter, job_id: &str, force: bool) -> Result<String> {
    let job = query::get_jobs(
        &submitter.store,
        &submitter.client,
        &[format!("id={job_id}")],
        true,
    )?
    .into_iter()
    .next()
    .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

    if !force && !job.status.is_retryable() {
        return Err(Error::NotRetryable {
            job_id: job_id.to_string(),
            status: job.status.to_string(),
        });
    }

    let leaf = LeafSpec {
        command: job.command.clone(),
        preamble: job.preamble.clone(),
        parents: job.parents.clone(),
        node_id: job.node_id.clone(),
        node_name: job.node_name.clone(),
    };
    let new_id = submitter.submit(&leaf)?;

    submitter.store.rewire_parent(job_id, &new_id)?;
    submitter.store.delete_job(job_id, false)?;
    println!("Retried job {job_id} as {new_id}");

    let children = submitter.store.children_of(&new_id)?;
    if !children.is_empty() {
        let states = match submitter.client.state(&children) {
            Ok(states) => states,
            Err(Error::SchedulerUnavailable(_)) => HashMap::new(),
            Err(e) => return Err(e),
        };
        for child in children {
            if states.get(&child).map(|s| s.status) == Some(JobStatus::Blocked) {
                retry(submitter, &child, false)?;
            }
        }
    }

    Ok(new_id)
}

/// Retries every job belonging to the given plan nodes, parents before
/// children. Jobs consumed by a blocked-child cascade along the way are
/// skipped instead of re-retried.
pub fn retry_by_node(
    submitter: &mut JobSubmitter,
    node_ids: &[String],
    force: bool,
) -> Result<Vec<String>> {
    let mut targets = Vec::new();
    let mut seen = HashSet::new();
    for node_id in node_ids {
        let jobs = query::get_jobs(
            &submitter.store,
            &submitter.client,
            &[format!("node_id={node_id}")],
            false,
        )?;
        for job in jobs {
            if seen.insert(job.id.clone()) {
                targets.push(job.id);
            }
        }
    }

    let mut new_ids = Vec::new();
    for id in topo_order(&submitter.store, &targets)? {
        if submitter.store.get_job(&id)?.is_none() {
            continue;
        }
        new_ids.push(retry(submitter, &id, force)?);
    }
    Ok(new_ids)
}

/// Kahn's ordering over the edges between the target jobs. Targets arrive in
/// submission order, which the queue preserves for independent jobs.
fn topo_order(store: &JobStore, targets: &[String]) -> Result<Vec<String>> {
    let selected: HashSet<&str> = targets.iter().map(String::as_str).collect();
    let edges: Vec<_> = store
        .edges()?
        .into_iter()
        .filter(|e| selected.contains(e.parent.as_str()) && selected.contains(e.child.as_str()))
        .collect();

    let mut indegree: HashMap<&str, usize> = targets.iter().map(|t| (t.as_str(), 0)).collect();
    for edge in &edges {
        *indegree.get_mut(edge.child.as_str()).unwrap() += 1;
    }

    let mut queue: VecDeque<String> = targets
        .iter()
        .filter(|t| indegree[t.as_str()] == 0)
        .cloned()
        .collect();

    let mut ordered = Vec::with_capacity(targets.len());
    while let Some(id) = queue.pop_front() {
        ordered.push(id.clone());
        for edge in &edges {
            if edge.parent == id {
                let remaining = indegree.get_mut(edge.child.as_str()).unwrap();
                *remaining -= 1;
                if *remaining == 0 {
                    queue.push_back(edge.child.clone());
                }
            }
        }
    }
    Ok(ordered)
}
