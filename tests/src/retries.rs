use crate::fixtures::*;

fn submit_linear(sandbox: &Sandbox) -> TestResult<JobSubmitter> {
    let mut submitter = sandbox.submitter()?;
    let workflow = sandbox.write_workflow(LINEAR_WORKFLOW)?;
    submitter.submit_workflow(&workflow)?;
    Ok(submitter)
}

#[test]
fn retry_replaces_the_parent_and_preserves_the_child_edge() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = submit_linear(&sandbox)?;
    sandbox.seed_states(&[("12345", "FAILED", ""), ("12346", "PENDING", "")])?;

    let new_id = retry::retry(&mut submitter, "12345", false)?;
    assert_eq!(new_id, "12347");

    let store = sandbox.store()?;
    assert!(store.get_job("12345")?.is_none());
    let edges = store.edges()?;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].parent, "12347");
    assert_eq!(edges[0].child, "12346");
    assert_eq!(edges[0].dep_kind, "afterok");

    let replacement = store.get_job("12347")?.unwrap();
    assert_eq!(replacement.command, "echo 'First job'");
    Ok(())
}

#[test]
fn healthy_jobs_refuse_retry_without_force() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = submit_linear(&sandbox)?;
    sandbox.seed_states(&[("12345", "COMPLETED", ""), ("12346", "PENDING", "")])?;

    match retry::retry(&mut submitter, "12345", false) {
        Err(Error::NotRetryable { status, .. }) => assert_eq!(status, "COMPLETED"),
        other => panic!("expected NotRetryable, got {other:?}"),
    }

    let forced = retry::retry(&mut submitter, "12345", true)?;
    assert_eq!(forced, "12347");
    Ok(())
}

#[test]
fn blocked_children_are_resubmitted_in_the_cascade() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = submit_linear(&sandbox)?;
    sandbox.seed_states(&[
        ("12345", "FAILED", ""),
        ("12346", "PENDING DependencyNeverSatisfied", ""),
    ])?;

    retry::retry(&mut submitter, "12345", false)?;

    let store = sandbox.store()?;
    assert!(store.get_job("12345")?.is_none());
    assert!(store.get_job("12346")?.is_none(), "blocked child resubmitted");

    let edges = store.edges()?;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].parent, "12347");
    assert_eq!(edges[0].child, "12348");

    let scripts = sandbox.submitted_scripts()?;
    assert!(
        scripts[3].contains("#SBATCH --dependency=afterok:12347"),
        "the resubmitted child points at the new parent"
    );
    Ok(())
}

#[test]
fn retry_by_node_walks_parents_first() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = submit_linear(&sandbox)?;
    sandbox.seed_states(&[("12345", "FAILED", ""), ("12346", "FAILED", "")])?;

    // both leaves hang off the root group, so they share one node_id
    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    let node_id = jobs[0].node_id.clone();
    assert_eq!(jobs[1].node_id, node_id);

    let new_ids = retry::retry_by_node(&mut submitter, &[node_id], false)?;
    assert_eq!(new_ids, ["12347", "12348"]);

    let store = sandbox.store()?;
    let edges = store.edges()?;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].parent, "12347");
    assert_eq!(edges[0].child, "12348");
    Ok(())
}

#[test]
fn retrying_an_unrecorded_job_is_an_error() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    assert!(matches!(
        retry::retry(&mut submitter, "424242", false),
        Err(Error::JobNotFound(_))
    ));
    Ok(())
}
