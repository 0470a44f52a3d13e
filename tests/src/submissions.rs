use crate::fixtures::*;

#[test]
fn linear_workflow_chains_jobs() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    let workflow = sandbox.write_workflow(LINEAR_WORKFLOW)?;

    let ids = submitter.submit_workflow(&workflow)?;
    assert_eq!(ids, ["12345", "12346"]);

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, "12345");
    assert!(jobs[0].parents.is_empty());
    assert_eq!(jobs[1].parents, ["12345"]);
    Ok(())
}

#[test]
fn rendered_scripts_follow_the_directive_layout() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    let workflow = sandbox.write_workflow(
        r##"
preambles:
  base:
    - "#!/bin/bash"
    - "#SBATCH --partition=debug"
    - "module load cuda"
    - "source env.sh"

group:
  name: layout
  type: sequential
  jobs:
    - job:
        preamble: base
        command: echo one
    - job:
        preamble: base
        command: echo two
"##,
    )?;
    submitter.submit_workflow(&workflow)?;

    let scripts = sandbox.submitted_scripts()?;
    assert_eq!(scripts.len(), 2);
    assert_eq!(
        scripts[1],
        "#!/bin/bash\n\
         #SBATCH --partition=debug\n\
         #SBATCH --dependency=afterok:12345\n\
         module load cuda\n\
         source env.sh\n\
         echo two"
    );
    assert!(!scripts[0].contains("--dependency"));
    Ok(())
}

#[test]
fn fan_in_depends_on_every_parallel_leaf() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    let workflow = sandbox.write_workflow(
        r##"
preambles:
  base:
    - "#!/bin/bash"

group:
  name: fanin
  type: sequential
  jobs:
    - group:
        type: parallel
        jobs:
          - job:
              preamble: base
              command: echo a
          - job:
              preamble: base
              command: echo b
    - job:
        preamble: base
        command: echo c
"##,
    )?;
    submitter.submit_workflow(&workflow)?;

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    assert_eq!(jobs.len(), 3);
    assert!(jobs[0].parents.is_empty());
    assert!(jobs[1].parents.is_empty());
    assert_eq!(jobs[2].parents, ["12345", "12346"]);

    let scripts = sandbox.submitted_scripts()?;
    assert!(scripts[2].contains("#SBATCH --dependency=afterok:12345:12346"));
    Ok(())
}

#[test]
fn sweep_expands_the_full_grid_under_one_node() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    let workflow = sandbox.write_workflow(
        r##"
preambles:
  gpu:
    - "#SBATCH --gres=gpu:1"

group:
  name: grid
  type: sequential
  jobs:
    - group:
        type: sweep
        preamble: gpu
        sweep:
          param1: [1, 2]
          param2: [a, b]
        sweep_template: "run --p1={param1} --p2={param2}"
"##,
    )?;
    submitter.submit_workflow(&workflow)?;

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    let commands: Vec<&str> = jobs.iter().map(|j| j.command.as_str()).collect();
    assert_eq!(
        commands,
        [
            "run --p1=1 --p2=a",
            "run --p1=1 --p2=b",
            "run --p1=2 --p2=a",
            "run --p1=2 --p2=b",
        ]
    );
    assert!(jobs.iter().all(|j| j.node_id == jobs[0].node_id));
    assert!(jobs.iter().all(|j| j.parents.is_empty()));
    Ok(())
}

#[test]
fn parallel_loop_keeps_iterations_independent() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    let workflow = sandbox.write_workflow(
        r##"
preambles:
  base:
    - "#!/bin/bash"

group:
  name: fleet
  type: loop
  loop_count: 2
  loop_kind: parallel
  jobs:
    - group:
        type: sequential
        jobs:
          - job:
              preamble: base
              command: echo j1
          - job:
              preamble: base
              command: echo j2
"##,
    )?;
    submitter.submit_workflow(&workflow)?;

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    assert_eq!(jobs.len(), 4);
    assert!(jobs[0].parents.is_empty());
    assert_eq!(jobs[1].parents, ["12345"]);
    assert!(jobs[2].parents.is_empty());
    assert_eq!(jobs[3].parents, ["12347"]);

    assert_eq!(jobs[0].node_id, jobs[1].node_id);
    assert_eq!(jobs[2].node_id, jobs[3].node_id);
    assert_ne!(jobs[0].node_id, jobs[2].node_id);
    Ok(())
}

#[test]
fn group_id_substitutions_share_the_root_token() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    let workflow = sandbox.write_workflow(
        r##"
preambles:
  base:
    - "#!/bin/bash"

group:
  name: tokens
  type: sequential
  jobs:
    - group:
        type: parallel
        jobs:
          - job:
              preamble: base
              command: "echo j1 --group_id {group_id}"
          - job:
              preamble: base
              command: "echo j2 --group_id {group_id}"
    - job:
        preamble: base
        command: "echo j3 --group_id {group_id}"
"##,
    )?;
    submitter.submit_workflow(&workflow)?;

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    let chain = |index: usize| {
        jobs[index]
            .command
            .rsplit(' ')
            .next()
            .unwrap()
            .to_string()
    };
    let root_token = chain(2);
    assert!(!root_token.contains('-'));
    assert!(chain(0).starts_with(&format!("{root_token}-")));
    assert_eq!(chain(0), chain(1));
    Ok(())
}

#[test]
fn submit_failure_aborts_the_walk_and_keeps_earlier_jobs() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    sandbox.fail_after(1)?;
    let workflow = sandbox.write_workflow(LINEAR_WORKFLOW)?;

    match submitter.submit_workflow(&workflow) {
        Err(Error::SubmitFailed(_)) => {}
        other => panic!("expected SubmitFailed, got {other:?}"),
    }

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    assert_eq!(jobs.len(), 1, "the first submission stays recorded");
    assert_eq!(jobs[0].id, "12345");
    Ok(())
}

#[test]
fn dry_mode_appends_the_rehearsal_flag() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    submitter.dry = true;
    let workflow = sandbox.write_workflow(LINEAR_WORKFLOW)?;
    submitter.submit_workflow(&workflow)?;

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    assert!(jobs.iter().all(|j| j.command.ends_with(" --dry")));
    Ok(())
}

#[test]
fn afterany_dependencies_reach_script_and_store() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = JobSubmitter::new(sandbox.store()?, sandbox.client(), DepKind::Afterany);
    let workflow = sandbox.write_workflow(LINEAR_WORKFLOW)?;
    submitter.submit_workflow(&workflow)?;

    let scripts = sandbox.submitted_scripts()?;
    assert!(scripts[1].contains("#SBATCH --dependency=afterany:12345"));

    let edges = sandbox.store()?.edges()?;
    assert_eq!(
        edges,
        [Edge {
            parent: "12345".to_string(),
            child: "12346".to_string(),
            dep_kind: "afterany".to_string(),
        }]
    );
    Ok(())
}

#[test]
fn passthrough_submission_records_a_bare_job() -> TestResult {
    let sandbox = Sandbox::new()?;
    let mut submitter = sandbox.submitter()?;
    let script = sandbox.path().join("raw.sh");
    fs::write(&script, "#!/bin/sh\necho raw\n")?;

    let id = submitter.submit_passthrough(&[script.display().to_string()])?;
    assert_eq!(id, "12345");

    let jobs = get_jobs(&sandbox.store()?, &sandbox.client(), &[], false)?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].node_name, "batch");
    assert!(jobs[0].parents.is_empty());
    Ok(())
}
