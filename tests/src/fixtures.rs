#![allow(dead_code, unused_imports)]

pub(crate) use std::fs;
#[cfg(unix)]
pub(crate) use std::os::unix::fs::PermissionsExt;
pub(crate) use std::path::{Path, PathBuf};

pub(crate) use tempfile::TempDir;
pub(crate) use trellis_core::{
    Error, JobStore, JobSubmitter, SlurmClient, get_jobs, retry, store::Edge, viz,
};
pub(crate) use trellis_kernel::DepKind;

pub(crate) type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// One scratch directory holding fake `sbatch`/`sacct`/`scancel`
/// executables, their side-channel files, and the SQLite store. The fakes
/// hand out the IDs 12345, 12346, ... in call order and log every script
/// they receive.
pub(crate) struct Sandbox {
    temp: TempDir,
}

const FAKE_SBATCH: &str = r##"#!/bin/sh
dir="$(dirname "$0")"
count=$(cat "$dir/submit_count" 2>/dev/null || echo 0)
if [ -f "$dir/fail_after" ] && [ "$count" -ge "$(cat "$dir/fail_after")" ]; then
    echo "sbatch: error: Batch job submission failed" >&2
    exit 1
fi
count=$((count + 1))
echo "$count" > "$dir/submit_count"
cat "$1" >> "$dir/submitted_scripts"
printf '\n---\n' >> "$dir/submitted_scripts"
echo "Submitted batch job $((12344 + count))"
"##;

const FAKE_SACCT: &str = r##"#!/bin/sh
dir="$(dirname "$0")"
cat "$dir/accounting_table" 2>/dev/null
exit 0
"##;

const FAKE_SCANCEL: &str = r##"#!/bin/sh
dir="$(dirname "$0")"
echo "$@" >> "$dir/cancel_log"
"##;

impl Sandbox {
    pub(crate) fn new() -> TestResult<Sandbox> {
        let sandbox = Sandbox {
            temp: TempDir::new()?,
        };
        sandbox.write_executable("sbatch", FAKE_SBATCH)?;
        sandbox.write_executable("sacct", FAKE_SACCT)?;
        sandbox.write_executable("scancel", FAKE_SCANCEL)?;
        Ok(sandbox)
    }

    pub(crate) fn path(&self) -> &Path {
        self.temp.path()
    }

    pub(crate) fn client(&self) -> SlurmClient {
        SlurmClient {
            submit_cmd: self.path().join("sbatch").display().to_string(),
            state_cmd: self.path().join("sacct").display().to_string(),
            cancel_cmd: self.path().join("scancel").display().to_string(),
            debug: false,
        }
    }

    pub(crate) fn store(&self) -> TestResult<JobStore> {
        Ok(JobStore::open(self.path().join("jobs.db"))?)
    }

    pub(crate) fn submitter(&self) -> TestResult<JobSubmitter> {
        Ok(JobSubmitter::new(
            self.store()?,
            self.client(),
            DepKind::Afterok,
        ))
    }

    pub(crate) fn write_workflow(&self, contents: &str) -> TestResult<PathBuf> {
        let path = self.path().join("workflow.yaml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Seeds the fake accounting output with `(id, state, workdir)` rows in
    /// `--parsable2` shape.
    pub(crate) fn seed_states(&self, rows: &[(&str, &str, &str)]) -> TestResult {
        let table: String = rows
            .iter()
            .map(|(id, state, workdir)| format!("{id}|{state}|||{workdir}\n"))
            .collect();
        fs::write(self.path().join("accounting_table"), table)?;
        Ok(())
    }

    /// Makes the fake submitter fail once `count` submissions happened.
    pub(crate) fn fail_after(&self, count: usize) -> TestResult {
        fs::write(self.path().join("fail_after"), count.to_string())?;
        Ok(())
    }

    /// Every script the fake submitter received, in call order.
    pub(crate) fn submitted_scripts(&self) -> TestResult<Vec<String>> {
        let log = self.path().join("submitted_scripts");
        if !log.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(log)?;
        Ok(text
            .split("\n---\n")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub(crate) fn cancel_log(&self) -> TestResult<Vec<String>> {
        let log = self.path().join("cancel_log");
        if !log.exists() {
            return Ok(Vec::new());
        }
        Ok(fs::read_to_string(log)?
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn write_executable(&self, name: &str, contents: &str) -> TestResult {
        let path = self.path().join(name);
        fs::write(&path, contents)?;
        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }
}

pub(crate) const LINEAR_WORKFLOW: &str = r##"
preambles:
  base:
    - "#!/bin/bash"
    - "#SBATCH --partition=debug"
    - "#SBATCH --output=run-%j.out"
    - "#SBATCH --error=run-%j.err"
  gpu:
    - "#SBATCH --gres=gpu:1"
    - "#SBATCH --mem=8G"

group:
  name: linear
  type: sequential
  jobs:
    - job:
        preamble: base
        command: echo 'First job'
    - job:
        preamble: gpu
        command: echo 'Second job'
"##;
