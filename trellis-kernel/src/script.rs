use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DepKind {
    #[default]
    Afterok,
    Afterany,
}

impl DepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepKind::Afterok => "afterok",
            DepKind::Afterany => "afterany",
        }
    }
}

impl std::fmt::Display for DepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a submittable batch script.
///
/// Layout is fixed: scheduler directives (`#!`/`#SBATCH` lines in preamble
/// order), then the dependency directive when parents exist, then the
/// remaining non-empty preamble lines, then the command. Duplicate parents
/// are collapsed in the directive, first occurrence wins.
pub fn render_script(preamble: &str, parents: &[String], dep_kind: DepKind, command: &str) -> String {
    let mut directives = Vec::new();
    let mut setup = Vec::new();

    for line in preamble.lines() {
        if line.starts_with("#!") || line.starts_with("#SBATCH") {
            directives.push(line);
        } else if !line.trim().is_empty() {
            setup.push(line);
        }
    }

    let mut lines: Vec<String> = directives.iter().map(|l| l.to_string()).collect();

    let unique = dedup_preserving_order(parents);
    if !unique.is_empty() {
        lines.push(format!(
            "#SBATCH --dependency={}:{}",
            dep_kind,
            unique.join(":")
        ));
    }

    lines.extend(setup.iter().map(|l| l.to_string()));
    lines.push(command.to_string());
    lines.join("\n")
}

fn dedup_preserving_order(parents: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    parents
        .iter()
        .filter(|p| seen.insert(p.as_str()))
        .cloned()
        .collect()
}
