use serde_json::Value;

/// Parser rejection. The message names the offending node so the caller can
/// surface it without re-walking the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanError {
    message: String,
}

impl PlanError {
    pub fn new(message: impl Into<String>) -> Self {
        PlanError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PlanError {}

/// A submittable unit before lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PJob {
    pub preamble: String,
    pub command: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Sequential,
    Parallel,
    Sweep,
    Loop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Sequential,
    Parallel,
}

/// An interior node of the plan tree. Field relevance depends on `kind`:
/// `sweep`/`sweep_template` for sweeps, `loop_count`/`loop_kind` for loops.
#[derive(Debug, Clone, PartialEq)]
pub struct PGroup {
    pub kind: GroupKind,
    pub children: Vec<PNode>,
    pub preamble: Option<String>,
    pub sweep: Vec<(String, Vec<String>)>,
    pub sweep_template: String,
    pub loop_count: u32,
    pub loop_kind: LoopKind,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PNode {
    Job(PJob),
    Group(PGroup),
}

const JOB_KEYS: &[&str] = &["preamble", "command", "name"];
const GROUP_KEYS: &[&str] = &[
    "type",
    "jobs",
    "name",
    "preamble",
    "sweep",
    "sweep_template",
    "loop_count",
    "loop_kind",
];

impl PGroup {
    /// Builds the plan tree from a generic nested mapping (the `group` value
    /// of a workflow file). Key order of `sweep` mappings is preserved.
    pub fn from_value(value: &Value) -> Result<PGroup, PlanError> {
        let map = value
            .as_object()
            .ok_or_else(|| PlanError::new("group must be a mapping"))?;

        for key in map.keys() {
            if !GROUP_KEYS.contains(&key.as_str()) {
                return Err(PlanError::new(format!("unknown group key `{key}`")));
            }
        }

        let kind = match map.get("type").and_then(Value::as_str) {
            Some("sequential") => GroupKind::Sequential,
            Some("parallel") => GroupKind::Parallel,
            Some("sweep") => GroupKind::Sweep,
            Some("loop") => GroupKind::Loop,
            Some(other) => return Err(PlanError::new(format!("unknown group type `{other}`"))),
            None => return Err(PlanError::new("group is missing `type`")),
        };

        let name = optional_string(map.get("name"), "name")?;
        let preamble = optional_string(map.get("preamble"), "preamble")?;

        let mut children = Vec::new();
        if let Some(jobs) = map.get("jobs") {
            let entries = jobs
                .as_array()
                .ok_or_else(|| PlanError::new("`jobs` must be a list"))?;
            for entry in entries {
                children.push(parse_node(entry)?);
            }
        }

        let mut sweep = Vec::new();
        if let Some(sweep_value) = map.get("sweep") {
            let params = sweep_value
                .as_object()
                .ok_or_else(|| PlanError::new("`sweep` must be a mapping of lists"))?;
            for (param, values) in params {
                let list = values.as_array().ok_or_else(|| {
                    PlanError::new(format!("sweep parameter `{param}` must be a list"))
                })?;
                if list.is_empty() {
                    return Err(PlanError::new(format!(
                        "sweep parameter `{param}` has no values"
                    )));
                }
                let rendered = list
                    .iter()
                    .map(|v| scalar_to_string(v, param))
                    .collect::<Result<Vec<_>, _>>()?;
                sweep.push((param.clone(), rendered));
            }
        }

        let sweep_template = optional_string(map.get("sweep_template"), "sweep_template")?
            .unwrap_or_default();

        let loop_count = match map.get("loop_count") {
            Some(value) => value
                .as_u64()
                .filter(|n| *n >= 1)
                .ok_or_else(|| PlanError::new("`loop_count` must be an integer >= 1"))?
                as u32,
            None => 1,
        };

        let loop_kind = match map.get("loop_kind").and_then(Value::as_str) {
            Some("sequential") | None => LoopKind::Sequential,
            Some("parallel") => LoopKind::Parallel,
            Some(other) => return Err(PlanError::new(format!("unknown loop_kind `{other}`"))),
        };

        let group = PGroup {
            kind,
            children,
            preamble,
            sweep,
            sweep_template,
            loop_count,
            loop_kind,
            name,
        };
        group.validate()?;
        Ok(group)
    }

    fn validate(&self) -> Result<(), PlanError> {
        match self.kind {
            GroupKind::Sweep => {
                if self.sweep.is_empty() {
                    return Err(PlanError::new("sweep group is missing `sweep` parameters"));
                }
                if self.sweep_template.is_empty() {
                    return Err(PlanError::new("sweep group is missing `sweep_template`"));
                }
                if !self.children.is_empty() {
                    return Err(PlanError::new("sweep groups take no `jobs`"));
                }
            }
            GroupKind::Loop => {
                if self.children.is_empty() {
                    return Err(PlanError::new("loop group has an empty `jobs` list"));
                }
            }
            GroupKind::Sequential | GroupKind::Parallel => {
                if self.children.is_empty() {
                    let kind = match self.kind {
                        GroupKind::Sequential => "sequential",
                        _ => "parallel",
                    };
                    return Err(PlanError::new(format!(
                        "{kind} group has an empty `jobs` list"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_node(entry: &Value) -> Result<PNode, PlanError> {
    let map = entry
        .as_object()
        .ok_or_else(|| PlanError::new("plan node must be a mapping"))?;

    if let Some(job) = map.get("job") {
        if map.len() > 1 {
            return Err(PlanError::new("`job` node carries extra keys"));
        }
        return Ok(PNode::Job(parse_job(job)?));
    }

    if let Some(group) = map.get("group") {
        if map.len() > 1 {
            return Err(PlanError::new("`group` node carries extra keys"));
        }
        return Ok(PNode::Group(PGroup::from_value(group)?));
    }

    let keys = map.keys().cloned().collect::<Vec<_>>().join(", ");
    Err(PlanError::new(format!(
        "unrecognized plan node with keys [{keys}]"
    )))
}

fn parse_job(value: &Value) -> Result<PJob, PlanError> {
    let map = value
        .as_object()
        .ok_or_else(|| PlanError::new("job must be a mapping"))?;

    for key in map.keys() {
        if !JOB_KEYS.contains(&key.as_str()) {
            return Err(PlanError::new(format!("unknown job key `{key}`")));
        }
    }

    let command = map
        .get("command")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| PlanError::new("job is missing `command`"))?;

    let preamble = optional_string(map.get("preamble"), "preamble")?.unwrap_or_default();
    let name = optional_string(map.get("name"), "name")?;

    Ok(PJob {
        preamble,
        command: command.to_string(),
        name,
    })
}

fn optional_string(value: Option<&Value>, key: &str) -> Result<Option<String>, PlanError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(PlanError::new(format!("`{key}` must be a string"))),
    }
}

fn scalar_to_string(value: &Value, param: &str) -> Result<String, PlanError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(PlanError::new(format!(
            "sweep parameter `{param}` holds a non-scalar value"
        ))),
    }
}
