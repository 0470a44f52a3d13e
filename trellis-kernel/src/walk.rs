use std::collections::HashMap;

use crate::ids::six_digit_token;
use crate::plan::{GroupKind, LoopKind, PGroup, PJob, PNode};
use crate::ports::{LeafSpec, SubmitPort};

/// State threaded through one walk. Cloned at every branch point so sibling
/// subtrees never observe each other's mutations; dependency propagation is
/// value-returning (a child hands back its leaf IDs, the parent extends its
/// own local list).
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub depends_on: Vec<String>,
    pub node_name: String,
    pub group_id: String,
    pub node_id: String,
    bindings: Vec<(String, String)>,
}

impl Context {
    fn bind(&mut self, key: &str, value: String) {
        if let Some(entry) = self.bindings.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.bindings.push((key.to_string(), value));
        }
    }
}

/// The lowering engine: recursively turns a plan tree into an ordered
/// sequence of submissions through a [`SubmitPort`].
pub struct Walker<'a, S: SubmitPort> {
    preambles: &'a HashMap<String, String>,
    submitter: &'a mut S,
    submitted: Vec<String>,
}

impl<'a, S: SubmitPort> Walker<'a, S> {
    pub fn new(preambles: &'a HashMap<String, String>, submitter: &'a mut S) -> Self {
        Walker {
            preambles,
            submitter,
            submitted: Vec::new(),
        }
    }

    /// Lowers the whole tree. Returns every submitted job ID in submission
    /// order. The walk starts inside the root group, so leaf commands always
    /// see at least the root token in `{group_id}`.
    pub fn run(&mut self, root: &PGroup) -> Result<Vec<String>, S::Error> {
        let ctx = Context::default();
        self.walk_group(root, &ctx)?;
        Ok(self.submitted.clone())
    }

    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }

    fn walk(&mut self, node: &PNode, ctx: &Context) -> Result<Vec<String>, S::Error> {
        match node {
            PNode::Job(job) => self.submit_leaf(job, ctx),
            PNode::Group(group) => self.walk_group(group, ctx),
        }
    }

    fn walk_group(&mut self, group: &PGroup, ctx: &Context) -> Result<Vec<String>, S::Error> {
        let mut ctx = ctx.clone();
        // One token per visit: siblings under this group share the extension.
        ctx.group_id = extend_chain(&ctx.group_id);
        ctx.node_id = six_digit_token();
        if let Some(name) = &group.name {
            ctx.node_name = join_name(&ctx.node_name, name);
        }

        match group.kind {
            GroupKind::Sequential => self.walk_sequence(&group.children, &ctx),
            GroupKind::Parallel => {
                let mut all = Vec::new();
                for child in &group.children {
                    all.extend(self.walk(child, &ctx)?);
                }
                Ok(all)
            }
            GroupKind::Sweep => self.walk_sweep(group, &ctx),
            GroupKind::Loop => self.walk_loop(group, &ctx),
        }
    }

    /// Sequential composition: each child sees the entry parents plus every
    /// earlier sibling's leaves; the last child's list is what the caller
    /// chains onto.
    fn walk_sequence(&mut self, children: &[PNode], ctx: &Context) -> Result<Vec<String>, S::Error> {
        let mut deps = ctx.depends_on.clone();
        let mut last = Vec::new();
        for child in children {
            let mut child_ctx = ctx.clone();
            child_ctx.depends_on = deps.clone();
            last = self.walk(child, &child_ctx)?;
            deps.extend(last.iter().cloned());
        }
        Ok(last)
    }

    fn walk_sweep(&mut self, group: &PGroup, ctx: &Context) -> Result<Vec<String>, S::Error> {
        let preamble_key = group.preamble.clone().unwrap_or_default();
        let mut ids = Vec::new();

        for (idx, combo) in cartesian(&group.sweep).into_iter().enumerate() {
            let mut leaf_ctx = ctx.clone();
            for (param, value) in combo {
                leaf_ctx.bind(&param, value);
            }
            leaf_ctx.bind("sweep_idx", idx.to_string());

            let leaf = PJob {
                preamble: preamble_key.clone(),
                command: group.sweep_template.clone(),
                name: None,
            };
            ids.extend(self.submit_leaf(&leaf, &leaf_ctx)?);
        }
        Ok(ids)
    }

    fn walk_loop(&mut self, group: &PGroup, ctx: &Context) -> Result<Vec<String>, S::Error> {
        match group.loop_kind {
            LoopKind::Sequential => {
                // Iterations chain exactly like siblings of a sequential
                // group and share the node_id drawn at the loop visit.
                let mut deps = ctx.depends_on.clone();
                let mut last = Vec::new();
                for idx in 0..group.loop_count {
                    let mut iter_ctx = ctx.clone();
                    iter_ctx.bind("loop_idx", idx.to_string());
                    iter_ctx.depends_on = deps.clone();
                    last = self.walk_sequence(&group.children, &iter_ctx)?;
                    deps.extend(last.iter().cloned());
                }
                Ok(last)
            }
            LoopKind::Parallel => {
                // Independent entry parents and a fresh node_id per iteration.
                let mut all = Vec::new();
                for idx in 0..group.loop_count {
                    let mut iter_ctx = ctx.clone();
                    iter_ctx.bind("loop_idx", idx.to_string());
                    iter_ctx.node_id = six_digit_token();
                    all.extend(self.walk_sequence(&group.children, &iter_ctx)?);
                }
                Ok(all)
            }
        }
    }

    fn submit_leaf(&mut self, job: &PJob, ctx: &Context) -> Result<Vec<String>, S::Error> {
        let preamble = self
            .preambles
            .get(&job.preamble)
            .cloned()
            .unwrap_or_default();

        let mut bindings = ctx.bindings.clone();
        bindings.push(("group_id".to_string(), ctx.group_id.clone()));
        let command = substitute(&job.command, &bindings);

        let node_name = match &job.name {
            Some(name) => join_name(&ctx.node_name, name),
            None => ctx.node_name.clone(),
        };

        let leaf = LeafSpec {
            command,
            preamble,
            parents: ctx.depends_on.clone(),
            node_id: ctx.node_id.clone(),
            node_name,
        };

        let id = self.submitter.submit(&leaf)?;
        self.submitted.push(id.clone());
        Ok(vec![id])
    }
}

/// Replaces every known `{token}` occurrence. Brace text with no matching
/// binding passes through untouched so commands may carry literal braces.
pub fn substitute(template: &str, bindings: &[(String, String)]) -> String {
    let mut out = template.to_string();
    for (key, value) in bindings {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

fn cartesian(sweep: &[(String, Vec<String>)]) -> Vec<Vec<(String, String)>> {
    let mut combos: Vec<Vec<(String, String)>> = vec![Vec::new()];
    for (param, values) in sweep {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.push((param.clone(), value.clone()));
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

fn extend_chain(chain: &str) -> String {
    let token = six_digit_token();
    if chain.is_empty() {
        token
    } else {
        format!("{chain}-{token}")
    }
}

fn join_name(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}:{name}")
    }
}
