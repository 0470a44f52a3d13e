/// One fully-lowered leaf, ready for the submission boundary.
///
/// `command` is post-substitution, `preamble` is the resolved multi-line
/// prelude, and `parents` is the logical dependency list in walk order
/// (duplicates are collapsed only when the script directive is rendered).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSpec {
    pub command: String,
    pub preamble: String,
    pub parents: Vec<String>,
    pub node_id: String,
    pub node_name: String,
}

/// The effect seam between the lowering engine and the scheduler.
///
/// Implementations render the leaf to a batch script, hand it to the external
/// submitter, and record the job plus its parent edges. The returned string is
/// the scheduler-assigned job ID.
pub trait SubmitPort {
    type Error: std::error::Error + Send + Sync + 'static;

    fn submit(&mut self, leaf: &LeafSpec) -> Result<String, Self::Error>;
}
