pub mod ids;
pub mod plan;
pub mod ports;
pub mod script;
pub mod walk;

pub use plan::{GroupKind, LoopKind, PGroup, PJob, PNode, PlanError};
pub use ports::{LeafSpec, SubmitPort};
pub use script::{DepKind, render_script};
pub use walk::{Context, Walker};
