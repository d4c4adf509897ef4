//! Declarative resource graph evaluator.
//!
//! This is the engine core: declarations whose properties embed deferred
//! values form a dependency DAG, the plan orders it topologically, and the
//! executor provisions it concurrently, feeding resolved outputs into
//! dependents.
//!
//! - [`value`]: deferred values ([`Output`]) and property bindings
//! - [`resource`]: nodes, handles, and post-creation outcome cells
//! - [`evaluator`]: declare/replace/export and edge derivation
//! - [`plan`]: topological ordering and cycle diagnostics
//! - [`executor`]: concurrent apply/destroy with partial-failure semantics

pub mod evaluator;
pub mod executor;
pub mod plan;
pub mod resource;
pub mod value;

pub use evaluator::Evaluator;
pub use executor::{
    CancelHandle, DEFAULT_CONCURRENCY, ExecutionResult, Executor, ResourceReport, ResourceStatus,
    UnresolvedExport,
};
pub use plan::DeploymentPlan;
pub use resource::{OutcomeCell, ResourceHandle, ResourceId, ResourceNode, ResourceOutcome};
pub use value::{Output, Property, PropertyMap, Resolution};
