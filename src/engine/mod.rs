//! Engine layer: workflow execution.
//!
//! Instantiates request templates against the execution context, hands them
//! to a [`Transport`], classifies the envelopes and merges write-backs.

pub mod dependency;
#[cfg(feature = "http-transport")]
pub mod http_transport;
pub mod orchestrator;
pub mod outcome;
pub mod substitution;
pub mod transport;

pub use dependency::{plan, ExecutionPlan};
#[cfg(feature = "http-transport")]
pub use http_transport::{HttpTransport, HttpTransportConfig};
pub use orchestrator::{WorkflowOrchestrator, WorkflowRun, SINGLE_STEP_GROUP};
pub use outcome::{GraphOutcome, GroupOutcome, GroupStatus, StepOutcome, StepStatus};
pub use substitution::{instantiate, resolve_expr};
pub use transport::{DispatchRequest, ReplayTransport, Transport};
