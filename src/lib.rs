//! # xconsole: configuration-driven back-office console core
//!
//! `xconsole` turns the opaque JSON configuration a console server delivers
//! into typed screen models, and executes the backend calls those screens
//! declare:
//!
//! - **Schema resolution**: lazily parsed, never-trusted JSON strings inside
//!   field, column and view payloads ([`dsl`]).
//! - **Field dispatch**: display, coercion and validation per `inputtype`
//!   ([`fields`]).
//! - **Workflow orchestration**: FO calls, groups and BO graphs with context
//!   chaining, dependency waves and epoch-based stale-run discard ([`engine`]).
//! - **Response classification**: one success/failure/auth contract for every
//!   envelope ([`response`]).
//! - **Permissions**: menu trees and role/command operation matrices
//!   ([`permission`]).
//! - **Tables**: inline or remote rows, pagination and column filters
//!   ([`table`]).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xconsole::{parse_workflow_graph, ExecutionContext, ReplayTransport, WorkflowOrchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let graph = parse_workflow_graph(Some(r#"{"load": [{"workflowId": "WF_LIST"}]}"#));
//!     let transport = Arc::new(ReplayTransport::new());
//!     let orchestrator = WorkflowOrchestrator::new(transport);
//!     let mut ctx = ExecutionContext::new();
//!     let outcome = orchestrator.run_graph(&graph, &mut ctx).await;
//!     println!("{:?}", outcome.user_error());
//! }
//! ```
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `http-transport` | Enables [`engine::HttpTransport`] (reqwest) |

pub mod config;
pub mod core;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod fields;
pub mod permission;
pub mod response;
pub mod table;

pub use crate::config::{ConsoleConfig, OrchestratorConfig, TableConfig};
pub use crate::core::{
    create_event_channel, ConsoleEvent, EventReceiver, EventSender, ExecutionContext,
    FakeIdGenerator, FakeTimeProvider, IdGenerator, RealIdGenerator, RealTimeProvider,
    RuntimeContext, TimeProvider,
};
pub use crate::dsl::{
    parse_source, parse_workflow_graph, ColumnSchema, ExecutionGroup, FieldSchema, LazyJson,
    ParsedConfig, RequestStep, SchemaResolver, SourceFormat, ValueExpr, ViewSchema,
    WorkflowGraph,
};
#[cfg(feature = "http-transport")]
pub use crate::engine::{HttpTransport, HttpTransportConfig};
pub use crate::engine::{
    DispatchRequest, GraphOutcome, GroupOutcome, GroupStatus, ReplayTransport, StepOutcome,
    StepStatus, Transport, WorkflowOrchestrator, WorkflowRun,
};
pub use crate::error::{
    ConsoleError, ConsoleResult, ResolutionError, ScreenError, StepError, TransportError,
};
pub use crate::fields::{dispatch, dispatch_field, FieldKind, FieldView, ValidationResult};
pub use crate::permission::{OperationFlag, OperationMatrix, PermissionNode, PermissionResolver};
pub use crate::response::{
    Classification, ErrorEntry, ResponseEnvelope, ResponseValidator, UserFacingError,
};
pub use crate::table::{PageRequest, PaginationStyle, TableQueryEngine, TableSource};
