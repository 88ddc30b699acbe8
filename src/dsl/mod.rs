//! Server-delivered configuration: lazily parsed schema payloads and the
//! FO/BO workflow model.

pub mod lazy_json;
pub mod parser;
pub mod schema;
pub mod workflow;

pub use lazy_json::{ConfigParseError, ConfigShape, LazyJson, ParsedConfig, SchemaResolver};
pub use parser::{parse_source, SourceFormat};
pub use schema::{ColumnSchema, FieldOption, FieldSchema, ViewSchema};
pub use workflow::{
    looks_like_script, parse_workflow_graph, ExecutionGroup, RequestStep, Transform, ValueExpr,
    WorkflowGraph, WriteBack, TRANSFORM_MARKER,
};
