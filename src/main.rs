//! `xconsole` replay tool: runs a workflow graph against canned responses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};

use xconsole::{
    create_event_channel, parse_source, ConsoleConfig, ConsoleError, ConsoleResult,
    ExecutionContext, ReplayTransport, RuntimeContext, SourceFormat, WorkflowGraph,
    WorkflowOrchestrator,
};

/// Replay a workflow graph against canned responses and print the outcome.
#[derive(Parser, Debug)]
#[command(name = "xconsole", version)]
struct Args {
    /// Console configuration (JSON, TOML or YAML).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Workflow graph: group name to ordered step array.
    #[arg(value_name = "GRAPH")]
    graph: PathBuf,
    /// Canned responses keyed by workflow id.
    #[arg(value_name = "RESPONSES")]
    responses: PathBuf,
    /// Initial context object.
    #[arg(value_name = "CONTEXT")]
    context: Option<PathBuf>,
}

fn read_source<T: serde::de::DeserializeOwned>(path: &Path) -> ConsoleResult<T> {
    let content = std::fs::read_to_string(path)?;
    parse_source(&content, SourceFormat::from_path(path))
}

async fn run(args: Args) -> ConsoleResult<Value> {
    let config = match &args.config {
        Some(path) => ConsoleConfig::load(path)?,
        None => ConsoleConfig::default(),
    };
    let graph: WorkflowGraph = read_source(&args.graph)?;
    let responses: Value = read_source(&args.responses)?;
    let mut ctx = match &args.context {
        Some(path) => ExecutionContext::from_value(&read_source::<Value>(path)?),
        None => ExecutionContext::new(),
    };

    tracing::info!(groups = graph.len(), "replaying workflow graph");

    let (tx, mut rx) = create_event_channel();
    let orchestrator = WorkflowOrchestrator::new(Arc::new(ReplayTransport::from_value(&responses)))
        .with_config(config.orchestrator)
        .with_runtime(RuntimeContext::new().with_event_tx(tx));
    let outcome = orchestrator.run_graph(&graph, &mut ctx).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(serde_json::to_value(&event)?);
    }

    Ok(json!({
        "outcome": serde_json::to_value(&outcome)?,
        "user_error": serde_json::to_value(outcome.user_error())?,
        "context": ctx.to_value(),
        "events": events,
    }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await.and_then(|report| serde_json::to_string_pretty(&report).map_err(ConsoleError::from)) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("xconsole: {}", e);
            std::process::exit(1);
        }
    }
}
