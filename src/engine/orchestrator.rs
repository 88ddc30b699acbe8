//! Workflow orchestrator: executes FO steps, groups and BO graphs.
//!
//! Each step goes Resolving → Dispatching → Merging → Completed | Failed.
//! A [`WorkflowOrchestrator`] is a handle: every run started on it takes a new
//! epoch, and results that arrive for an older epoch are dropped without
//! touching any context and without surfacing their errors.
//!
//! A failing `critical` step fails its group and blocks dependent groups. For
//! an awaited step the remaining steps are skipped; a detached step settles
//! after later steps were already dispatched, so only the group status moves.

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::Value;

use super::dependency;
use super::outcome::{GraphOutcome, GroupOutcome, GroupStatus, StepOutcome, StepStatus};
use super::substitution::instantiate;
use super::transport::{DispatchRequest, Transport};
use crate::config::OrchestratorConfig;
use crate::core::{
    lookup_path, ConsoleEvent, EpochCounter, ExecutionContext, RunToken, RuntimeContext,
};
use crate::dsl::{ExecutionGroup, RequestStep, WorkflowGraph};
use crate::error::{StepError, TransportError};
use crate::response::{Classification, ErrorEntry, ResponseEnvelope, ResponseValidator, TRANSPORT_ERROR_KEY};

/// Group name used for steps run on their own.
pub const SINGLE_STEP_GROUP: &str = "single";

#[derive(Clone)]
pub struct WorkflowOrchestrator {
    transport: Arc<dyn Transport>,
    validator: Arc<ResponseValidator>,
    runtime: RuntimeContext,
    config: OrchestratorConfig,
    epoch: EpochCounter,
    committed: Arc<RwLock<ExecutionContext>>,
}

impl WorkflowOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let config = OrchestratorConfig::default();
        Self {
            transport,
            validator: Arc::new(config.validator()),
            runtime: RuntimeContext::default(),
            config,
            epoch: EpochCounter::new(),
            committed: Arc::new(RwLock::new(ExecutionContext::new())),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.validator = Arc::new(config.validator());
        self.config = config;
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimeContext) -> Self {
        self.runtime = runtime;
        self
    }

    /// A new handle sharing transport, configuration and runtime, with its
    /// own epoch counter and committed context.
    pub fn fork(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            validator: self.validator.clone(),
            runtime: self.runtime.clone(),
            config: self.config.clone(),
            epoch: EpochCounter::new(),
            committed: Arc::new(RwLock::new(ExecutionContext::new())),
        }
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }

    pub fn runtime(&self) -> &RuntimeContext {
        &self.runtime
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.current()
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch.is_current(epoch)
    }

    /// Snapshot of the context committed by the latest completed run.
    pub fn context(&self) -> ExecutionContext {
        self.committed.read().clone()
    }

    /// Start a run from the committed context. Supersedes every run started
    /// earlier on this handle.
    pub fn begin(&self) -> WorkflowRun<'_> {
        let ctx = self.context();
        self.begin_with(ctx)
    }

    /// Start a run from an explicit context.
    pub fn begin_with(&self, mut ctx: ExecutionContext) -> WorkflowRun<'_> {
        ctx.clear_journal();
        let token = self.epoch.advance();
        tracing::debug!(epoch = token.epoch(), "workflow run started");
        WorkflowRun {
            orchestrator: self,
            token,
            ctx,
            stale: false,
            halted: false,
        }
    }

    /// Execute one FO call against `ctx`. On a current epoch the updated
    /// context is written back into `ctx` and committed to the handle.
    pub async fn run_single(&self, step: &RequestStep, ctx: &mut ExecutionContext) -> StepOutcome {
        let mut run = self.begin_with(ctx.clone());
        let outcome = run.run_single(step).await;
        if let Some(updated) = run.commit() {
            *ctx = updated;
        }
        outcome
    }

    pub async fn run_group(
        &self,
        name: &str,
        group: &ExecutionGroup,
        ctx: &mut ExecutionContext,
    ) -> GroupOutcome {
        let mut run = self.begin_with(ctx.clone());
        let outcome = run.run_group(name, group).await;
        if let Some(updated) = run.commit() {
            *ctx = updated;
        }
        outcome
    }

    pub async fn run_graph(&self, graph: &WorkflowGraph, ctx: &mut ExecutionContext) -> GraphOutcome {
        let mut run = self.begin_with(ctx.clone());
        let outcome = run.run_graph(graph).await;
        if let Some(updated) = run.commit() {
            *ctx = updated;
        }
        outcome
    }

    fn emit(&self, token: &RunToken, event: ConsoleEvent) {
        if token.is_current() {
            self.runtime.emit(event);
        }
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, TransportError> {
        self.transport.invoke(request).await
    }

    /// Execute a group on `ctx`, which receives the group's writes as they
    /// happen so later steps of the same group can chain on them.
    async fn execute_group(
        &self,
        token: &RunToken,
        name: &str,
        group: &ExecutionGroup,
        ctx: &mut ExecutionContext,
    ) -> GroupOutcome {
        let mut outcomes: Vec<Option<StepOutcome>> = vec![None; group.steps.len()];
        let mut detached: Vec<(usize, tokio::task::JoinHandle<Result<Value, TransportError>>)> = Vec::new();
        let mut halted = false;
        let mut stale = false;
        let mut force_logout = false;

        for (index, step) in group.steps.iter().enumerate() {
            if halted {
                outcomes[index] = Some(StepOutcome::new(name, index, &step.workflow_id, StepStatus::Skipped));
                continue;
            }

            let request = match instantiate(step, ctx, &self.runtime) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(group = %name, workflow_id = %step.workflow_id, error = %e, "step not dispatched");
                    let mut outcome = StepOutcome::new(name, index, &step.workflow_id, StepStatus::Failed);
                    outcome.error = Some(StepError::Resolution(e));
                    self.emit_failure(token, &outcome);
                    halted |= step.critical;
                    outcomes[index] = Some(outcome);
                    continue;
                }
            };

            tracing::debug!(
                epoch = token.epoch(),
                group = %name,
                workflow_id = %request.workflow_id,
                detached = !step.should_await,
                "dispatching step"
            );
            self.emit(
                token,
                ConsoleEvent::StepDispatched {
                    epoch: token.epoch(),
                    group: name.to_string(),
                    workflow_id: request.workflow_id.clone(),
                    timestamp: self.runtime.time_provider.now(),
                },
            );

            if !step.should_await {
                let transport = self.transport.clone();
                let handle = tokio::spawn(async move { transport.invoke(&request).await });
                detached.push((index, handle));
                continue;
            }

            let raw = self.dispatch(&request).await;
            if token.is_stale() {
                tracing::debug!(epoch = token.epoch(), group = %name, "discarding stale response");
                outcomes[index] = Some(StepOutcome::new(name, index, &step.workflow_id, StepStatus::Stale));
                stale = true;
                break;
            }
            let outcome = self.settle(token, name, index, step, raw, ctx);
            if !outcome.is_success() {
                if outcome.is_auth_failure() {
                    force_logout = true;
                    halted |= self.config.halt_on_auth;
                }
                halted |= step.critical;
            }
            outcomes[index] = Some(outcome);
        }

        if stale {
            for (_, handle) in &detached {
                handle.abort();
            }
        } else {
            for (index, handle) in detached {
                let step = &group.steps[index];
                let raw = match handle.await {
                    Ok(raw) => raw,
                    Err(e) => Err(TransportError::Network(format!("dispatch task failed: {}", e))),
                };
                if token.is_stale() {
                    outcomes[index] = Some(StepOutcome::new(name, index, &step.workflow_id, StepStatus::Stale));
                    stale = true;
                    continue;
                }
                let outcome = self.settle(token, name, index, step, raw, ctx);
                if !outcome.is_success() {
                    if outcome.is_auth_failure() {
                        force_logout = true;
                        halted |= self.config.halt_on_auth;
                    }
                    // Later steps were already dispatched; the group still fails.
                    halted |= step.critical;
                }
                outcomes[index] = Some(outcome);
            }
        }

        let steps: Vec<StepOutcome> = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, o)| {
                o.unwrap_or_else(|| {
                    let status = if stale { StepStatus::Stale } else { StepStatus::Skipped };
                    StepOutcome::new(name, index, &group.steps[index].workflow_id, status)
                })
            })
            .collect();

        let status = if stale {
            GroupStatus::Stale
        } else if halted {
            GroupStatus::Failed
        } else if steps.iter().all(StepOutcome::is_success) {
            GroupStatus::Completed
        } else {
            GroupStatus::Partial
        };

        GroupOutcome {
            name: name.to_string(),
            status,
            steps,
            force_logout: force_logout && !stale,
        }
    }

    /// Classify a response and, on success only, merge its write-backs.
    fn settle(
        &self,
        token: &RunToken,
        group: &str,
        index: usize,
        step: &RequestStep,
        raw: Result<Value, TransportError>,
        ctx: &mut ExecutionContext,
    ) -> StepOutcome {
        let envelope = match raw {
            Ok(raw) => ResponseEnvelope::from_raw(raw),
            Err(e) => ResponseEnvelope::failure(
                0,
                ErrorEntry {
                    key: Some(TRANSPORT_ERROR_KEY.to_string()),
                    execute_id: None,
                    info: e.to_string(),
                },
            ),
        };

        let classification = self.validator.classify(&envelope);
        let mut outcome = StepOutcome::new(group, index, &step.workflow_id, StepStatus::Completed);

        match classification {
            Classification::Success => {
                merge_write_backs(step, envelope.data(), ctx);
                self.emit(
                    token,
                    ConsoleEvent::StepCompleted {
                        epoch: token.epoch(),
                        group: group.to_string(),
                        workflow_id: step.workflow_id.clone(),
                        timestamp: self.runtime.time_provider.now(),
                    },
                );
            }
            failure => {
                outcome.status = StepStatus::Failed;
                outcome.error = failure.into_step_error();
                self.emit_failure(token, &outcome);
            }
        }
        outcome.envelope = Some(envelope);
        outcome
    }

    fn emit_failure(&self, token: &RunToken, outcome: &StepOutcome) {
        let Some(error) = &outcome.error else {
            return;
        };
        let execute_id = error.entry().and_then(|e| e.execute_id.clone());
        tracing::warn!(
            epoch = token.epoch(),
            group = %outcome.group,
            workflow_id = %outcome.workflow_id,
            execute_id = execute_id.as_deref().unwrap_or("-"),
            error = %error,
            "step failed"
        );
        self.emit(
            token,
            ConsoleEvent::StepFailed {
                epoch: token.epoch(),
                group: outcome.group.clone(),
                workflow_id: outcome.workflow_id.clone(),
                error: error.to_string(),
                execute_id: execute_id.clone(),
                timestamp: self.runtime.time_provider.now(),
            },
        );
        if let StepError::Auth(entry) = error {
            tracing::info!(epoch = token.epoch(), "authentication failure; forcing logout");
            self.emit(
                token,
                ConsoleEvent::ForceLogout {
                    epoch: token.epoch(),
                    reason: entry.info.clone(),
                    execute_id,
                    timestamp: self.runtime.time_provider.now(),
                },
            );
        }
    }
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("epoch", &self.epoch.current())
            .field("config", &self.config)
            .finish()
    }
}

fn merge_write_backs(step: &RequestStep, data: Option<&Value>, ctx: &mut ExecutionContext) {
    if let Some(id) = &step.id {
        ctx.set(id.clone(), data.cloned().unwrap_or(Value::Null));
    }
    for wb in &step.write_back {
        match data.and_then(|d| lookup_path(d, &wb.from)) {
            Some(v) => ctx.set(wb.to.clone(), v.clone()),
            None => tracing::debug!(
                workflow_id = %step.workflow_id,
                path = %wb.from,
                "write-back path absent from response data"
            ),
        }
    }
}

/// One orchestration run, bound to an epoch of its handle.
pub struct WorkflowRun<'a> {
    orchestrator: &'a WorkflowOrchestrator,
    token: RunToken,
    ctx: ExecutionContext,
    stale: bool,
    halted: bool,
}

impl<'a> WorkflowRun<'a> {
    pub fn epoch(&self) -> u64 {
        self.token.epoch()
    }

    pub fn is_stale(&self) -> bool {
        self.stale || self.token.is_stale()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.ctx
    }

    pub async fn run_single(&mut self, step: &RequestStep) -> StepOutcome {
        let group = ExecutionGroup::new(vec![step.clone()]);
        let mut outcome = self.run_group(SINGLE_STEP_GROUP, &group).await;
        let status = match outcome.status {
            GroupStatus::Stale => StepStatus::Stale,
            _ => StepStatus::Skipped,
        };
        outcome
            .steps
            .pop()
            .unwrap_or_else(|| StepOutcome::new(SINGLE_STEP_GROUP, 0, &step.workflow_id, status))
    }

    pub async fn run_group(&mut self, name: &str, group: &ExecutionGroup) -> GroupOutcome {
        if self.is_stale() {
            return GroupOutcome::skipped(name, GroupStatus::Stale);
        }
        if self.halted {
            return GroupOutcome::skipped(name, GroupStatus::Skipped);
        }
        let orchestrator = self.orchestrator;
        let outcome = orchestrator
            .execute_group(&self.token, name, group, &mut self.ctx)
            .await;
        self.absorb(&outcome);
        outcome
    }

    /// Execute every group of `graph` in dependency waves.
    pub async fn run_graph(&mut self, graph: &WorkflowGraph) -> GraphOutcome {
        let orchestrator = self.orchestrator;
        let plan = dependency::plan(graph);
        let groups: Vec<(&str, &ExecutionGroup)> = graph.groups().collect();
        let mut results: Vec<Option<GroupOutcome>> = vec![None; groups.len()];

        for wave in &plan.waves {
            let mut runnable = Vec::new();
            for &i in wave {
                let (name, _) = groups[i];
                let blocked = plan.dependencies[i].iter().any(|d| {
                    results[*d]
                        .as_ref()
                        .map_or(true, |r| !r.status.satisfies_dependents())
                });
                if self.is_stale() {
                    results[i] = Some(GroupOutcome::skipped(name, GroupStatus::Stale));
                } else if self.halted || blocked {
                    tracing::debug!(group = %name, "group skipped");
                    results[i] = Some(GroupOutcome::skipped(name, GroupStatus::Skipped));
                } else {
                    runnable.push(i);
                }
            }

            if runnable.len() > 1 && orchestrator.config.parallel_groups {
                // Concurrent groups each run on a snapshot; their writes are
                // replayed in declaration order once the wave is done.
                let mut locals: Vec<(usize, ExecutionContext)> = runnable
                    .iter()
                    .map(|&i| (i, self.ctx.snapshot()))
                    .collect();
                let token = &self.token;
                let outcomes = join_all(locals.iter_mut().map(|(i, local)| {
                    let (name, group) = groups[*i];
                    orchestrator.execute_group(token, name, group, local)
                }))
                .await;
                let wave_stale = self.token.is_stale();
                for ((i, local), outcome) in locals.iter().zip(outcomes) {
                    if !wave_stale {
                        self.ctx.apply(local.writes_since(0));
                    }
                    self.absorb(&outcome);
                    results[*i] = Some(outcome);
                }
            } else {
                for i in runnable {
                    let (name, group) = groups[i];
                    let outcome = if self.is_stale() {
                        GroupOutcome::skipped(name, GroupStatus::Stale)
                    } else if self.halted {
                        GroupOutcome::skipped(name, GroupStatus::Skipped)
                    } else {
                        let outcome = orchestrator
                            .execute_group(&self.token, name, group, &mut self.ctx)
                            .await;
                        self.absorb(&outcome);
                        outcome
                    };
                    results[i] = Some(outcome);
                }
            }
        }

        let stale = self.is_stale();
        let outcomes: Vec<GroupOutcome> = results
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.unwrap_or_else(|| GroupOutcome::skipped(groups[i].0, GroupStatus::Skipped)))
            .collect();
        let force_logout = !stale && outcomes.iter().any(|g| g.force_logout);
        GraphOutcome {
            epoch: self.token.epoch(),
            stale,
            force_logout,
            groups: outcomes,
        }
    }

    fn absorb(&mut self, outcome: &GroupOutcome) {
        if outcome.status == GroupStatus::Stale || self.token.is_stale() {
            self.stale = true;
        }
        if outcome.force_logout && self.orchestrator.config.halt_on_auth {
            self.halted = true;
        }
    }

    /// Publish the run's context to the handle. Returns `None`, and leaves
    /// the handle untouched, when a newer run has started since.
    pub fn commit(self) -> Option<ExecutionContext> {
        let orchestrator = self.orchestrator;
        let mut committed = orchestrator.committed.write();
        if self.stale || self.token.is_stale() {
            tracing::debug!(epoch = self.token.epoch(), "stale run not committed");
            return None;
        }
        let mut ctx = self.ctx;
        ctx.clear_journal();
        *committed = ctx.clone();
        Some(ctx)
    }
}
