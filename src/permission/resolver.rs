//! Menu and operation-matrix screen driver.

use parking_lot::Mutex;

use super::matrix::{OperationFlag, OperationMatrix, OperationRow};
use super::tree::{build_tree, decode_nodes, PermissionNode};
use crate::core::ExecutionContext;
use crate::dsl::{RequestStep, ValueExpr, WorkflowGraph};
use crate::engine::{GroupOutcome, GroupStatus, WorkflowOrchestrator};
use crate::error::ScreenError;
use crate::table::extract_rows;

pub const LOAD_MENU_GROUP: &str = "load_menu";
pub const LOAD_OPERATION_GROUP: &str = "load_operation";
pub const SAVE_OPERATION_GROUP: &str = "save_operation";

pub const SELECTED_MENU_KEY: &str = "selectedMenuId";
pub const SELECTED_SERVICE_KEY: &str = "selectedServiceId";

#[derive(Debug, Default)]
struct PermissionState {
    tree: Vec<PermissionNode>,
    selected: Option<PermissionNode>,
    matrix: OperationMatrix,
}

/// Drives the permission screen from a workflow graph holding the
/// `load_menu`, `load_operation` and `save_operation` groups.
///
/// The graph is a template: selections bind context keys for one run and
/// never rewrite the configured steps.
pub struct PermissionResolver {
    graph: WorkflowGraph,
    menu: WorkflowOrchestrator,
    operations: WorkflowOrchestrator,
    state: Mutex<PermissionState>,
}

impl PermissionResolver {
    pub fn new(orchestrator: WorkflowOrchestrator, graph: WorkflowGraph) -> Self {
        Self {
            graph,
            operations: orchestrator.fork(),
            menu: orchestrator,
            state: Mutex::new(PermissionState::default()),
        }
    }

    pub fn tree(&self) -> Vec<PermissionNode> {
        self.state.lock().tree.clone()
    }

    pub fn selected(&self) -> Option<PermissionNode> {
        self.state.lock().selected.clone()
    }

    pub fn matrix(&self) -> OperationMatrix {
        self.state.lock().matrix.clone()
    }

    /// Run `load_menu` and rebuild the tree from its listing.
    pub async fn load_menu(&self) -> Result<Vec<PermissionNode>, ScreenError> {
        let group = self
            .graph
            .get(LOAD_MENU_GROUP)
            .ok_or_else(|| ScreenError::MissingGroup(LOAD_MENU_GROUP.to_string()))?;
        let mut run = self.menu.begin();
        let epoch = run.epoch();
        let outcome = run.run_group(LOAD_MENU_GROUP, group).await;
        if run.commit().is_none() {
            return Err(ScreenError::Stale);
        }
        let items = completed_rows(&outcome)?;
        let tree = build_tree(decode_nodes(&items));

        let mut state = self.state.lock();
        if !self.menu.is_current(epoch) {
            return Err(ScreenError::Stale);
        }
        state.tree = tree.clone();
        Ok(tree)
    }

    /// Run `load_operation` for `node` and replace the matrix.
    pub async fn select_node(&self, node: &PermissionNode) -> Result<OperationMatrix, ScreenError> {
        let group = self
            .graph
            .get(LOAD_OPERATION_GROUP)
            .ok_or_else(|| ScreenError::MissingGroup(LOAD_OPERATION_GROUP.to_string()))?;
        let mut run = self.operations.begin();
        let epoch = run.epoch();
        bind_selection(run.context_mut(), node);
        tracing::debug!(epoch, command_id = %node.command_id, "loading operations");

        let outcome = run.run_group(LOAD_OPERATION_GROUP, group).await;
        if run.commit().is_none() {
            return Err(ScreenError::Stale);
        }
        let items = completed_rows(&outcome)?;
        let matrix = OperationMatrix::from_values(&items);

        let mut state = self.state.lock();
        if !self.operations.is_current(epoch) {
            return Err(ScreenError::Stale);
        }
        state.selected = Some(node.clone());
        state.matrix = matrix.clone();
        Ok(matrix)
    }

    /// Flip one checkbox. The cell changes immediately and is restored if
    /// the write does not succeed.
    pub async fn toggle(
        &self,
        role_id: &str,
        command_id: &str,
        flag: OperationFlag,
    ) -> Result<OperationRow, ScreenError> {
        let template = self
            .graph
            .get(SAVE_OPERATION_GROUP)
            .and_then(|g| g.steps.first())
            .ok_or_else(|| ScreenError::MissingGroup(SAVE_OPERATION_GROUP.to_string()))?;

        let (updated, previous) = {
            let mut state = self.state.lock();
            let cell = state
                .matrix
                .cell_mut(role_id, command_id)
                .ok_or_else(|| ScreenError::UnknownCell {
                    role_id: role_id.to_string(),
                    command_id: command_id.to_string(),
                })?;
            let previous = cell.flag(flag);
            cell.toggle(flag);
            (cell.clone(), previous)
        };

        let step = write_step(template, &updated);
        // Writes are independent of each other and of the loads.
        let writer = self.operations.fork();
        let mut ctx = self.operations.context();
        let outcome = writer.run_single(&step, &mut ctx).await;
        if outcome.is_success() {
            return Ok(updated);
        }

        tracing::warn!(role_id, command_id, ?flag, "operation write failed, rolling back");
        let mut state = self.state.lock();
        if let Some(cell) = state.matrix.cell_mut(role_id, command_id) {
            if cell.flag(flag) == updated.flag(flag) {
                cell.set_flag(flag, previous);
            }
        }
        drop(state);

        let group = GroupOutcome {
            name: SAVE_OPERATION_GROUP.to_string(),
            status: GroupStatus::Failed,
            force_logout: outcome.is_auth_failure(),
            steps: vec![outcome],
        };
        Err(group.failure())
    }
}

fn bind_selection(ctx: &mut ExecutionContext, node: &PermissionNode) {
    ctx.set(SELECTED_MENU_KEY, node.command_id.clone());
    ctx.set(SELECTED_SERVICE_KEY, node.service_id().to_string());
}

/// The single-step write for one cell, built from a fresh copy of the
/// configured step.
fn write_step(template: &RequestStep, row: &OperationRow) -> RequestStep {
    template
        .clone()
        .with_input("RoleId", ValueExpr::literal(row.role_id.clone()))
        .with_input("CommandId", ValueExpr::literal(row.command_id.clone()))
        .with_input("Invoke", ValueExpr::literal(row.invoke))
        .with_input("Approve", ValueExpr::literal(row.approve))
}

fn completed_rows(outcome: &GroupOutcome) -> Result<Vec<serde_json::Value>, ScreenError> {
    if !outcome.status.satisfies_dependents() {
        return Err(outcome.failure());
    }
    Ok(outcome.last_data().map(extract_rows).unwrap_or_default().rows)
}
