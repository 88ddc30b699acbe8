mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{backend_error, ok, GatedTransport};
use xconsole::{
    parse_workflow_graph, ColumnSchema, OperationFlag, PaginationStyle, PermissionResolver,
    ReplayTransport, ScreenError, TableConfig, TableQueryEngine, ViewSchema, WorkflowOrchestrator,
};

fn permission_graph() -> xconsole::WorkflowGraph {
    parse_workflow_graph(Some(
        r#"{
            "load_menu": [{"workflowId": "WF_MENU"}],
            "load_operation": [{"workflowId": "WF_OPS", "input": {
                "MenuId": {"key": "selectedMenuId"},
                "ServiceId": {"key": "selectedServiceId"}
            }}],
            "save_operation": [{"workflowId": "WF_SAVE_OP", "learnApi": "/role/command"}]
        }"#,
    ))
}

#[tokio::test]
async fn test_menu_tree_from_flat_listing() {
    let transport = Arc::new(ReplayTransport::new().with_response(
        "WF_MENU",
        ok(json!([
            {"command_id": "10", "parent_id": "0", "command_type": "M", "command_name": "System"},
            {"command_id": "11", "parent_id": "10", "command_type": "C", "command_name": "Users"}
        ])),
    ));
    let resolver = PermissionResolver::new(WorkflowOrchestrator::new(transport), permission_graph());

    let tree = resolver.load_menu().await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].command_id, "10");
    assert_eq!(tree[0].children.len(), 1);
    assert_eq!(tree[0].children[0].command_id, "11");
    assert_eq!(resolver.tree(), tree);
}

#[tokio::test]
async fn test_menu_auth_failure_surfaces_logout() {
    let transport = Arc::new(
        ReplayTransport::new().with_response("WF_MENU", json!({"status": 401, "payload": {}})),
    );
    let resolver = PermissionResolver::new(WorkflowOrchestrator::new(transport), permission_graph());

    let err = resolver.load_menu().await.unwrap_err();
    assert!(err.is_force_logout());
    assert!(resolver.tree().is_empty());
}

#[tokio::test]
async fn test_operation_matrix_and_toggle() {
    let transport = Arc::new(
        ReplayTransport::new()
            .with_response(
                "WF_OPS",
                ok(json!({"list": [
                    {"role_id": 1, "role_name": "Admin", "command_id": 11, "command_type": "C", "invoke": 1, "approve": 1},
                    {"role_id": 1, "role_name": "Admin", "command_id": 12, "command_type": "C", "invoke": 0, "approve": 0},
                    {"role_id": 2, "role_name": "Auditor", "command_id": 11, "command_type": "C", "invoke": 1, "approve": 0}
                ]})),
            )
            .with_response("WF_SAVE_OP", ok(json!(null)))
            .with_response("WF_SAVE_OP", backend_error("E9", "ex-9", "Approval locked")),
    );
    let resolver = PermissionResolver::new(WorkflowOrchestrator::new(transport.clone()), permission_graph());
    let node: xconsole::PermissionNode =
        serde_json::from_value(json!({"command_id": "10", "parent_id": "0"})).unwrap();

    let matrix = resolver.select_node(&node).await.unwrap();
    assert_eq!(matrix.columns, vec!["11", "12"]);
    assert_eq!(matrix.groups.len(), 2);

    let row = resolver.toggle("1", "12", OperationFlag::Invoke).await.unwrap();
    assert_eq!(row.invoke, 1);

    let err = resolver.toggle("2", "11", OperationFlag::Approve).await.unwrap_err();
    assert!(matches!(err, ScreenError::Backend(_)));
    assert_eq!(err.to_string(), "Approval locked");
    assert_eq!(resolver.matrix().cell("2", "11").map(|r| r.approve), Some(0));
    assert_eq!(resolver.matrix().cell("1", "12").map(|r| r.invoke), Some(1));

    let writes = transport.calls_for("WF_SAVE_OP");
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].learn_api.as_deref(), Some("/role/command"));
    let body: Value = serde_json::to_value(&writes[1].input).unwrap();
    assert_eq!(body, json!({"RoleId": "2", "CommandId": "11", "Invoke": 1, "Approve": 1}));
}

#[test]
fn test_inline_columns_from_view_payload() {
    let view: ViewSchema = serde_json::from_value(json!({
        "columns": "[{\"code\": \"user.name\", \"title\": \"Name\"}]"
    }))
    .unwrap();
    let data = json!([{"user": {"name": "Ana"}}, {}]);
    let table = TableQueryEngine::inline(view.columns(), &data, TableConfig::default());

    assert_eq!(
        table.visible_rows(),
        vec![vec!["Ana".to_string()], vec!["N/A".to_string()]]
    );
}

fn page_rows(size: u64) -> Value {
    let rows: Vec<Value> = (0..size).map(|i| json!({"n": i})).collect();
    json!({"rows": rows, "total": 500})
}

#[tokio::test]
async fn test_page_size_race_keeps_latest_request() {
    let graph = parse_workflow_graph(Some(
        r#"{"page": [{"workflowId": "WF_PAGE", "input": {
            "pageIndex": {"key": "pageIndex"},
            "pageSize": {"key": "pageSize"}
        }}]}"#,
    ));
    let transport = Arc::new(GatedTransport::new("pageSize", |req| {
        let size = req.field("pageSize").and_then(Value::as_u64).unwrap_or(0);
        ok(page_rows(size))
    }));
    let table = TableQueryEngine::remote(
        vec![ColumnSchema::new("n", "N")],
        graph,
        WorkflowOrchestrator::new(transport.clone()),
        TableConfig::default(),
    );

    let first = table.refresh();
    let second = table.set_page_size(25);
    let third = table.set_page_size(50);
    let control = async {
        transport.wait_started(3).await;
        transport.open("50");
        while table.current().rows.len() != 50 {
            tokio::task::yield_now().await;
        }
        // Older responses arrive last and must be dropped.
        transport.open("25");
        transport.open("10");
    };
    let (r10, r25, r50, _) = tokio::join!(first, second, third, control);

    assert_eq!(r10.unwrap_err(), ScreenError::Stale);
    assert_eq!(r25.unwrap_err(), ScreenError::Stale);
    assert_eq!(r50.unwrap().rows.len(), 50);
    assert_eq!(table.current().rows.len(), 50);
    assert_eq!(table.page().page_size, 50);
    assert_eq!(table.page().page_index, 1);
    assert_eq!(table.total(), Some(500));
}

#[tokio::test]
async fn test_remote_table_writes_snake_case_keys() {
    let graph = parse_workflow_graph(Some(
        r#"{"page": [{"workflowId": "WF_PAGE", "input": {
            "page_index": {"key": "page_index"},
            "page_size": {"key": "page_size"}
        }}]}"#,
    ));
    let transport = Arc::new(ReplayTransport::new().with_response("WF_PAGE", ok(page_rows(5))));
    let config = TableConfig {
        pagination_style: PaginationStyle::Snake,
        ..TableConfig::default()
    };
    let table = TableQueryEngine::remote(
        vec![ColumnSchema::new("n", "N")],
        graph,
        WorkflowOrchestrator::new(transport.clone()),
        config,
    );

    let page = table.request(&json!({"pageIndex": 3, "pageSize": 5})).await.unwrap();
    assert_eq!(page.rows.len(), 5);
    let calls = transport.calls_for("WF_PAGE");
    assert_eq!(calls[0].field("page_index"), Some(&json!(3)));
    assert_eq!(calls[0].field("page_size"), Some(&json!(5)));

    table.set_filter("n", "4");
    assert_eq!(table.visible_rows(), vec![vec!["4".to_string()]]);
    assert_eq!(transport.call_count(), 1);
}
