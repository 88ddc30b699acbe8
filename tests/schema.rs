use serde_json::json;

use xconsole::dsl::ConfigShape;
use xconsole::{
    dispatch_field, ConsoleConfig, FieldKind, PaginationStyle, SchemaResolver, SourceFormat,
    ViewSchema,
};

fn view() -> ViewSchema {
    serde_json::from_value(json!({
        "fields": [
            {"code": "name", "inputtype": "text", "label": "Name", "required": "1",
             "config": "{\"maxLength\": 8}"},
            {"code": "qty", "inputtype": "numeric", "config": "{\"min\": 1, \"max\": 99}"},
            {"code": "state", "inputtype": "status", "config": "not json at all",
             "options": [{"value": "A", "label": "Active"}]},
            {"code": "widget", "inputtype": "sparkline", "required": true}
        ],
        "columns": "[{\"code\": \"name\", \"title\": \"Name\"}, {\"code\": \"qty\", \"title\": \"Qty\", \"inputtype\": \"numeric\"}]",
        "previewinfo": "[\"name\", \"owner.email\"]",
        "txFo": "{\"load\": [{\"workflowId\": \"WF_LOAD\", \"input\": {\"Id\": {\"key\": \"id\"}}}]}"
    }))
    .unwrap()
}

#[test]
fn test_view_payload_resolves_lazily() {
    let view = view();
    assert!(!view.fields[0].config.is_parsed());
    assert_eq!(view.columns().len(), 2);
    assert_eq!(view.preview_paths(), vec!["name", "owner.email"]);

    let graph = view.workflow();
    assert_eq!(graph.names().collect::<Vec<_>>(), vec!["load"]);
    assert_eq!(graph.get("load").map(|g| g.steps[0].workflow_id.as_str()), Some("WF_LOAD"));
}

#[test]
fn test_fields_dispatch_by_type() {
    let view = view();

    let name = dispatch_field(view.field("name").unwrap(), &json!("Ana"));
    assert_eq!(name.kind, FieldKind::Text);
    assert!(name.required);
    assert!(!name.validate(&json!("Anastasia")).is_valid());

    let qty = dispatch_field(view.field("qty").unwrap(), &json!(3));
    assert!(qty.validate(&json!("12")).is_valid());
    assert!(!qty.validate(&json!(100)).is_valid());

    let state = dispatch_field(view.field("state").unwrap(), &json!("A"));
    assert_eq!(state.display_value, "Active");
    assert!(view.field("state").unwrap().config.diagnostic().is_some());

    let widget = dispatch_field(view.field("widget").unwrap(), &json!([1, 2, 3]));
    assert_eq!(widget.kind, FieldKind::Unknown("sparkline".into()));
    assert_eq!(widget.display_value, "[1,2,3]");
    assert!(!widget.required);
}

#[test]
fn test_malformed_config_yields_default_shape() {
    for raw in ["", "{", "[1,", "null", "\"text\"", "42", "{\"a\": }"] {
        let object = SchemaResolver::resolve(Some(raw), ConfigShape::Object);
        assert_eq!(object.value, json!({}), "input {:?}", raw);
        let array = SchemaResolver::resolve(Some(raw), ConfigShape::Array);
        assert_eq!(array.value, json!([]), "input {:?}", raw);
    }
    assert_eq!(
        SchemaResolver::resolve(Some("{\"a\": 1}"), ConfigShape::Object),
        SchemaResolver::resolve(Some("{\"a\": 1}"), ConfigShape::Object)
    );
}

#[test]
fn test_console_config_formats() {
    let toml = r#"
[orchestrator]
auth_error_keys = ["401", "AUTH_EXPIRED"]
parallel_groups = false

[table]
default_page_size = 25
pagination_style = "snake"
"#;
    let config = ConsoleConfig::from_str(toml, SourceFormat::Toml).unwrap();
    assert_eq!(config.table.default_page_size, 25);
    assert_eq!(config.table.pagination_style, PaginationStyle::Snake);
    assert!(!config.orchestrator.parallel_groups);
    assert!(config.orchestrator.halt_on_auth);
    assert!(config.orchestrator.validator().is_auth_key("AUTH_EXPIRED"));

    let yaml = "table:\n  missing_sentinel: \"-\"\n";
    let config = ConsoleConfig::from_str(yaml, SourceFormat::Yaml).unwrap();
    assert_eq!(config.table.missing_sentinel, "-");
    assert_eq!(config.table.default_page_size, 10);

    assert!(ConsoleConfig::from_str("table:\n  default_page_size: 0\n", SourceFormat::Yaml).is_err());
}
