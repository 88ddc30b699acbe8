//! Binds immutable step templates against an execution context.
//!
//! Every dispatch gets a fresh [`DispatchRequest`]; templates are never
//! rewritten in place, so repeated selections cannot alias each other.

use serde_json::{Map, Value};

use super::transport::DispatchRequest;
use crate::core::{ExecutionContext, RuntimeContext};
use crate::dsl::{RequestStep, Transform, ValueExpr};
use crate::error::ResolutionError;

/// Resolve one expression.
///
/// A context reference whose key is missing or null falls back to its
/// default; with no default the expression fails.
pub fn resolve_expr(
    field: &str,
    expr: &ValueExpr,
    ctx: &ExecutionContext,
    runtime: &RuntimeContext,
) -> Result<Value, ResolutionError> {
    match expr {
        ValueExpr::Literal(v) => Ok(v.clone()),
        ValueExpr::ContextRef { key, default }
        | ValueExpr::Transform(Transform::FromContext { key, default }) => {
            lookup(field, key, default.as_ref(), ctx)
        }
        ValueExpr::Transform(Transform::Uuid) => Ok(Value::String(runtime.id_generator.next_id())),
        ValueExpr::Transform(Transform::Now) => {
            Ok(Value::String(runtime.time_provider.now_rfc3339()))
        }
        ValueExpr::Transform(Transform::Timestamp) => {
            Ok(Value::from(runtime.time_provider.now_millis()))
        }
        ValueExpr::Transform(Transform::Today) => Ok(Value::String(runtime.time_provider.today())),
        ValueExpr::Transform(Transform::Unknown(name)) => Err(ResolutionError::UnknownTransform {
            field: field.to_string(),
            name: name.clone(),
        }),
        ValueExpr::Script(_) => Err(ResolutionError::UnsupportedScript {
            field: field.to_string(),
        }),
    }
}

fn lookup(
    field: &str,
    key: &str,
    default: Option<&Value>,
    ctx: &ExecutionContext,
) -> Result<Value, ResolutionError> {
    match ctx.get(key) {
        Some(v) if !v.is_null() => Ok(v.clone()),
        _ => default.cloned().ok_or_else(|| ResolutionError::MissingKey {
            field: field.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Produce the request for `step`. The first unresolvable input aborts the
/// binding; nothing is sent for such a step.
pub fn instantiate(
    step: &RequestStep,
    ctx: &ExecutionContext,
    runtime: &RuntimeContext,
) -> Result<DispatchRequest, ResolutionError> {
    let mut input = Map::new();
    for (field, expr) in step.input_exprs() {
        let value = resolve_expr(field, &expr, ctx, runtime)?;
        input.insert(field.clone(), value);
    }
    Ok(DispatchRequest {
        workflow_id: step.workflow_id.clone(),
        learn_api: step.learn_api.clone(),
        use_microservice: step.use_microservice.unwrap_or(false),
        input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FakeIdGenerator, FakeTimeProvider};
    use serde_json::json;
    use std::sync::Arc;

    fn runtime() -> RuntimeContext {
        RuntimeContext::new()
            .with_time_provider(Arc::new(FakeTimeProvider::new(1_700_000_000)))
            .with_id_generator(Arc::new(FakeIdGenerator::new("id")))
    }

    #[test]
    fn test_instantiate_all_variants() {
        let step: RequestStep = serde_json::from_value(json!({
            "workflowId": "WF_SAVE",
            "learnApi": "/api/save",
            "useMicroservice": true,
            "input": {
                "Literal": 5,
                "Menu": {"key": "selectedMenuId"},
                "Page": {"key": "pageIndex", "default": 1},
                "Trace": {"$fn": "uuid"},
                "At": {"$fn": "now"},
                "Ms": {"$fn": "timestamp"},
                "Day": {"$fn": "today"},
                "Nested": {"$fn": "fromContext", "key": "menu.name"}
            }
        }))
        .unwrap();
        let ctx = ExecutionContext::new()
            .with("selectedMenuId", "10")
            .with("menu", json!({"name": "Users"}));
        let req = instantiate(&step, &ctx, &runtime()).unwrap();
        assert_eq!(req.workflow_id, "WF_SAVE");
        assert!(req.use_microservice);
        assert_eq!(req.learn_api.as_deref(), Some("/api/save"));
        assert_eq!(req.field("Literal"), Some(&json!(5)));
        assert_eq!(req.field("Menu"), Some(&json!("10")));
        assert_eq!(req.field("Page"), Some(&json!(1)));
        assert_eq!(req.field("Trace"), Some(&json!("id-0")));
        assert_eq!(req.field("At"), Some(&json!("2023-11-14T22:13:20.000Z")));
        assert_eq!(req.field("Ms"), Some(&json!(1_700_000_000_000i64)));
        assert_eq!(req.field("Day"), Some(&json!("2023-11-14")));
        assert_eq!(req.field("Nested"), Some(&json!("Users")));
    }

    #[test]
    fn test_missing_key_without_default() {
        let step = RequestStep::new("WF").with_input("MenuId", ValueExpr::key("selectedMenuId"));
        let err = instantiate(&step, &ExecutionContext::new(), &runtime()).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::MissingKey {
                field: "MenuId".into(),
                key: "selectedMenuId".into()
            }
        );
    }

    #[test]
    fn test_null_value_uses_default() {
        let step = RequestStep::new("WF").with_input("Size", ValueExpr::key_or("pageSize", 10));
        let ctx = ExecutionContext::new().with("pageSize", Value::Null);
        let req = instantiate(&step, &ctx, &runtime()).unwrap();
        assert_eq!(req.field("Size"), Some(&json!(10)));
    }

    #[test]
    fn test_script_is_never_evaluated() {
        let step = RequestStep::new("WF").with_input(
            "Computed",
            ValueExpr::from_value(json!("function (ctx) { return ctx.a + 1 }")),
        );
        let err = instantiate(&step, &ExecutionContext::new().with("a", 1), &runtime()).unwrap_err();
        assert!(matches!(err, ResolutionError::UnsupportedScript { .. }));
    }

    #[test]
    fn test_unknown_transform() {
        let step = RequestStep::new("WF").with_input("X", ValueExpr::from_value(json!({"$fn": "eval"})));
        let err = instantiate(&step, &ExecutionContext::new(), &runtime()).unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownTransform { name, .. } if name == "eval"));
    }

    #[test]
    fn test_template_is_not_mutated() {
        let step = RequestStep::new("WF").with_input("Menu", ValueExpr::key("selectedMenuId"));
        let before = step.clone();
        let a = instantiate(&step, &ExecutionContext::new().with("selectedMenuId", "1"), &runtime()).unwrap();
        let b = instantiate(&step, &ExecutionContext::new().with("selectedMenuId", "2"), &runtime()).unwrap();
        assert_eq!(step, before);
        assert_eq!(a.field("Menu"), Some(&json!("1")));
        assert_eq!(b.field("Menu"), Some(&json!("2")));
    }
}
