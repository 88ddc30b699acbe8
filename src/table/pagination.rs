//! Page request normalisation.
//!
//! Two key conventions exist on the wire, `pageIndex/pageSize` and
//! `page_index/page_size`. Both are accepted on read; exactly one, the
//! configured [`PaginationStyle`], is written.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    /// `pageIndex` / `pageSize`
    #[default]
    Camel,
    /// `page_index` / `page_size`
    Snake,
}

impl PaginationStyle {
    /// `(index key, size key)` written by this style.
    pub fn keys(self) -> (&'static str, &'static str) {
        match self {
            PaginationStyle::Camel => ("pageIndex", "pageSize"),
            PaginationStyle::Snake => ("page_index", "page_size"),
        }
    }

    fn other(self) -> Self {
        match self {
            PaginationStyle::Camel => PaginationStyle::Snake,
            PaginationStyle::Snake => PaginationStyle::Camel,
        }
    }
}

/// A 1-based page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page_index: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index: page_index.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn first(page_size: usize) -> Self {
        Self::new(1, page_size)
    }

    /// Read either convention from an object. `pageIndex/pageSize` wins when
    /// both are present; missing or unreadable members take the defaults.
    pub fn normalize(value: &Value, default_size: usize) -> Self {
        let read = |style: PaginationStyle| {
            let (index_key, size_key) = style.keys();
            (read_usize(value.get(index_key)), read_usize(value.get(size_key)))
        };
        let (camel_index, camel_size) = read(PaginationStyle::Camel);
        let (snake_index, snake_size) = read(PaginationStyle::Snake);
        Self::new(
            camel_index.or(snake_index).unwrap_or(1),
            camel_size.or(snake_size).unwrap_or(default_size),
        )
    }

    /// Rows preceding this page. Saturates for indexes past addressable memory.
    pub fn offset(&self) -> usize {
        (self.page_index - 1).saturating_mul(self.page_size)
    }

    pub fn to_value(&self, style: PaginationStyle) -> Value {
        let (index_key, size_key) = style.keys();
        let mut map = Map::new();
        map.insert(index_key.to_string(), Value::from(self.page_index));
        map.insert(size_key.to_string(), Value::from(self.page_size));
        Value::Object(map)
    }

    /// Bind the page into a run context under one convention, removing any
    /// keys of the other.
    pub fn write_into(&self, ctx: &mut ExecutionContext, style: PaginationStyle) {
        let (index_key, size_key) = style.keys();
        ctx.set(index_key, self.page_index);
        ctx.set(size_key, self.page_size);
        let (stale_index, stale_size) = style.other().keys();
        ctx.remove(stale_index);
        ctx.remove(stale_size);
    }
}

fn read_usize(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(n) => n.as_u64().map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_both_conventions() {
        assert_eq!(PageRequest::normalize(&json!({"pageIndex": 2, "pageSize": 25}), 10), PageRequest::new(2, 25));
        assert_eq!(PageRequest::normalize(&json!({"page_index": "3", "page_size": 50}), 10), PageRequest::new(3, 50));
        assert_eq!(PageRequest::normalize(&json!({}), 10), PageRequest::first(10));
        assert_eq!(PageRequest::normalize(&json!({"pageIndex": 0}), 10).page_index, 1);
    }

    #[test]
    fn test_writes_one_convention() {
        let page = PageRequest::new(2, 25);
        assert_eq!(page.to_value(PaginationStyle::Snake), json!({"page_index": 2, "page_size": 25}));

        let mut ctx = ExecutionContext::new().with("page_index", 9).with("pageSize", 1);
        page.write_into(&mut ctx, PaginationStyle::Camel);
        assert_eq!(ctx.get("pageIndex"), Some(&json!(2)));
        assert_eq!(ctx.get("pageSize"), Some(&json!(25)));
        assert!(!ctx.has("page_index"));
        assert_eq!(page.offset(), 25);
    }

    #[test]
    fn test_huge_page_index_saturates() {
        let page = PageRequest::normalize(&json!({"pageIndex": u64::MAX, "pageSize": 10}), 10);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.offset(), usize::MAX);
    }
}
