//! Paginated, filterable table data source.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use super::pagination::PageRequest;
use super::rows::{extract_rows, render_row};
use crate::config::TableConfig;
use crate::dsl::{ColumnSchema, WorkflowGraph};
use crate::engine::WorkflowOrchestrator;
use crate::error::ScreenError;

/// Where a table's rows come from.
pub enum TableSource {
    /// Rows already present in a parent view payload.
    Inline(Vec<Value>),
    /// Rows fetched by running `graph` for every page request.
    Remote {
        graph: WorkflowGraph,
        orchestrator: WorkflowOrchestrator,
    },
}

/// Rows of the current page as last accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage {
    pub page: PageRequest,
    pub rows: Vec<Value>,
    pub total: Option<usize>,
}

#[derive(Debug)]
struct TableState {
    page: PageRequest,
    rows: Vec<Value>,
    total: Option<usize>,
    filters: BTreeMap<String, String>,
}

pub struct TableQueryEngine {
    columns: Vec<ColumnSchema>,
    config: TableConfig,
    source: TableSource,
    state: Mutex<TableState>,
}

impl TableQueryEngine {
    pub fn new(columns: Vec<ColumnSchema>, source: TableSource, config: TableConfig) -> Self {
        let page = PageRequest::first(config.default_page_size);
        let engine = Self {
            columns,
            config,
            source,
            state: Mutex::new(TableState {
                page,
                rows: Vec::new(),
                total: None,
                filters: BTreeMap::new(),
            }),
        };
        if let TableSource::Inline(all) = &engine.source {
            let mut state = engine.state.lock();
            state.rows = slice(all, page);
            state.total = Some(all.len());
        }
        engine
    }

    /// Table over the rows carried by a parent payload value.
    pub fn inline(columns: Vec<ColumnSchema>, data: &Value, config: TableConfig) -> Self {
        let rows = extract_rows(data).rows;
        Self::new(columns, TableSource::Inline(rows), config)
    }

    pub fn remote(
        columns: Vec<ColumnSchema>,
        graph: WorkflowGraph,
        orchestrator: WorkflowOrchestrator,
        config: TableConfig,
    ) -> Self {
        Self::new(columns, TableSource::Remote { graph, orchestrator }, config)
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn page(&self) -> PageRequest {
        self.state.lock().page
    }

    pub fn total(&self) -> Option<usize> {
        self.state.lock().total
    }

    pub fn current(&self) -> TablePage {
        let state = self.state.lock();
        TablePage {
            page: state.page,
            rows: state.rows.clone(),
            total: state.total,
        }
    }

    pub async fn refresh(&self) -> Result<TablePage, ScreenError> {
        let page = self.page();
        self.load(page).await
    }

    pub async fn set_page(&self, page_index: usize) -> Result<TablePage, ScreenError> {
        let page = {
            let mut state = self.state.lock();
            state.page = PageRequest::new(page_index, state.page.page_size);
            state.page
        };
        self.load(page).await
    }

    /// Change the page size; always returns to page 1.
    pub async fn set_page_size(&self, page_size: usize) -> Result<TablePage, ScreenError> {
        if page_size == 0 {
            return Err(ScreenError::InvalidPageSize);
        }
        let page = {
            let mut state = self.state.lock();
            state.page = PageRequest::first(page_size);
            state.page
        };
        self.load(page).await
    }

    /// Apply a page request delivered by the caller in either key convention.
    pub async fn request(&self, raw: &Value) -> Result<TablePage, ScreenError> {
        let page = PageRequest::normalize(raw, self.config.default_page_size);
        self.state.lock().page = page;
        self.load(page).await
    }

    async fn load(&self, page: PageRequest) -> Result<TablePage, ScreenError> {
        match &self.source {
            TableSource::Inline(all) => {
                let mut state = self.state.lock();
                state.rows = slice(all, page);
                state.total = Some(all.len());
                Ok(TablePage {
                    page,
                    rows: state.rows.clone(),
                    total: state.total,
                })
            }
            TableSource::Remote { graph, orchestrator } => {
                let mut run = orchestrator.begin();
                page.write_into(run.context_mut(), self.config.pagination_style);
                let epoch = run.epoch();
                tracing::debug!(
                    epoch,
                    page_index = page.page_index,
                    page_size = page.page_size,
                    "fetching table page"
                );
                let outcome = run.run_graph(graph).await;
                if run.commit().is_none() {
                    tracing::debug!(epoch, "discarding superseded table page");
                    return Err(ScreenError::Stale);
                }
                if !outcome.is_success() {
                    return Err(outcome.failure());
                }
                let set = outcome.last_data().map(extract_rows).unwrap_or_default();

                let mut state = self.state.lock();
                if !orchestrator.is_current(epoch) {
                    return Err(ScreenError::Stale);
                }
                state.rows = set.rows;
                state.total = set.total;
                Ok(TablePage {
                    page,
                    rows: state.rows.clone(),
                    total: state.total,
                })
            }
        }
    }

    /// Set a column filter. An empty `text` clears it. Never fetches.
    pub fn set_filter(&self, column_code: &str, text: &str) {
        let mut state = self.state.lock();
        if text.trim().is_empty() {
            state.filters.remove(column_code);
        } else {
            state
                .filters
                .insert(column_code.to_string(), text.trim().to_lowercase());
        }
    }

    pub fn clear_filters(&self) {
        self.state.lock().filters.clear();
    }

    /// Rendered cells of the current page that pass every column filter.
    pub fn visible_rows(&self) -> Vec<Vec<String>> {
        let state = self.state.lock();
        let sentinel = &self.config.missing_sentinel;
        let filter_columns: Vec<(usize, &String)> = state
            .filters
            .iter()
            .filter_map(|(code, needle)| {
                self.columns
                    .iter()
                    .position(|c| &c.code == code)
                    .map(|i| (i, needle))
            })
            .collect();

        state
            .rows
            .iter()
            .map(|row| render_row(row, &self.columns, sentinel))
            .filter(|cells| {
                filter_columns
                    .iter()
                    .all(|(i, needle)| cells[*i].to_lowercase().contains(needle.as_str()))
            })
            .collect()
    }
}

fn slice(all: &[Value], page: PageRequest) -> Vec<Value> {
    all.iter()
        .skip(page.offset())
        .take(page.page_size)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Vec<ColumnSchema> {
        vec![ColumnSchema::new("user.name", "Name"), ColumnSchema::new("city", "City")]
    }

    fn data() -> Value {
        json!([
            {"user": {"name": "Ana"}, "city": "Lisbon"},
            {"user": {"name": "Bruno"}, "city": "Porto"},
            {"city": "Braga"},
            {"user": {"name": "Anabela"}},
        ])
    }

    #[tokio::test]
    async fn test_inline_paging() {
        let engine = TableQueryEngine::inline(columns(), &data(), TableConfig::default());
        assert_eq!(engine.visible_rows().len(), 4);
        assert_eq!(engine.total(), Some(4));

        let page = engine.set_page_size(3).await.unwrap();
        assert_eq!(page.rows.len(), 3);
        let page = engine.set_page(2).await.unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(engine.visible_rows(), vec![vec!["Anabela".to_string(), "N/A".to_string()]]);
    }

    #[tokio::test]
    async fn test_page_size_change_resets_page() {
        let engine = TableQueryEngine::inline(columns(), &data(), TableConfig::default());
        engine.set_page_size(1).await.unwrap();
        engine.set_page(3).await.unwrap();
        engine.set_page_size(2).await.unwrap();
        assert_eq!(engine.page(), PageRequest::new(1, 2));
        assert!(matches!(engine.set_page_size(0).await, Err(ScreenError::InvalidPageSize)));
    }

    #[test]
    fn test_filters_are_case_insensitive_substrings() {
        let engine = TableQueryEngine::inline(columns(), &data(), TableConfig::default());
        engine.set_filter("user.name", "ANA");
        let rows = engine.visible_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "Ana");
        assert_eq!(rows[1][0], "Anabela");

        engine.set_filter("city", "n/a");
        assert_eq!(engine.visible_rows().len(), 1);

        engine.set_filter("user.name", "");
        engine.clear_filters();
        assert_eq!(engine.visible_rows().len(), 4);
    }

    #[tokio::test]
    async fn test_request_accepts_snake_case() {
        let engine = TableQueryEngine::inline(columns(), &data(), TableConfig::default());
        let page = engine.request(&json!({"page_index": 2, "page_size": 2})).await.unwrap();
        assert_eq!(page.page, PageRequest::new(2, 2));
        assert_eq!(page.rows[0]["city"], "Braga");
    }

    #[tokio::test]
    async fn test_request_past_the_end_is_empty() {
        let engine = TableQueryEngine::inline(columns(), &data(), TableConfig::default());
        let page = engine
            .request(&json!({"pageIndex": u64::MAX, "pageSize": 10}))
            .await
            .unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, Some(4));
    }
}
