//! Table querying: inline or remote rows, pagination and client-side
//! column filters.

pub mod engine;
pub mod pagination;
pub mod rows;

pub use engine::{TablePage, TableQueryEngine, TableSource};
pub use pagination::{PageRequest, PaginationStyle};
pub use rows::{extract_rows, render_cell, render_row, RowSet};
