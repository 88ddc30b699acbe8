//! Field and column type dispatch.
//!
//! Every `inputtype` tag maps to a [`FieldKind`] with its own display,
//! coercion and validation rules. Unknown tags are rendered raw.

pub mod coercion;
pub mod dispatch;
pub mod kind;

pub use coercion::{to_display_string, CoercionError};
pub use dispatch::{dispatch, dispatch_field, FieldView, ValidationIssue, ValidationResult};
pub use kind::FieldKind;
