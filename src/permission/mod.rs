//! Permission screen: menu tree and role/command operation matrix.

pub mod matrix;
pub mod resolver;
pub mod tree;

pub use matrix::{GroupedOperation, OperationFlag, OperationMatrix, OperationRow};
pub use resolver::{
    PermissionResolver, LOAD_MENU_GROUP, LOAD_OPERATION_GROUP, SAVE_OPERATION_GROUP,
    SELECTED_MENU_KEY, SELECTED_SERVICE_KEY,
};
pub use tree::{build_tree, decode_nodes, CommandType, PermissionNode, ROOT_PARENT_ID};
