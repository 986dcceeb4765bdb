pub mod ast;
pub mod dump;
pub mod scope_tree;
pub mod tokens;
