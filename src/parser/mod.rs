// Selection language parser module

pub mod ast;
pub mod command;
pub mod lexer;
pub mod selection;

// Public API re-exports
pub use ast::{Command, SelectionExpr};
pub use command::parse_command;
pub use selection::parse_selection;
