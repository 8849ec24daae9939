use thiserror::Error;

use crate::schema::ColumnType;
use crate::selection::ChartKind;

/// A selection that cannot be turned into a chart for the given dataset.
///
/// This is the only failure the chart builder produces; hosts show it inline
/// in place of the chart.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidSelection {
    #[error("Column '{column}' is {found}, but {kind} charts need a {expected} column here")]
    InvalidColumnType {
        kind: ChartKind,
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },
    #[error("{kind} charts need at least {required} numeric columns, {found} selected")]
    InsufficientColumns {
        kind: ChartKind,
        required: usize,
        found: usize,
    },
    #[error("Column '{column}' not found")]
    UnknownColumn { column: String },
    #[error("{kind} charts need a column for '{role}'")]
    MissingColumn { kind: ChartKind, role: &'static str },
}

pub type SelectionResult<T> = std::result::Result<T, InvalidSelection>;
