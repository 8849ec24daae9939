// Column schema: semantic types inferred once at load time

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Semantic type of a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Temporal,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Categorical => "categorical",
            ColumnType::Temporal => "temporal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Ordered column names with their semantic types
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Schema {
    pub columns: Vec<ColumnSchema>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    /// Look up a column by name (case-insensitive, like header matching elsewhere)
    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.get(name).map(|c| c.column_type)
    }

    pub fn names_of(&self, column_type: ColumnType) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.column_type == column_type)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn numeric(&self) -> Vec<String> {
        self.names_of(ColumnType::Numeric)
    }

    pub fn categorical(&self) -> Vec<String> {
        self.names_of(ColumnType::Categorical)
    }

    pub fn temporal(&self) -> Vec<String> {
        self.names_of(ColumnType::Temporal)
    }
}

/// Columns forced to a type regardless of what their cells look like.
///
/// Integer-coded factors (`season`, `weathersit`, ...) would otherwise be
/// inferred as numeric.
#[derive(Debug, Clone, Default)]
pub struct SchemaOverrides {
    categorical: HashSet<String>,
}

impl SchemaOverrides {
    pub fn categorical<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            categorical: names
                .into_iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn forces_categorical(&self, name: &str) -> bool {
        self.categorical.contains(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.categorical.iter()
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a cell as a calendar date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Cell texts read as null, compared case-insensitively
const MISSING_TOKENS: &[&str] = &["na", "n/a", "#n/a", "nan", "-nan", "null", "none", "<na>"];

/// Empty cells and the usual NA spellings
pub fn is_missing(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || MISSING_TOKENS.iter().any(|t| value.eq_ignore_ascii_case(t))
}

/// Parse a cell as a number. Missing and non-finite cells are nulls.
pub fn parse_number(value: &str) -> Option<f64> {
    if is_missing(value) {
        return None;
    }
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Infer the semantic type of a column from its raw cells.
/// Missing cells are ignored; an all-missing column is categorical.
pub fn infer_column_type<'a, I>(cells: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut all_numeric = true;
    let mut all_temporal = true;

    for cell in cells {
        if is_missing(cell) {
            continue;
        }
        seen = true;
        // `inf` still counts as numeric; parse_number later reads it as null
        if all_numeric && cell.trim().parse::<f64>().is_err() {
            all_numeric = false;
        }
        if all_temporal && parse_date(cell).is_none() {
            all_temporal = false;
        }
        if !all_numeric && !all_temporal {
            break;
        }
    }

    if !seen {
        ColumnType::Categorical
    } else if all_numeric {
        ColumnType::Numeric
    } else if all_temporal {
        ColumnType::Temporal
    } else {
        ColumnType::Categorical
    }
}
