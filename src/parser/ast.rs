// Syntax tree for the selection language

use crate::selection::Selection;

/// `kind(arg, arg, ...)` before interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionExpr {
    pub kind: String,
    pub args: Vec<Arg>,
}

/// `key: value`, or a bare flag such as `stacked`
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub key: String,
    pub value: ArgValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Ident(String),
    Text(String),
    Number(f64),
    /// `[a, b, c]`
    List(Vec<String>),
    /// `{1: "Jan", 2: "Feb"}`
    Map(Vec<(String, String)>),
    Flag,
}

impl ArgValue {
    pub fn describe(&self) -> &'static str {
        match self {
            ArgValue::Ident(_) => "a column name",
            ArgValue::Text(_) => "a string",
            ArgValue::Number(_) => "a number",
            ArgValue::List(_) => "a list",
            ArgValue::Map(_) => "a label map",
            ArgValue::Flag => "a flag",
        }
    }
}

/// One line of the interactive protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `panel = kind(...)`
    Select { panel: String, selection: Selection },
    /// `year = 2011` or `year = all`
    Year(Option<i32>),
}
