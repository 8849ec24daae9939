// Selection parser: kind(x: col, y: col, ...) -> Selection

use super::ast::{Arg, ArgValue, SelectionExpr};
use super::lexer::{identifier, number_literal, string_literal, word, ws};
use crate::selection::{Aggregation, ChartKind, Selection, TimeUnit};
use anyhow::{anyhow, bail, Context, Result};
use nom::{
    branch::alt,
    character::complete::char,
    combinator::{eof, map, opt},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

/// Column reference: bare identifier or quoted name
fn column_name(input: &str) -> IResult<&str, String> {
    alt((identifier, string_literal))(input)
}

fn list_value(input: &str) -> IResult<&str, ArgValue> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), ws(column_name)),
            ws(char(']')),
        ),
        ArgValue::List,
    )(input)
}

fn map_value(input: &str) -> IResult<&str, ArgValue> {
    map(
        delimited(
            ws(char('{')),
            separated_list0(
                ws(char(',')),
                separated_pair(ws(alt((string_literal, word))), char(':'), ws(string_literal)),
            ),
            ws(char('}')),
        ),
        ArgValue::Map,
    )(input)
}

fn arg_value(input: &str) -> IResult<&str, ArgValue> {
    alt((
        list_value,
        map_value,
        map(ws(string_literal), ArgValue::Text),
        map(ws(identifier), ArgValue::Ident),
        map(ws(number_literal), ArgValue::Number),
    ))(input)
}

/// `key: value` or a bare `flag`
fn arg(input: &str) -> IResult<&str, Arg> {
    map(
        pair(ws(identifier), opt(preceded(char(':'), arg_value))),
        |(key, value)| Arg {
            key,
            value: value.unwrap_or(ArgValue::Flag),
        },
    )(input)
}

/// Parse `kind(args)` into its syntax tree
/// Format: bar(x: season, y: cnt) or heatmap(columns: [temp, hum, cnt])
pub fn parse_selection_expr(input: &str) -> IResult<&str, SelectionExpr> {
    let (input, kind) = ws(identifier)(input)?;
    let (input, args) = opt(delimited(
        ws(char('(')),
        terminated(separated_list0(ws(char(',')), arg), opt(ws(char(',')))),
        ws(char(')')),
    ))(input)?;

    Ok((
        input,
        SelectionExpr {
            kind,
            args: args.unwrap_or_default(),
        },
    ))
}

/// Parse a complete selection, rejecting trailing input
pub fn parse_selection(input: &str) -> Result<Selection> {
    let (_, expr) = terminated(parse_selection_expr, ws(eof))(input).map_err(|e| match e {
        nom::Err::Error(err) | nom::Err::Failure(err) => {
            anyhow!("Invalid selection, could not parse from '{}'", err.input.trim())
        }
        nom::Err::Incomplete(_) => anyhow!("Incomplete selection '{}'", input.trim()),
    })?;
    interpret(expr)
}

/// Turn the syntax tree into a typed selection
pub fn interpret(expr: SelectionExpr) -> Result<Selection> {
    let kind: ChartKind = expr.kind.parse()?;
    let mut selection = Selection::new(kind);

    for Arg { key, value } in expr.args {
        let key = key.to_ascii_lowercase();
        match (key.as_str(), value) {
            ("x", v) => selection.x = Some(column(&key, v)?),
            // y: [a, b] is shorthand for a multi-series value list
            ("y", ArgValue::List(cols)) | ("columns" | "cols", ArgValue::List(cols)) => {
                selection.columns = cols
            }
            ("y", v) => selection.y = Some(column(&key, v)?),
            ("color" | "group" | "hue", v) => selection.group = Some(column(&key, v)?),
            ("unit" | "time_unit", v) => {
                let unit: TimeUnit = text(&key, v)?.parse()?;
                selection.time_unit = Some(unit);
            }
            ("bins", ArgValue::Number(n)) => {
                if n < 1.0 || n.fract() != 0.0 {
                    bail!("'bins' must be a positive whole number, got {}", n);
                }
                selection.bin_count = Some(n as usize);
            }
            ("agg" | "aggregation", v) => {
                let agg: Aggregation = text(&key, v)?.parse()?;
                selection.aggregation = Some(agg);
            }
            ("title", ArgValue::Text(t)) => selection.title = Some(t),
            ("labels", ArgValue::Map(pairs)) => selection.category_labels.extend(pairs),
            ("stacked", ArgValue::Flag) => selection.stacked = true,
            ("horizontal", ArgValue::Flag) => selection.horizontal = true,
            ("donut", ArgValue::Flag) => selection.donut = true,
            (
                "bins" | "title" | "labels" | "stacked" | "horizontal" | "donut" | "columns" | "cols",
                v,
            ) => bail!("'{}' does not accept {}", key, v.describe()),
            (other, _) => bail!("Unknown selection argument '{}'", other),
        }
    }

    Ok(selection)
}

fn column(key: &str, value: ArgValue) -> Result<String> {
    match value {
        ArgValue::Ident(s) | ArgValue::Text(s) => Ok(s),
        other => Err(anyhow!("'{}' expects a column name, got {}", key, other.describe())),
    }
}

fn text(key: &str, value: ArgValue) -> Result<String> {
    let result = match value {
        ArgValue::Ident(s) | ArgValue::Text(s) => Ok(s),
        other => Err(anyhow!("expected a name, got {}", other.describe())),
    };
    result.with_context(|| format!("Invalid value for '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bar() {
        let sel = parse_selection("bar(x: season, y: cnt)").unwrap();
        assert_eq!(sel.kind, ChartKind::Bar);
        assert_eq!(sel.x.as_deref(), Some("season"));
        assert_eq!(sel.y.as_deref(), Some("cnt"));
    }

    #[test]
    fn test_parse_with_whitespace() {
        let sel = parse_selection("  scatter ( x : temp , y: cnt , color: season )  ").unwrap();
        assert_eq!(sel.kind, ChartKind::Scatter);
        assert_eq!(sel.group.as_deref(), Some("season"));
    }

    #[test]
    fn test_parse_columns_and_flags() {
        let sel = parse_selection(
            r#"bar(x: mnth, y: [casual, registered], agg: sum, stacked, horizontal, labels: {1: "Jan", 12: "Dec"})"#,
        )
        .unwrap();
        assert_eq!(sel.columns, vec!["casual", "registered"]);
        assert!(sel.y.is_none());
        assert_eq!(sel.aggregation, Some(Aggregation::Sum));
        assert!(sel.stacked && sel.horizontal);
        assert_eq!(sel.display_category("12"), "Dec");
    }

    #[test]
    fn test_parse_histogram_bins_and_title() {
        let sel = parse_selection(r#"histogram(x: temp, bins: 12, title: "Temperature")"#).unwrap();
        assert_eq!(sel.bin_count, Some(12));
        assert_eq!(sel.title.as_deref(), Some("Temperature"));
    }

    #[test]
    fn test_parse_line_unit() {
        let sel = parse_selection("line(x: dteday, y: cnt, unit: month)").unwrap();
        assert_eq!(sel.time_unit, Some(TimeUnit::Month));
    }

    #[test]
    fn test_parse_quoted_column() {
        let sel = parse_selection(r#"heatmap(columns: ["feels like", temp])"#).unwrap();
        assert_eq!(sel.columns, vec!["feels like", "temp"]);
    }

    #[test]
    fn test_parse_kind_without_args() {
        let sel = parse_selection("pairplot").unwrap();
        assert_eq!(sel.kind, ChartKind::Pairplot);
        assert!(sel.columns.is_empty());
    }

    #[test]
    fn test_unknown_kind() {
        assert!(parse_selection("violin(x: a)").is_err());
    }

    #[test]
    fn test_unknown_argument() {
        let err = parse_selection("bar(x: a, size: 3)").unwrap_err();
        assert!(err.to_string().contains("size"));
    }

    #[test]
    fn test_wrong_value_shape() {
        assert!(parse_selection("histogram(x: temp, bins: many)").is_err());
        assert!(parse_selection("histogram(x: temp, bins: 2.5)").is_err());
        assert!(parse_selection("bar(x: [a, b])").is_err());
    }

    #[test]
    fn test_trailing_input_rejected() {
        let err = parse_selection("bar(x: season, y: cnt) extra").unwrap_err();
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_unclosed_paren() {
        assert!(parse_selection("bar(x: season, y: cnt").is_err());
    }
}
