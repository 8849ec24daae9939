// Interactive command parser: `panel = selection` and `year = 2011`

use super::ast::Command;
use super::lexer::{identifier, word, ws};
use super::selection::{interpret, parse_selection_expr};
use anyhow::{anyhow, Context, Result};
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::char,
    combinator::{eof, map},
    sequence::{preceded, separated_pair, terminated},
    IResult,
};

#[derive(Debug)]
enum RawCommand {
    Year(String),
    Select(String, super::ast::SelectionExpr),
}

fn year_command(input: &str) -> IResult<&str, RawCommand> {
    map(
        preceded(
            terminated(ws(tag_no_case("year")), ws(char('='))),
            ws(word),
        ),
        RawCommand::Year,
    )(input)
}

fn select_command(input: &str) -> IResult<&str, RawCommand> {
    map(
        separated_pair(ws(identifier), char('='), parse_selection_expr),
        |(panel, expr)| RawCommand::Select(panel, expr),
    )(input)
}

/// Parse one line of the interactive protocol
pub fn parse_command(input: &str) -> Result<Command> {
    let (_, raw) = terminated(alt((year_command, select_command)), ws(eof))(input).map_err(
        |e| match e {
            nom::Err::Error(err) | nom::Err::Failure(err) => {
                anyhow!("Invalid command, could not parse from '{}'", err.input.trim())
            }
            nom::Err::Incomplete(_) => anyhow!("Incomplete command '{}'", input.trim()),
        },
    )?;

    match raw {
        RawCommand::Year(value) if value.eq_ignore_ascii_case("all") => Ok(Command::Year(None)),
        RawCommand::Year(value) => {
            let year = value
                .parse::<i32>()
                .with_context(|| format!("Invalid year '{}'", value))?;
            Ok(Command::Year(Some(year)))
        }
        RawCommand::Select(panel, expr) => Ok(Command::Select {
            panel,
            selection: interpret(expr).context("Invalid selection")?,
        }),
    }
}
