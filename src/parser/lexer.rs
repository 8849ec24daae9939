// Lexical building blocks for the selection language

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, recognize},
    multi::{many0_count, many1_count},
    number::complete::double,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Column or keyword name: letter or underscore, then letters, digits, `_` or `.`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_"), tag(".")))),
        )),
        String::from,
    )(input)
}

/// Bare token that may start with a digit (`1`, `2011`, `q1`)
pub fn word(input: &str) -> IResult<&str, String> {
    map(
        recognize(many1_count(alt((alphanumeric1, tag("_"), tag("."), tag("-"))))),
        String::from,
    )(input)
}

pub fn number_literal(input: &str) -> IResult<&str, f64> {
    double(input)
}

/// Double-quoted string without escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        String::from,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("temp, hum"), Ok((", hum", "temp".to_string())));
        assert_eq!(identifier("_col2)"), Ok((")", "_col2".to_string())));
        assert_eq!(identifier("a.b"), Ok(("", "a.b".to_string())));
        assert!(identifier("2011").is_err());
    }

    #[test]
    fn test_word_accepts_digits() {
        assert_eq!(word("12: x"), Ok((": x", "12".to_string())));
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("30)"), Ok((")", 30.0)));
        assert_eq!(number_literal("-1.5"), Ok(("", -1.5)));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            string_literal("\"Bike Rentals by Season\" rest"),
            Ok((" rest", "Bike Rentals by Season".to_string()))
        );
        assert_eq!(string_literal("\"\""), Ok(("", String::new())));
        assert!(string_literal("\"unterminated").is_err());
    }

    #[test]
    fn test_ws() {
        let mut parser = ws(identifier);
        assert_eq!(parser("  cnt  )"), Ok((")", "cnt".to_string())));
    }
}
