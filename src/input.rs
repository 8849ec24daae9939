// Input collection capability: prompts answered by a script or a line reader

use anyhow::{anyhow, bail, Context, Result};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    SelectOne,
    SelectMany,
    Slider,
    Radio,
}

/// One question put to the user
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub label: String,
    pub kind: InputKind,
    /// Choices for select and radio prompts
    pub options: Vec<String>,
    /// Inclusive bounds for sliders
    pub range: Option<(f64, f64)>,
    /// Used when the answer is blank
    pub default: Option<String>,
}

impl Prompt {
    pub fn select_one<S: Into<String>>(label: impl Into<String>, options: impl IntoIterator<Item = S>) -> Self {
        Self::choices(label, InputKind::SelectOne, options)
    }

    pub fn select_many<S: Into<String>>(label: impl Into<String>, options: impl IntoIterator<Item = S>) -> Self {
        Self::choices(label, InputKind::SelectMany, options)
    }

    pub fn radio<S: Into<String>>(label: impl Into<String>, options: impl IntoIterator<Item = S>) -> Self {
        Self::choices(label, InputKind::Radio, options)
    }

    pub fn slider(label: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            label: label.into(),
            kind: InputKind::Slider,
            options: Vec::new(),
            range: Some((min, max)),
            default: Some(default.to_string()),
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn choices<S: Into<String>>(label: impl Into<String>, kind: InputKind, options: impl IntoIterator<Item = S>) -> Self {
        Self {
            label: label.into(),
            kind,
            options: options.into_iter().map(Into::into).collect(),
            range: None,
            default: None,
        }
    }

    /// Prompt line shown by interactive sources
    pub fn render(&self) -> String {
        let mut text = self.label.clone();
        match self.kind {
            InputKind::Slider => {
                if let Some((min, max)) = self.range {
                    text.push_str(&format!(" [{}-{}]", min, max));
                }
            }
            InputKind::SelectMany => {
                text.push_str(&format!(" (comma separated: {})", self.options.join(", ")));
            }
            InputKind::SelectOne | InputKind::Radio => {
                text.push_str(&format!(" ({})", self.options.join(" / ")));
            }
        }
        if let Some(default) = &self.default {
            text.push_str(&format!(" default {}", default));
        }
        text.push_str(": ");
        text
    }

    /// Check a raw answer against the prompt
    pub fn parse_answer(&self, raw: &str) -> Result<InputValue> {
        let raw = raw.trim();
        let raw = if raw.is_empty() {
            self.default
                .as_deref()
                .ok_or_else(|| anyhow!("'{}' needs an answer", self.label))?
        } else {
            raw
        };

        match self.kind {
            InputKind::SelectOne | InputKind::Radio => self.match_option(raw).map(InputValue::One),
            InputKind::SelectMany => {
                let picked = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| self.match_option(s))
                    .collect::<Result<Vec<_>>>()?;
                Ok(InputValue::Many(picked))
            }
            InputKind::Slider => {
                let value: f64 = raw
                    .parse()
                    .with_context(|| format!("'{}' is not a number", raw))?;
                if let Some((min, max)) = self.range {
                    if value < min || value > max {
                        bail!("{} is outside {}-{}", value, min, max);
                    }
                }
                Ok(InputValue::Number(value))
            }
        }
    }

    /// Options match by name (case-insensitive) or by 1-based position
    fn match_option(&self, answer: &str) -> Result<String> {
        if let Some(found) = self.options.iter().find(|o| o.eq_ignore_ascii_case(answer)) {
            return Ok(found.clone());
        }
        if let Ok(idx) = answer.parse::<usize>() {
            if idx >= 1 && idx <= self.options.len() {
                return Ok(self.options[idx - 1].clone());
            }
        }
        bail!(
            "'{}' is not one of: {}",
            answer,
            self.options.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    One(String),
    Many(Vec<String>),
    Number(f64),
}

impl InputValue {
    pub fn into_one(self) -> Result<String> {
        match self {
            InputValue::One(s) => Ok(s),
            other => Err(anyhow!("Expected a single choice, got {:?}", other)),
        }
    }

    pub fn into_many(self) -> Result<Vec<String>> {
        match self {
            InputValue::Many(v) => Ok(v),
            InputValue::One(s) => Ok(vec![s]),
            other => Err(anyhow!("Expected a list of choices, got {:?}", other)),
        }
    }

    pub fn into_number(self) -> Result<f64> {
        match self {
            InputValue::Number(n) => Ok(n),
            other => Err(anyhow!("Expected a number, got {:?}", other)),
        }
    }
}

/// Where answers to prompts come from
pub trait InputSource {
    fn collect(&mut self, prompt: &Prompt) -> Result<InputValue>;
}

/// Ask `source` one question; a blank answer falls back to `default`
pub fn collect_input(
    source: &mut dyn InputSource,
    label: &str,
    options: &[String],
    kind: InputKind,
    default: Option<&str>,
) -> Result<InputValue> {
    let prompt = Prompt {
        label: label.to_string(),
        kind,
        options: options.to_vec(),
        range: None,
        default: default.map(str::to_string),
    };
    source.collect(&prompt)
}

/// Pre-recorded answers, consumed in order
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl InputSource for ScriptedInput {
    fn collect(&mut self, prompt: &Prompt) -> Result<InputValue> {
        let answer = self
            .answers
            .pop_front()
            .ok_or_else(|| anyhow!("No scripted answer left for '{}'", prompt.label))?;
        debug!(label = %prompt.label, %answer, "scripted answer");
        prompt.parse_answer(&answer)
    }
}

/// Reads answers line by line, re-asking on invalid input
pub struct LineInput<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LineInput<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: BufRead, W: Write> InputSource for LineInput<R, W> {
    fn collect(&mut self, prompt: &Prompt) -> Result<InputValue> {
        loop {
            write!(self.writer, "{}", prompt.render()).context("Failed to write prompt")?;
            self.writer.flush().context("Failed to flush prompt")?;

            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .context("Failed to read answer")?;
            if read == 0 {
                bail!("Input ended before '{}' was answered", prompt.label);
            }

            match prompt.parse_answer(&line) {
                Ok(value) => return Ok(value),
                Err(e) => writeln!(self.writer, "{}", e).context("Failed to write error")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn columns() -> Vec<String> {
        vec!["temp".into(), "hum".into(), "cnt".into()]
    }

    #[test]
    fn test_select_one_by_name_or_index() {
        let prompt = Prompt::select_one("X column", columns());
        assert_eq!(prompt.parse_answer("HUM").unwrap(), InputValue::One("hum".into()));
        assert_eq!(prompt.parse_answer("3").unwrap(), InputValue::One("cnt".into()));
        assert!(prompt.parse_answer("4").is_err());
        assert!(prompt.parse_answer("wind").is_err());
    }

    #[test]
    fn test_select_many() {
        let prompt = Prompt::select_many("Columns", columns());
        assert_eq!(
            prompt.parse_answer("temp, cnt").unwrap(),
            InputValue::Many(vec!["temp".into(), "cnt".into()])
        );
    }

    #[test]
    fn test_slider_bounds_and_default() {
        let prompt = Prompt::slider("Bins", 5.0, 100.0, 30.0);
        assert_eq!(prompt.parse_answer("").unwrap(), InputValue::Number(30.0));
        assert_eq!(prompt.parse_answer("64").unwrap(), InputValue::Number(64.0));
        assert!(prompt.parse_answer("101").is_err());
        assert!(prompt.parse_answer("lots").is_err());
    }

    #[test]
    fn test_blank_without_default() {
        let prompt = Prompt::radio("Chart", ["bar", "pie"]);
        assert!(prompt.parse_answer("  ").is_err());
        let prompt = prompt.with_default("bar");
        assert_eq!(prompt.parse_answer("").unwrap(), InputValue::One("bar".into()));
    }

    #[test]
    fn test_scripted_input() {
        let mut source = ScriptedInput::new(["scatter", "temp"]);
        let kind = collect_input(&mut source, "Chart", &["bar".into(), "scatter".into()], InputKind::Radio, None).unwrap();
        assert_eq!(kind.into_one().unwrap(), "scatter");
        let x = source.collect(&Prompt::select_one("X", columns())).unwrap();
        assert_eq!(x, InputValue::One("temp".into()));
        assert_eq!(source.remaining(), 0);
        assert!(source.collect(&Prompt::select_one("Y", columns())).is_err());
    }

    #[test]
    fn test_collect_input_default() {
        let mut source = ScriptedInput::new(["", "2"]);
        let hue = collect_input(&mut source, "Color by", &columns(), InputKind::SelectOne, Some("hum")).unwrap();
        assert_eq!(hue, InputValue::One("hum".into()));
        let many = collect_input(&mut source, "Columns", &columns(), InputKind::SelectMany, None).unwrap();
        assert_eq!(many, InputValue::Many(vec!["hum".into()]));
    }

    #[test]
    fn test_line_input_retries_invalid_answers() {
        let reader = Cursor::new("wind\ncnt\n");
        let mut output = Vec::new();
        {
            let mut source = LineInput::new(reader, &mut output);
            let value = source.collect(&Prompt::select_one("Y column", columns())).unwrap();
            assert_eq!(value, InputValue::One("cnt".into()));
        }
        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("Y column").count(), 2);
        assert!(transcript.contains("'wind' is not one of"));
    }

    #[test]
    fn test_line_input_eof() {
        let mut source = LineInput::new(Cursor::new(""), Vec::new());
        assert!(source.collect(&Prompt::select_one("X", columns())).is_err());
    }
}
