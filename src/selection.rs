// User selections: which columns, which chart, which reduction

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_BIN_COUNT: usize = 30;
pub const MIN_BIN_COUNT: usize = 5;
pub const MAX_BIN_COUNT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
    Box,
    Scatter,
    Histogram,
    Heatmap,
    Pairplot,
    Line,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::Bar,
        ChartKind::Pie,
        ChartKind::Box,
        ChartKind::Scatter,
        ChartKind::Histogram,
        ChartKind::Heatmap,
        ChartKind::Pairplot,
        ChartKind::Line,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Box => "box",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Pairplot => "pairplot",
            ChartKind::Line => "line",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartKind::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown chart kind '{}'", s))
    }
}

/// Calendar bucket width for time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Day,
    Week,
    Month,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 3] = [TimeUnit::Day, TimeUnit::Week, TimeUnit::Month];

    pub fn name(&self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
        }
    }

    /// Adjective used in derived titles ("Monthly cnt")
    pub fn adjective(&self) -> &'static str {
        match self {
            TimeUnit::Day => "Daily",
            TimeUnit::Week => "Weekly",
            TimeUnit::Month => "Monthly",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeUnit::ALL
            .iter()
            .copied()
            .find(|u| u.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown time unit '{}' (expected day, week or month)", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Sum => "sum",
        }
    }
}

impl FromStr for Aggregation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            other => Err(anyhow::anyhow!("Unknown aggregation '{}' (expected mean or sum)", other)),
        }
    }
}

/// Clamp a requested histogram bin count into the supported range
pub fn clamp_bin_count(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_BIN_COUNT)
        .clamp(MIN_BIN_COUNT, MAX_BIN_COUNT)
}

/// One user selection. Rebuilt on every interaction; cheap to clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub kind: ChartKind,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    /// Value columns for heatmap, pairplot, multi-series bars and composition pies
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub time_unit: Option<TimeUnit>,
    #[serde(default)]
    pub bin_count: Option<usize>,
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub stacked: bool,
    #[serde(default)]
    pub horizontal: bool,
    #[serde(default)]
    pub donut: bool,
    /// Display names for category values ("1" -> "Jan")
    #[serde(default)]
    pub category_labels: BTreeMap<String, String>,
}

impl Selection {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            x: None,
            y: None,
            group: None,
            columns: Vec::new(),
            time_unit: None,
            bin_count: None,
            aggregation: None,
            title: None,
            stacked: false,
            horizontal: false,
            donut: false,
            category_labels: BTreeMap::new(),
        }
    }

    pub fn x(mut self, column: impl Into<String>) -> Self {
        self.x = Some(column.into());
        self
    }

    pub fn y(mut self, column: impl Into<String>) -> Self {
        self.y = Some(column.into());
        self
    }

    pub fn group(mut self, column: impl Into<String>) -> Self {
        self.group = Some(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = Some(unit);
        self
    }

    pub fn bins(mut self, count: usize) -> Self {
        self.bin_count = Some(count);
        self
    }

    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn stacked(mut self) -> Self {
        self.stacked = true;
        self
    }

    pub fn horizontal(mut self) -> Self {
        self.horizontal = true;
        self
    }

    pub fn donut(mut self) -> Self {
        self.donut = true;
        self
    }

    pub fn label(mut self, value: impl Into<String>, display: impl Into<String>) -> Self {
        self.category_labels.insert(value.into(), display.into());
        self
    }

    /// Bin count actually used for histograms
    pub fn effective_bin_count(&self) -> usize {
        clamp_bin_count(self.bin_count)
    }

    /// Display name of a category value
    pub fn display_category(&self, value: &str) -> String {
        self.category_labels
            .get(value)
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }
}
