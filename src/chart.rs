// Renderer-agnostic chart specification produced by the builder

use chrono::NaiveDate;
use serde::Serialize;

use crate::schema::ColumnType;
use crate::selection::{Aggregation, ChartKind, TimeUnit};

/// Normalized chart description with its data already aggregated.
/// Renderers draw it as-is; no further transformation is expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub encodings: Encodings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_count: Option<usize>,
    pub options: ChartOptions,
    pub data: ChartData,
}

/// Data columns bound to visual channels
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Encodings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Encoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Encoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Encoding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Encoding {
    pub field: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub title: String,
}

impl Encoding {
    pub fn new(field: impl Into<String>, column_type: ColumnType) -> Self {
        let field = field.into();
        Self {
            title: field.clone(),
            field,
            column_type,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Presentation flags passed through from the selection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChartOptions {
    pub stacked: bool,
    pub horizontal: bool,
    pub donut: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartData {
    /// One row per category, one value per series (bar, pie)
    Categories(CategoryTable),
    /// One five-number summary per category (box)
    Boxes(Vec<BoxSummary>),
    /// Raw numeric pairs (scatter, numeric line)
    Points(PointTable),
    Histogram(HistogramData),
    Correlation(CorrelationMatrix),
    /// Raw numeric sub-table (pairplot)
    Table(NumericTable),
    /// Calendar-bucketed sums (line, temporal bar)
    TimeSeries(TimeSeriesData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTable {
    /// Category values as they appear in the data
    pub keys: Vec<String>,
    /// Display names, index-aligned with `keys`
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl CategoryTable {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Largest bar extent, stacked or not
    pub fn max_extent(&self, stacked: bool) -> f64 {
        if stacked {
            (0..self.len())
                .map(|i| self.series.iter().map(|s| s.values[i]).sum::<f64>())
                .fold(0.0, f64::max)
        } else {
            self.series
                .iter()
                .flat_map(|s| s.values.iter().copied())
                .fold(0.0, f64::max)
        }
    }

    /// Centre of each stacked segment, per series then category.
    /// Non-finite values take no space.
    pub fn stack_midpoints(&self) -> Vec<Vec<f64>> {
        let mut base = vec![0.0; self.len()];
        self.series
            .iter()
            .map(|s| {
                s.values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| {
                        let v = if v.is_finite() { v } else { 0.0 };
                        let mid = base[i] + v / 2.0;
                        base[i] += v;
                        mid
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub key: String,
    pub category: String,
    pub count: usize,
    pub mean: f64,
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointTable {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramData {
    pub values: Vec<f64>,
    pub bins: Vec<Bin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Pairwise Pearson correlations, `values[i][j]` for `columns[i]` x `columns[j]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<Vec<String>>,
}

impl NumericTable {
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[idx]).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesData {
    pub unit: TimeUnit,
    pub buckets: Vec<NaiveDate>,
    pub values: Vec<f64>,
}
