// ChartSpecBuilder: (dataset, selection) -> pre-aggregated chart spec

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::chart::{
    BoxSummary, CategoryTable, ChartData, ChartOptions, ChartSpec, CorrelationMatrix, Encoding,
    Encodings, HistogramData, NumericTable, PointTable, Series, TimeSeriesData,
};
use crate::data::Dataset;
use crate::error::{InvalidSelection, SelectionResult};
use crate::schema::ColumnType;
use crate::selection::{Aggregation, ChartKind, Selection};
use crate::transform;

/// Minimum numeric columns for heatmaps, pair plots and composition pies
pub const MIN_MATRIX_COLUMNS: usize = 2;

/// Build a chart spec for `selection` against `dataset`
pub fn build(dataset: &Dataset, selection: &Selection) -> SelectionResult<ChartSpec> {
    ChartSpecBuilder::new(dataset).build(selection)
}

/// Stateless mapping from a selection to a renderable chart spec.
/// Borrowing the dataset keeps every build a pure read.
pub struct ChartSpecBuilder<'a> {
    dataset: &'a Dataset,
}

impl<'a> ChartSpecBuilder<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    pub fn build(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        debug!(kind = %selection.kind, rows = self.dataset.row_count(), "building chart spec");

        match selection.kind {
            ChartKind::Bar => self.build_bar(selection),
            ChartKind::Pie => self.build_pie(selection),
            ChartKind::Box => self.build_box(selection),
            ChartKind::Scatter => self.build_scatter(selection),
            ChartKind::Histogram => self.build_histogram(selection),
            ChartKind::Heatmap => self.build_heatmap(selection),
            ChartKind::Pairplot => self.build_pairplot(selection),
            ChartKind::Line => self.build_line(selection),
        }
    }

    // =========================================================================
    // Per-kind builders
    // =========================================================================

    fn build_bar(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let x = required(kind, "x", &selection.x)?;

        match self.column_type(x)? {
            ColumnType::Temporal => return self.build_time_series(selection),
            ColumnType::Categorical => {}
            found => {
                return Err(InvalidSelection::InvalidColumnType {
                    kind,
                    column: x.to_string(),
                    expected: ColumnType::Categorical,
                    found,
                })
            }
        }

        let value_columns: Vec<&str> = if selection.columns.is_empty() {
            vec![required(kind, "y", &selection.y)?]
        } else {
            selection.columns.iter().map(String::as_str).collect()
        };

        let aggregation = selection.aggregation.unwrap_or_default();
        let table = self.category_table(selection, x, &value_columns, aggregation)?;

        let title = selection.title.clone().unwrap_or_else(|| {
            format!("{} {} by {}", reducer_label(aggregation), value_columns.join(", "), x)
        });

        let mut encodings = Encodings {
            x: Some(self.encoding(x)?),
            ..Default::default()
        };
        if value_columns.len() == 1 {
            encodings.y = Some(self.encoding(value_columns[0])?);
        } else {
            encodings.y = Some(Encoding::new("value", ColumnType::Numeric).with_title(value_columns.join(", ")));
            encodings.color = Some(Encoding::new("series", ColumnType::Categorical));
        }

        Ok(ChartSpec {
            kind,
            title,
            encodings,
            aggregation: Some(aggregation),
            bin_count: None,
            options: options(selection),
            data: ChartData::Categories(table),
        })
    }

    fn build_pie(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;

        // No category column: one slice per value column
        if selection.x.is_none() && !selection.columns.is_empty() {
            return self.build_composition_pie(selection);
        }

        let x = required(kind, "x", &selection.x)?;
        self.expect_type(kind, x, ColumnType::Categorical)?;
        let y = required(kind, "y", &selection.y)?;

        let aggregation = selection.aggregation.unwrap_or_default();
        let table = self.category_table(selection, x, &[y], aggregation)?;

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| format!("{} {} by {}", reducer_label(aggregation), y, x));

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(self.encoding(x)?),
                y: Some(self.encoding(y)?),
                color: None,
            },
            aggregation: Some(aggregation),
            bin_count: None,
            options: options(selection),
            data: ChartData::Categories(table),
        })
    }

    fn build_composition_pie(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let columns = self.numeric_columns(kind, &selection.columns)?;
        let aggregation = selection.aggregation.unwrap_or(Aggregation::Sum);

        let mut values = Vec::with_capacity(columns.len());
        for name in &columns {
            let data = self.numeric(kind, name)?;
            let present: Vec<f64> = data.iter().flatten().copied().collect();
            values.push(transform::reduce(&present, aggregation));
        }

        let keys: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let categories = keys.iter().map(|k| selection.display_category(k)).collect();

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| format!("Share of {}", keys.join(", ")));

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(Encoding::new("column", ColumnType::Categorical)),
                y: Some(Encoding::new("value", ColumnType::Numeric).with_title(reducer_label(aggregation))),
                color: None,
            },
            aggregation: Some(aggregation),
            bin_count: None,
            options: options(selection),
            data: ChartData::Categories(CategoryTable {
                keys,
                categories,
                series: vec![Series {
                    name: reducer_label(aggregation).to_string(),
                    values,
                }],
            }),
        })
    }

    fn build_box(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let x = required(kind, "x", &selection.x)?;
        let keys = self.categorical(kind, x)?;
        let y = required(kind, "y", &selection.y)?;
        let values = self.numeric(kind, y)?;

        let groups = transform::group_values(keys, values);
        let mut summaries = Vec::with_capacity(groups.len());
        for key in transform::sorted_keys(&groups) {
            let ys = &groups[&key];
            if let Some(stats) = transform::five_number_summary(ys) {
                summaries.push(BoxSummary {
                    category: selection.display_category(&key),
                    key,
                    count: ys.len(),
                    mean: transform::reduce(ys, Aggregation::Mean),
                    lower_whisker: stats.lower_whisker,
                    q1: stats.q1,
                    median: stats.median,
                    q3: stats.q3,
                    upper_whisker: stats.upper_whisker,
                    outliers: stats.outliers,
                });
            }
        }

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| format!("{} by {}", y, x));

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(self.encoding(x)?),
                y: Some(self.encoding(y)?),
                color: None,
            },
            aggregation: Some(Aggregation::Mean),
            bin_count: None,
            options: options(selection),
            data: ChartData::Boxes(summaries),
        })
    }

    fn build_scatter(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let x = required(kind, "x", &selection.x)?;
        let xs = self.numeric(kind, x)?;
        let y = required(kind, "y", &selection.y)?;
        let ys = self.numeric(kind, y)?;
        let hue = match &selection.group {
            Some(g) => Some((g.as_str(), self.categorical(kind, g)?)),
            None => None,
        };

        let mut points = PointTable {
            x: Vec::new(),
            y: Vec::new(),
            color: hue.map(|_| Vec::new()),
        };
        for row in 0..self.dataset.row_count() {
            let (Some(xv), Some(yv)) = (xs[row], ys[row]) else {
                continue;
            };
            if let (Some((_, hues)), Some(colors)) = (hue, points.color.as_mut()) {
                let Some(h) = &hues[row] else { continue };
                colors.push(selection.display_category(h));
            }
            points.x.push(xv);
            points.y.push(yv);
        }

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| format!("{} vs {}", y, x));

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(self.encoding(x)?),
                y: Some(self.encoding(y)?),
                color: match hue {
                    Some((g, _)) => Some(self.encoding(g)?),
                    None => None,
                },
            },
            aggregation: None,
            bin_count: None,
            options: options(selection),
            data: ChartData::Points(points),
        })
    }

    fn build_histogram(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let x = required(kind, "x", &selection.x)?;
        let values: Vec<f64> = self.numeric(kind, x)?.iter().flatten().copied().collect();

        let bin_count = selection.effective_bin_count();
        let bins = transform::histogram_bins(&values, bin_count);

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| format!("Distribution of {}", x));

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(self.encoding(x)?),
                y: Some(Encoding::new("count", ColumnType::Numeric).with_title("Count")),
                color: None,
            },
            aggregation: None,
            bin_count: Some(bin_count),
            options: options(selection),
            data: ChartData::Histogram(HistogramData { values, bins }),
        })
    }

    fn build_heatmap(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let columns = self.numeric_columns(kind, &selection.columns)?;

        let data: Vec<&[Option<f64>]> = columns
            .iter()
            .map(|c| self.numeric(kind, c))
            .collect::<SelectionResult<_>>()?;
        let values = transform::correlation_matrix(&data);

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| "Correlation matrix".to_string());

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(Encoding::new("column", ColumnType::Categorical)),
                y: Some(Encoding::new("row", ColumnType::Categorical)),
                color: Some(Encoding::new("correlation", ColumnType::Numeric)),
            },
            aggregation: None,
            bin_count: None,
            options: options(selection),
            data: ChartData::Correlation(CorrelationMatrix {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                values,
            }),
        })
    }

    fn build_pairplot(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let columns = self.numeric_columns(kind, &selection.columns)?;

        let data: Vec<&[Option<f64>]> = columns
            .iter()
            .map(|c| self.numeric(kind, c))
            .collect::<SelectionResult<_>>()?;
        let hue_column = match &selection.group {
            Some(g) => Some((g.as_str(), self.categorical(kind, g)?)),
            None => None,
        };

        let mut rows = Vec::new();
        let mut hue = hue_column.map(|_| Vec::new());
        for row in 0..self.dataset.row_count() {
            // Complete cases only
            let Some(values) = data.iter().map(|c| c[row]).collect::<Option<Vec<f64>>>() else {
                continue;
            };
            if let (Some((_, hues)), Some(out)) = (hue_column, hue.as_mut()) {
                let Some(h) = &hues[row] else { continue };
                out.push(selection.display_category(h));
            }
            rows.push(values);
        }

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| "Pair plot".to_string());

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: None,
                y: None,
                color: match hue_column {
                    Some((g, _)) => Some(self.encoding(g)?),
                    None => None,
                },
            },
            aggregation: None,
            bin_count: None,
            options: options(selection),
            data: ChartData::Table(NumericTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
                hue,
            }),
        })
    }

    fn build_line(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let x = required(kind, "x", &selection.x)?;

        match self.column_type(x)? {
            ColumnType::Temporal => self.build_time_series(selection),
            ColumnType::Numeric => self.build_numeric_line(selection, x),
            found => Err(InvalidSelection::InvalidColumnType {
                kind,
                column: x.to_string(),
                expected: ColumnType::Temporal,
                found,
            }),
        }
    }

    fn build_numeric_line(&self, selection: &Selection, x: &str) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let xs = self.numeric(kind, x)?;
        let y = required(kind, "y", &selection.y)?;
        let ys = self.numeric(kind, y)?;

        let mut pairs: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys.iter())
            .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let (px, py): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| format!("{} over {}", y, x));

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(self.encoding(x)?),
                y: Some(self.encoding(y)?),
                color: None,
            },
            aggregation: None,
            bin_count: None,
            options: options(selection),
            data: ChartData::Points(PointTable {
                x: px,
                y: py,
                color: None,
            }),
        })
    }

    /// Temporal x: bucket rows by calendar unit and sum the value column
    fn build_time_series(&self, selection: &Selection) -> SelectionResult<ChartSpec> {
        let kind = selection.kind;
        let x = required(kind, "x", &selection.x)?;
        let dates: &[Option<NaiveDate>] = self.temporal(kind, x)?;
        let y = required(kind, "y", &selection.y)?;
        let values = self.numeric(kind, y)?;

        let unit = selection.time_unit.unwrap_or_default();
        let (buckets, sums) = transform::bucket_sums(dates, values, unit);

        let title = selection
            .title
            .clone()
            .unwrap_or_else(|| format!("{} {}", unit.adjective(), y));

        Ok(ChartSpec {
            kind,
            title,
            encodings: Encodings {
                x: Some(self.encoding(x)?),
                y: Some(self.encoding(y)?),
                color: None,
            },
            aggregation: Some(Aggregation::Sum),
            bin_count: None,
            options: options(selection),
            data: ChartData::TimeSeries(TimeSeriesData {
                unit,
                buckets,
                values: sums,
            }),
        })
    }

    // =========================================================================
    // Column lookups
    // =========================================================================

    fn column_type(&self, name: &str) -> SelectionResult<ColumnType> {
        self.dataset
            .schema()
            .column_type(name)
            .ok_or_else(|| InvalidSelection::UnknownColumn {
                column: name.to_string(),
            })
    }

    fn expect_type(&self, kind: ChartKind, name: &str, expected: ColumnType) -> SelectionResult<()> {
        let found = self.column_type(name)?;
        if found != expected {
            return Err(InvalidSelection::InvalidColumnType {
                kind,
                column: name.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    fn numeric(&self, kind: ChartKind, name: &str) -> SelectionResult<&'a [Option<f64>]> {
        self.expect_type(kind, name, ColumnType::Numeric)?;
        self.dataset
            .numeric(name)
            .ok_or_else(|| InvalidSelection::UnknownColumn { column: name.to_string() })
    }

    fn categorical(&self, kind: ChartKind, name: &str) -> SelectionResult<&'a [Option<String>]> {
        self.expect_type(kind, name, ColumnType::Categorical)?;
        self.dataset
            .categorical(name)
            .ok_or_else(|| InvalidSelection::UnknownColumn { column: name.to_string() })
    }

    fn temporal(&self, kind: ChartKind, name: &str) -> SelectionResult<&'a [Option<NaiveDate>]> {
        self.expect_type(kind, name, ColumnType::Temporal)?;
        self.dataset
            .temporal(name)
            .ok_or_else(|| InvalidSelection::UnknownColumn { column: name.to_string() })
    }

    /// At least two columns, all numeric
    fn numeric_columns<'s>(&self, kind: ChartKind, columns: &'s [String]) -> SelectionResult<Vec<&'s str>> {
        if columns.len() < MIN_MATRIX_COLUMNS {
            return Err(InvalidSelection::InsufficientColumns {
                kind,
                required: MIN_MATRIX_COLUMNS,
                found: columns.len(),
            });
        }
        for name in columns {
            self.expect_type(kind, name, ColumnType::Numeric)?;
        }
        Ok(columns.iter().map(String::as_str).collect())
    }

    fn encoding(&self, name: &str) -> SelectionResult<Encoding> {
        let schema = self.dataset.schema();
        let column = schema.get(name).ok_or_else(|| InvalidSelection::UnknownColumn {
            column: name.to_string(),
        })?;
        Ok(Encoding::new(column.name.clone(), column.column_type))
    }

    /// Group every value column by the categorical `x` and reduce. Categories
    /// missing from one series get 0.
    fn category_table(
        &self,
        selection: &Selection,
        x: &str,
        value_columns: &[&str],
        aggregation: Aggregation,
    ) -> SelectionResult<CategoryTable> {
        let kind = selection.kind;
        let keys = self.categorical(kind, x)?;

        let mut reduced = Vec::with_capacity(value_columns.len());
        for name in value_columns {
            let values = self.numeric(kind, name)?;
            let (cats, vals) = transform::group_reduce(keys, values, aggregation);
            reduced.push((name.to_string(), cats.into_iter().zip(vals).collect::<HashMap<_, _>>()));
        }

        let mut order: Vec<String> = reduced
            .iter()
            .flat_map(|(_, by_key)| by_key.keys().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        transform::sort_categories(&mut order);

        let series = reduced
            .into_iter()
            .map(|(name, by_key)| Series {
                name,
                values: order.iter().map(|k| by_key.get(k).copied().unwrap_or(0.0)).collect(),
            })
            .collect();

        Ok(CategoryTable {
            categories: order.iter().map(|k| selection.display_category(k)).collect(),
            keys: order,
            series,
        })
    }
}

fn required<'s>(kind: ChartKind, role: &'static str, column: &'s Option<String>) -> SelectionResult<&'s str> {
    column
        .as_deref()
        .ok_or(InvalidSelection::MissingColumn { kind, role })
}

fn reducer_label(aggregation: Aggregation) -> &'static str {
    match aggregation {
        Aggregation::Mean => "Average",
        Aggregation::Sum => "Total",
    }
}

fn options(selection: &Selection) -> ChartOptions {
    ChartOptions {
        stacked: selection.stacked,
        horizontal: selection.horizontal,
        donut: selection.donut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaOverrides;
    use crate::selection::TimeUnit;

    fn make_dataset() -> Dataset {
        let headers = vec!["dteday", "season", "weathersit", "temp", "hum", "cnt", "casual", "registered"];
        let rows = vec![
            vec!["2011-01-01", "1", "2", "0.34", "0.80", "985", "331", "654"],
            vec!["2011-01-02", "1", "2", "0.36", "0.69", "801", "131", "670"],
            vec!["2011-01-15", "1", "1", "0.20", "0.44", "1349", "120", "1229"],
            vec!["2011-02-03", "1", "1", "0.23", "0.59", "1600", "108", "1492"],
            vec!["2011-02-28", "2", "3", "0.22", "0.43", "1606", "82", "1524"],
            vec!["2011-04-10", "2", "1", "0.40", "0.52", "3000", "900", "2100"],
            vec!["2011-07-04", "3", "1", "0.70", "0.61", "5000", "1800", "3200"],
        ];
        Dataset::from_records(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
            &SchemaOverrides::categorical(["season", "weathersit"]),
        )
        .unwrap()
    }

    #[test]
    fn test_bar_mean_per_category() {
        let ds = make_dataset();
        let spec = build(&ds, &Selection::new(ChartKind::Bar).x("season").y("cnt")).unwrap();
        let ChartData::Categories(table) = spec.data else {
            panic!("Expected category table");
        };
        assert_eq!(table.keys, vec!["1", "2", "3"]);
        assert_eq!(table.series.len(), 1);
        let expected = [(985.0 + 801.0 + 1349.0 + 1600.0) / 4.0, (1606.0 + 3000.0) / 2.0, 5000.0];
        assert_eq!(table.series[0].values, expected);
        assert_eq!(spec.aggregation, Some(Aggregation::Mean));
        assert_eq!(spec.title, "Average cnt by season");
    }

    fn dataset_with_gaps() -> Dataset {
        let headers = vec!["season", "cnt", "temp"];
        let rows = vec![
            vec!["1", "10", "0.5"],
            vec!["1", "NaN", "nan"],
            vec!["1", "20", "0.9"],
            vec!["2", "NA", "inf"],
            vec!["2", "40", ""],
        ];
        Dataset::from_records(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
            &SchemaOverrides::categorical(["season"]),
        )
        .unwrap()
    }

    #[test]
    fn test_na_cells_are_skipped() {
        let ds = dataset_with_gaps();
        assert_eq!(ds.schema().column_type("cnt"), Some(ColumnType::Numeric));

        let spec = build(&ds, &Selection::new(ChartKind::Bar).x("season").y("cnt")).unwrap();
        let ChartData::Categories(table) = spec.data else {
            panic!("Expected category table");
        };
        assert_eq!(table.series[0].values, vec![15.0, 40.0]);

        let spec = build(&ds, &Selection::new(ChartKind::Histogram).x("temp").bins(5)).unwrap();
        let ChartData::Histogram(hist) = spec.data else {
            panic!("Expected histogram");
        };
        assert_eq!(hist.values, vec![0.5, 0.9]);
        assert_eq!(hist.bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_bar_multi_series_sum_with_labels() {
        let ds = make_dataset();
        let sel = Selection::new(ChartKind::Bar)
            .x("season")
            .columns(["casual", "registered"])
            .aggregate(Aggregation::Sum)
            .stacked()
            .label("1", "Spring");
        let spec = build(&ds, &sel).unwrap();
        assert!(spec.options.stacked);
        let ChartData::Categories(table) = spec.data else {
            panic!("Expected category table");
        };
        assert_eq!(table.categories[0], "Spring");
        assert_eq!(table.series[0].name, "casual");
        assert_eq!(table.series[0].values[0], 331.0 + 131.0 + 120.0 + 108.0);
        assert_eq!(table.series[1].values[2], 3200.0);
    }

    #[test]
    fn test_bar_rejects_numeric_category() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Bar).x("temp").y("cnt")).unwrap_err();
        assert!(matches!(
            err,
            InvalidSelection::InvalidColumnType { expected: ColumnType::Categorical, found: ColumnType::Numeric, .. }
        ));
    }

    #[test]
    fn test_bar_rejects_categorical_value() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Bar).x("season").y("weathersit")).unwrap_err();
        assert_eq!(
            err,
            InvalidSelection::InvalidColumnType {
                kind: ChartKind::Bar,
                column: "weathersit".to_string(),
                expected: ColumnType::Numeric,
                found: ColumnType::Categorical,
            }
        );
    }

    #[test]
    fn test_bar_over_dates_is_time_series() {
        let ds = make_dataset();
        let sel = Selection::new(ChartKind::Bar).x("dteday").y("cnt").time_unit(TimeUnit::Month);
        let spec = build(&ds, &sel).unwrap();
        assert!(matches!(spec.data, ChartData::TimeSeries(_)));
    }

    #[test]
    fn test_pie_by_category() {
        let ds = make_dataset();
        let spec = build(&ds, &Selection::new(ChartKind::Pie).x("weathersit").y("cnt")).unwrap();
        let ChartData::Categories(table) = spec.data else {
            panic!("Expected category table");
        };
        assert_eq!(table.keys, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_composition_pie_sums_columns() {
        let ds = make_dataset();
        let sel = Selection::new(ChartKind::Pie).columns(["casual", "registered"]).donut();
        let spec = build(&ds, &sel).unwrap();
        assert!(spec.options.donut);
        assert_eq!(spec.aggregation, Some(Aggregation::Sum));
        let ChartData::Categories(table) = spec.data else {
            panic!("Expected category table");
        };
        assert_eq!(table.keys, vec!["casual", "registered"]);
        assert_eq!(table.series[0].values[0], 331.0 + 131.0 + 120.0 + 108.0 + 82.0 + 900.0 + 1800.0);
    }

    #[test]
    fn test_composition_pie_needs_two_columns() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Pie).columns(["casual"])).unwrap_err();
        assert!(matches!(err, InvalidSelection::InsufficientColumns { found: 1, .. }));
    }

    #[test]
    fn test_box_summary_per_category() {
        let ds = make_dataset();
        let spec = build(&ds, &Selection::new(ChartKind::Box).x("weathersit").y("cnt")).unwrap();
        let ChartData::Boxes(boxes) = spec.data else {
            panic!("Expected boxes");
        };
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[1].key, "2");
        assert_eq!(boxes[1].count, 2);
        assert_eq!(boxes[1].mean, (985.0 + 801.0) / 2.0);
        assert_eq!(boxes[1].median, (985.0 + 801.0) / 2.0);
    }

    #[test]
    fn test_scatter_pass_through() {
        let ds = make_dataset();
        let spec = build(&ds, &Selection::new(ChartKind::Scatter).x("temp").y("cnt").group("season")).unwrap();
        let ChartData::Points(points) = spec.data else {
            panic!("Expected points");
        };
        assert_eq!(points.x.len(), 7);
        assert_eq!(points.x[0], 0.34);
        assert_eq!(points.y[6], 5000.0);
        assert_eq!(points.color.as_ref().unwrap()[6], "3");
        assert_eq!(spec.encodings.color.unwrap().field, "season");
    }

    #[test]
    fn test_scatter_requires_numeric() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Scatter).x("season").y("cnt")).unwrap_err();
        assert!(matches!(err, InvalidSelection::InvalidColumnType { .. }));
    }

    #[test]
    fn test_histogram_bin_count_clamped() {
        let ds = make_dataset();
        for (requested, expected) in [(None, 30), (Some(2), 5), (Some(64), 64), (Some(500), 100)] {
            let mut sel = Selection::new(ChartKind::Histogram).x("temp");
            sel.bin_count = requested;
            let spec = build(&ds, &sel).unwrap();
            assert_eq!(spec.bin_count, Some(expected));
            let ChartData::Histogram(hist) = spec.data else {
                panic!("Expected histogram");
            };
            assert_eq!(hist.bins.len(), expected);
            assert_eq!(hist.values.len(), 7);
        }
    }

    #[test]
    fn test_histogram_rejects_categorical() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Histogram).x("season")).unwrap_err();
        assert!(matches!(err, InvalidSelection::InvalidColumnType { found: ColumnType::Categorical, .. }));
    }

    #[test]
    fn test_heatmap_matrix() {
        let ds = make_dataset();
        let sel = Selection::new(ChartKind::Heatmap).columns(["temp", "hum", "casual", "cnt"]);
        let spec = build(&ds, &sel).unwrap();
        let ChartData::Correlation(matrix) = spec.data else {
            panic!("Expected correlation matrix");
        };
        assert_eq!(matrix.values.len(), 4);
        for i in 0..4 {
            assert_eq!(matrix.values[i].len(), 4);
            assert_eq!(matrix.values[i][i], 1.0);
            for j in 0..4 {
                assert_eq!(matrix.values[i][j], matrix.values[j][i]);
            }
        }
    }

    #[test]
    fn test_heatmap_single_column_is_insufficient() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Heatmap).columns(["temp"])).unwrap_err();
        assert_eq!(
            err,
            InvalidSelection::InsufficientColumns {
                kind: ChartKind::Heatmap,
                required: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_pairplot_single_column_is_insufficient() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Pairplot).columns(["cnt"])).unwrap_err();
        assert!(matches!(err, InvalidSelection::InsufficientColumns { .. }));
    }

    #[test]
    fn test_pairplot_sub_table() {
        let ds = make_dataset();
        let sel = Selection::new(ChartKind::Pairplot).columns(["temp", "cnt"]).group("season");
        let spec = build(&ds, &sel).unwrap();
        let ChartData::Table(table) = spec.data else {
            panic!("Expected table");
        };
        assert_eq!(table.columns, vec!["temp", "cnt"]);
        assert_eq!(table.rows.len(), 7);
        assert_eq!(table.rows[0], vec![0.34, 985.0]);
        assert_eq!(table.hue.unwrap().len(), 7);
    }

    #[test]
    fn test_line_month_buckets() {
        let ds = make_dataset().filter_rows(|i| i < 5);
        let sel = Selection::new(ChartKind::Line).x("dteday").y("cnt").time_unit(TimeUnit::Month);
        let spec = build(&ds, &sel).unwrap();
        assert_eq!(spec.title, "Monthly cnt");
        let ChartData::TimeSeries(series) = spec.data else {
            panic!("Expected time series");
        };
        assert_eq!(
            series.buckets,
            vec![
                NaiveDate::from_ymd_opt(2011, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2011, 2, 1).unwrap(),
            ]
        );
        assert_eq!(series.values, vec![985.0 + 801.0 + 1349.0, 1600.0 + 1606.0]);
    }

    #[test]
    fn test_line_numeric_sorted() {
        let ds = make_dataset();
        let spec = build(&ds, &Selection::new(ChartKind::Line).x("temp").y("cnt")).unwrap();
        let ChartData::Points(points) = spec.data else {
            panic!("Expected points");
        };
        assert!(points.x.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_line_rejects_categorical_x() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Line).x("season").y("cnt")).unwrap_err();
        assert!(matches!(err, InvalidSelection::InvalidColumnType { expected: ColumnType::Temporal, .. }));
    }

    #[test]
    fn test_unknown_and_missing_columns() {
        let ds = make_dataset();
        let err = build(&ds, &Selection::new(ChartKind::Bar).x("nope").y("cnt")).unwrap_err();
        assert_eq!(err, InvalidSelection::UnknownColumn { column: "nope".to_string() });

        let err = build(&ds, &Selection::new(ChartKind::Scatter).x("temp")).unwrap_err();
        assert_eq!(err, InvalidSelection::MissingColumn { kind: ChartKind::Scatter, role: "y" });
    }

    #[test]
    fn test_spec_serializes() {
        let ds = make_dataset();
        let spec = build(&ds, &Selection::new(ChartKind::Bar).x("season").y("cnt")).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "bar");
        assert_eq!(json["data"]["type"], "categories");
        assert_eq!(json["encodings"]["x"]["type"], "categorical");
    }
}
