//! Vega-Lite JSON backend
//!
//! Emits a self-contained Vega-Lite v5 document with the aggregated data
//! inlined, so any vega-embed host can draw it without this crate.
//!
//! # Mapping
//!
//! - bar / pie → `bar` / `arc` marks over (category, series, value) rows
//! - box → layered `rule` + `bar` + `tick` over precomputed summaries
//! - heatmap → `rect` + `text` layers, diverging colour scale fixed to [-1, 1]
//! - pairplot → `repeat` over the selected columns
//! - time series → temporal x with the bucket's time unit

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use crate::chart::{
    BoxSummary, CategoryTable, ChartData, ChartSpec, CorrelationMatrix, Encoding, HistogramData,
    NumericTable, PointTable, TimeSeriesData,
};
use crate::palette::ColorPalette;
use crate::render::{RenderedChart, Renderer};
use crate::selection::{ChartKind, TimeUnit};
use crate::{OutputFormat, RenderOptions};

const SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
const DONUT_INNER_RADIUS: f64 = 60.0;

pub struct VegaLiteRenderer {
    options: RenderOptions,
}

impl VegaLiteRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Renderer for VegaLiteRenderer {
    fn render(&self, spec: &ChartSpec) -> Result<RenderedChart> {
        let document = to_vegalite(spec, &self.options);
        let bytes = serde_json::to_vec_pretty(&document).context("Failed to serialize Vega-Lite spec")?;
        Ok(RenderedChart {
            format: OutputFormat::Vegalite,
            bytes,
        })
    }
}

/// Build the Vega-Lite document for a chart spec
pub fn to_vegalite(spec: &ChartSpec, options: &RenderOptions) -> Value {
    let palette = ColorPalette::named(options.palette);

    let body = match &spec.data {
        ChartData::Categories(table) if spec.kind == ChartKind::Pie => pie(table, &palette, spec),
        ChartData::Categories(table) => bars(table, &palette, spec),
        ChartData::Boxes(boxes) => box_layers(boxes, spec),
        ChartData::Points(points) => points_spec(points, &palette, spec),
        ChartData::Histogram(hist) => histogram(hist, spec),
        ChartData::Correlation(matrix) => heatmap(matrix),
        ChartData::Table(table) => pairplot(table, &palette),
        ChartData::TimeSeries(series) => time_series(series, spec),
    };

    let mut document = json!({
        "$schema": SCHEMA,
        "title": spec.title,
    });
    // Repeat specs size their cells, not the whole view
    if !matches!(spec.data, ChartData::Table(_)) {
        document["width"] = json!(options.width);
        document["height"] = json!(options.height);
    }
    if let (Value::Object(doc), Value::Object(body)) = (&mut document, body) {
        doc.extend(body);
    }
    document
}

fn title_of(encoding: &Option<Encoding>, fallback: &str) -> String {
    encoding
        .as_ref()
        .map(|e| e.title.clone())
        .unwrap_or_else(|| fallback.to_string())
}

fn bars(table: &CategoryTable, palette: &ColorPalette, spec: &ChartSpec) -> Value {
    let multi = table.series.len() > 1;
    let mut values = Vec::new();
    for series in &table.series {
        for (category, value) in table.categories.iter().zip(&series.values) {
            values.push(json!({"category": category, "series": series.name, "value": value}));
        }
    }

    let category = json!({
        "field": "category",
        "type": "nominal",
        "sort": table.categories,
        "title": title_of(&spec.encodings.x, "category"),
    });
    let mut value = json!({
        "field": "value",
        "type": "quantitative",
        "title": title_of(&spec.encodings.y, "value"),
    });
    if multi && !spec.options.stacked {
        value["stack"] = Value::Null;
    }

    let (x, y, offset) = if spec.options.horizontal {
        (value, category, "yOffset")
    } else {
        (category, value, "xOffset")
    };
    let mut encoding = json!({"x": x, "y": y});
    if multi {
        encoding["color"] = json!({
            "field": "series",
            "type": "nominal",
            "scale": {"range": palette.hex_colors(table.series.len())},
        });
        if !spec.options.stacked {
            encoding[offset] = json!({"field": "series"});
        }
    } else {
        encoding["color"] = json!({"value": palette.hex_colors(1)[0]});
    }

    if !(multi && spec.options.stacked) {
        return json!({
            "data": {"values": values},
            "mark": "bar",
            "encoding": encoding,
        });
    }

    // Segment labels sit at precomputed stack midpoints
    for (row, mid) in values.iter_mut().zip(table.stack_midpoints().into_iter().flatten()) {
        row["mid"] = json!(mid);
    }
    let value_axis = if spec.options.horizontal { "x" } else { "y" };
    let category_axis = if spec.options.horizontal { "y" } else { "x" };
    let mut labels = json!({
        "text": {"field": "value", "type": "quantitative", "format": ",.0f"},
    });
    labels[category_axis] = encoding[category_axis].clone();
    labels[value_axis] = json!({"field": "mid", "type": "quantitative"});

    json!({
        "data": {"values": values},
        "layer": [
            {"mark": "bar", "encoding": encoding},
            {"mark": {"type": "text", "color": "black"}, "encoding": labels},
        ],
    })
}

fn pie(table: &CategoryTable, palette: &ColorPalette, spec: &ChartSpec) -> Value {
    let series = table.series.first();
    let values: Vec<Value> = table
        .categories
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let value = series.and_then(|s| s.values.get(i)).copied().unwrap_or(0.0);
            json!({"category": category, "value": value})
        })
        .collect();

    let mut mark = json!({"type": "arc"});
    if spec.options.donut {
        mark["innerRadius"] = json!(DONUT_INNER_RADIUS);
    }

    json!({
        "data": {"values": values},
        "mark": mark,
        "encoding": {
            "theta": {"field": "value", "type": "quantitative", "stack": true},
            "color": {
                "field": "category",
                "type": "nominal",
                "sort": table.categories,
                "scale": {"range": palette.hex_colors(table.len())},
                "title": title_of(&spec.encodings.x, "category"),
            },
            "order": {"field": "value", "sort": "descending"},
        },
    })
}

fn box_layers(boxes: &[BoxSummary], spec: &ChartSpec) -> Value {
    let categories: Vec<&str> = boxes.iter().map(|b| b.category.as_str()).collect();
    let summaries: Vec<Value> = boxes
        .iter()
        .map(|b| {
            json!({
                "category": b.category,
                "lower": b.lower_whisker,
                "q1": b.q1,
                "median": b.median,
                "q3": b.q3,
                "upper": b.upper_whisker,
                "mean": b.mean,
                "count": b.count,
            })
        })
        .collect();
    let outliers: Vec<Value> = boxes
        .iter()
        .flat_map(|b| b.outliers.iter().map(move |v| json!({"category": b.category, "value": v})))
        .collect();

    let x = json!({
        "field": "category",
        "type": "nominal",
        "sort": categories,
        "title": title_of(&spec.encodings.x, "category"),
    });
    let y_title = title_of(&spec.encodings.y, "value");

    json!({
        "layer": [
            {
                "data": {"values": summaries},
                "mark": "rule",
                "encoding": {
                    "x": x,
                    "y": {"field": "lower", "type": "quantitative", "title": y_title},
                    "y2": {"field": "upper"},
                },
            },
            {
                "data": {"values": summaries},
                "mark": {"type": "bar", "size": 24},
                "encoding": {
                    "x": x,
                    "y": {"field": "q1", "type": "quantitative"},
                    "y2": {"field": "q3"},
                    "tooltip": [
                        {"field": "median", "type": "quantitative"},
                        {"field": "mean", "type": "quantitative"},
                        {"field": "count", "type": "quantitative"},
                    ],
                },
            },
            {
                "data": {"values": summaries},
                "mark": {"type": "tick", "color": "white", "size": 24},
                "encoding": {
                    "x": x,
                    "y": {"field": "median", "type": "quantitative"},
                },
            },
            {
                "data": {"values": outliers},
                "mark": {"type": "point", "filled": false},
                "encoding": {
                    "x": x,
                    "y": {"field": "value", "type": "quantitative"},
                },
            },
        ],
    })
}

fn points_spec(points: &PointTable, palette: &ColorPalette, spec: &ChartSpec) -> Value {
    let values: Vec<Value> = (0..points.x.len())
        .map(|i| {
            let mut row = Map::new();
            row.insert("x".to_string(), json!(points.x[i]));
            row.insert("y".to_string(), json!(points.y[i]));
            if let Some(colors) = &points.color {
                row.insert("color".to_string(), json!(colors[i]));
            }
            Value::Object(row)
        })
        .collect();

    let mut encoding = json!({
        "x": {"field": "x", "type": "quantitative", "title": title_of(&spec.encodings.x, "x")},
        "y": {"field": "y", "type": "quantitative", "title": title_of(&spec.encodings.y, "y")},
    });
    if points.color.is_some() {
        encoding["color"] = json!({
            "field": "color",
            "type": "nominal",
            "title": title_of(&spec.encodings.color, "color"),
            "scale": {"range": palette.hex_colors(10)},
        });
    }

    let mark = if spec.kind == ChartKind::Line { "line" } else { "point" };
    json!({
        "data": {"values": values},
        "mark": mark,
        "encoding": encoding,
    })
}

fn histogram(hist: &HistogramData, spec: &ChartSpec) -> Value {
    let values: Vec<Value> = hist
        .bins
        .iter()
        .map(|b| json!({"bin_start": b.start, "bin_end": b.end, "count": b.count}))
        .collect();

    json!({
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {
                "field": "bin_start",
                "type": "quantitative",
                "bin": "binned",
                "title": title_of(&spec.encodings.x, "value"),
            },
            "x2": {"field": "bin_end"},
            "y": {"field": "count", "type": "quantitative", "title": "Count"},
        },
    })
}

fn heatmap(matrix: &CorrelationMatrix) -> Value {
    let mut values = Vec::new();
    for (i, row) in matrix.values.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            // NaN serialises as null
            values.push(json!({"row": matrix.columns[i], "column": matrix.columns[j], "value": v}));
        }
    }

    json!({
        "data": {"values": values},
        "encoding": {
            "x": {"field": "column", "type": "nominal", "sort": matrix.columns, "title": null},
            "y": {"field": "row", "type": "nominal", "sort": matrix.columns, "title": null},
        },
        "layer": [
            {
                "mark": "rect",
                "encoding": {
                    "color": {
                        "field": "value",
                        "type": "quantitative",
                        "scale": {"scheme": "blueorange", "domain": [-1, 1]},
                        "title": "r",
                    },
                },
            },
            {
                "mark": "text",
                "encoding": {
                    "text": {"field": "value", "type": "quantitative", "format": ".2f"},
                },
            },
        ],
    })
}

fn pairplot(table: &NumericTable, palette: &ColorPalette) -> Value {
    let values: Vec<Value> = table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let mut obj = Map::new();
            for (name, v) in table.columns.iter().zip(row) {
                obj.insert(name.clone(), json!(v));
            }
            if let Some(hue) = &table.hue {
                obj.insert("hue".to_string(), json!(hue[r]));
            }
            Value::Object(obj)
        })
        .collect();

    let mut encoding = json!({
        "x": {"field": {"repeat": "column"}, "type": "quantitative"},
        "y": {"field": {"repeat": "row"}, "type": "quantitative"},
    });
    if table.hue.is_some() {
        encoding["color"] = json!({
            "field": "hue",
            "type": "nominal",
            "scale": {"range": palette.hex_colors(10)},
        });
    }

    json!({
        "data": {"values": values},
        "repeat": {"row": table.columns, "column": table.columns},
        "spec": {
            "width": 150,
            "height": 150,
            "mark": "point",
            "encoding": encoding,
        },
    })
}

fn time_series(series: &TimeSeriesData, spec: &ChartSpec) -> Value {
    let values: Vec<Value> = series
        .buckets
        .iter()
        .zip(&series.values)
        .map(|(d, v)| json!({"date": d.format("%Y-%m-%d").to_string(), "value": v}))
        .collect();

    let time_unit = match series.unit {
        TimeUnit::Day => "yearmonthdate",
        TimeUnit::Week => "yearweek",
        TimeUnit::Month => "yearmonth",
    };
    let mark = if spec.kind == ChartKind::Bar { json!("bar") } else { json!({"type": "line", "point": true}) };

    json!({
        "data": {"values": values},
        "mark": mark,
        "encoding": {
            "x": {
                "field": "date",
                "type": "temporal",
                "timeUnit": time_unit,
                "title": title_of(&spec.encodings.x, "date"),
            },
            "y": {"field": "value", "type": "quantitative", "title": title_of(&spec.encodings.y, "value")},
        },
    })
}
