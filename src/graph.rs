// Plotters backend: draws a ChartSpec into a PNG or SVG figure

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use image::ImageEncoder;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::ops::Range;
use tracing::debug;

use crate::chart::{
    BoxSummary, CategoryTable, ChartData, ChartSpec, CorrelationMatrix, Encoding, HistogramData,
    NumericTable, PointTable, TimeSeriesData,
};
use crate::palette::{coolwarm, ColorPalette};
use crate::render::{RenderedChart, Renderer};
use crate::selection::{ChartKind, TimeUnit};
use crate::transform;
use crate::{OutputFormat, RenderOptions};

const FONT: &str = "sans-serif";
const PAIRPLOT_BINS: usize = 10;
/// Upper bound on bitmap size (8000x8000)
const MAX_PIXELS: usize = 64_000_000;

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Figure renderer backed by plotters
pub struct PlottersRenderer {
    options: RenderOptions,
}

impl PlottersRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Renderer for PlottersRenderer {
    fn render(&self, spec: &ChartSpec) -> Result<RenderedChart> {
        let palette = ColorPalette::named(self.options.palette);
        let (width, height) = (self.options.width, self.options.height);

        let (format, bytes) = match self.options.format {
            OutputFormat::Svg => (OutputFormat::Svg, render_svg(spec, width, height, &palette)?),
            _ => (OutputFormat::Png, render_png(spec, width, height, &palette)?),
        };

        debug!(kind = %spec.kind, ?format, bytes = bytes.len(), "chart rendered");
        Ok(RenderedChart { format, bytes })
    }
}

/// Draw into an RGB buffer and encode it as PNG
pub fn render_png(spec: &ChartSpec, width: u32, height: u32, palette: &ColorPalette) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        anyhow::bail!("Image dimensions must be positive (got {}x{})", width, height);
    }

    let len = (width as usize)
        .checked_mul(height as usize)
        .filter(|&pixels| pixels <= MAX_PIXELS)
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| anyhow::anyhow!("Image dimensions {}x{} are too large", width, height))?;
    let mut buffer = vec![0u8; len];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_chart(&root, spec, palette)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

pub fn render_svg(spec: &ChartSpec, width: u32, height: u32, palette: &ColorPalette) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw_chart(&root, spec, palette)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg.into_bytes())
}

/// Draw any chart spec onto a drawing area
pub fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    if has_no_data(&spec.data) {
        return draw_notice(root, &spec.title, "No data to display");
    }

    match &spec.data {
        ChartData::Categories(table) if spec.kind == ChartKind::Pie => draw_pie(root, spec, table, palette),
        ChartData::Categories(table) => draw_bars(root, spec, table, palette),
        ChartData::Boxes(boxes) => draw_boxes(root, spec, boxes, palette),
        ChartData::Points(points) if spec.kind == ChartKind::Line => draw_line(root, spec, points, palette),
        ChartData::Points(points) => draw_scatter(root, spec, points, palette),
        ChartData::Histogram(hist) => draw_histogram(root, spec, hist, palette),
        ChartData::Correlation(matrix) => draw_heatmap(root, spec, matrix),
        ChartData::Table(table) => draw_pairplot(root, spec, table, palette),
        ChartData::TimeSeries(series) => draw_time_series(root, spec, series, palette),
    }
}

/// Title plus a centred message in place of a chart
pub fn draw_notice<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, title: &str, message: &str) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;
    let (w, h) = root.dim_in_pixel();
    let centred = Pos::new(HPos::Center, VPos::Center);

    let title_style = TextStyle::from((FONT, 20).into_font()).pos(centred);
    root.draw(&Text::new(title.to_string(), (w as i32 / 2, h as i32 / 3), title_style))
        .context("Failed to draw notice title")?;

    let message_style = TextStyle::from((FONT, 16).into_font()).pos(centred).color(&RED);
    root.draw(&Text::new(message.to_string(), (w as i32 / 2, h as i32 / 2), message_style))
        .context("Failed to draw notice")?;

    Ok(())
}

fn has_no_data(data: &ChartData) -> bool {
    match data {
        ChartData::Categories(table) => table.is_empty(),
        ChartData::Boxes(boxes) => boxes.is_empty(),
        ChartData::Points(points) => points.x.is_empty(),
        ChartData::Histogram(hist) => hist.values.is_empty(),
        ChartData::Correlation(matrix) => matrix.columns.is_empty(),
        ChartData::Table(table) => table.rows.is_empty(),
        ChartData::TimeSeries(series) => series.buckets.is_empty(),
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

fn base_chart<'a, DB: DrawingBackend>(
    root: &'a DrawingArea<DB, Shift>,
    title: &str,
    x_range: Range<f64>,
    y_range: Range<f64>,
    y_label_area: u32,
) -> Result<Chart<'a, DB>>
where
    DB::ErrorType: 'static,
{
    ChartBuilder::on(root)
        .margin(10)
        .caption(title, (FONT, 20))
        .x_label_area_size(40)
        .y_label_area_size(y_label_area)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build chart")
}

fn draw_legend<'a, DB: DrawingBackend + 'a>(chart: &mut Chart<'a, DB>) -> Result<()>
where
    DB::ErrorType: 'static,
{
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .context("Failed to draw legend")
}

/// Data range with 5% padding; a single value gets +/- 1
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

/// Value range that always includes zero, for bars
fn zero_based_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if min == max {
        return 0.0..1.0;
    }
    let padding = (max - min) * 0.05;
    let lo = if min < 0.0 { min - padding } else { 0.0 };
    let hi = if max > 0.0 { max + padding } else { 0.0 };
    lo..hi
}

/// Label for a category axis tick; blank between categories
fn category_label(categories: &[String], value: f64) -> String {
    let idx = value.round();
    if (value - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

fn axis_title(encoding: &Option<Encoding>) -> String {
    encoding.as_ref().map(|e| e.title.clone()).unwrap_or_default()
}

// =============================================================================
// Chart kinds
// =============================================================================

fn draw_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    table: &CategoryTable,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let n = table.len();
    let n_series = table.series.len();
    let stacked = spec.options.stacked && n_series > 1;
    let horizontal = spec.options.horizontal;

    let value_range = if stacked {
        zero_based_range(std::iter::once(table.max_extent(true)))
    } else {
        zero_based_range(table.series.iter().flat_map(|s| s.values.iter().copied()))
    };
    let category_range = -0.5..(n as f64 - 0.5);

    let mut chart = if horizontal {
        base_chart(root, &spec.title, value_range, category_range, 90)?
    } else {
        base_chart(root, &spec.title, category_range, value_range, 60)?
    };

    let category_desc = axis_title(&spec.encodings.x);
    let value_desc = axis_title(&spec.encodings.y);
    let labels = |v: &f64| category_label(&table.categories, *v);
    {
        let mut mesh = chart.configure_mesh();
        if horizontal {
            mesh.disable_y_mesh()
                .y_labels(n)
                .y_label_formatter(&labels)
                .y_desc(category_desc)
                .x_desc(value_desc);
        } else {
            mesh.disable_x_mesh()
                .x_labels(n)
                .x_label_formatter(&labels)
                .x_desc(category_desc)
                .y_desc(value_desc);
        }
        mesh.draw().context("Failed to draw mesh")?;
    }

    let band = 0.8;
    let mut offsets = vec![0.0; n];

    for (series_idx, series) in table.series.iter().enumerate() {
        let color = palette.color(series_idx);
        let mut bars = Vec::with_capacity(n);

        for (cat_idx, &value) in series.values.iter().enumerate() {
            if !value.is_finite() {
                continue;
            }
            let center = cat_idx as f64;
            let (c0, c1, v0, v1) = if stacked {
                let base = offsets[cat_idx];
                offsets[cat_idx] += value;
                (center - band / 2.0, center + band / 2.0, base, base + value)
            } else {
                // Dodge: split the band between series
                let width = band / n_series as f64;
                let left = center - band / 2.0 + series_idx as f64 * width;
                (left, left + width, 0.0, value)
            };
            let corners = if horizontal {
                [(v0, c0), (v1, c1)]
            } else {
                [(c0, v0), (c1, v1)]
            };
            bars.push(Rectangle::new(corners, color.filled()));
        }

        let anno = chart.draw_series(bars).context("Failed to draw bars")?;
        if n_series > 1 {
            anno.label(series.name.clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }
    }

    if stacked {
        let centred = Pos::new(HPos::Center, VPos::Center);
        let label_style = TextStyle::from((FONT, 12).into_font()).pos(centred);
        for (series, mids) in table.series.iter().zip(table.stack_midpoints()) {
            chart
                .draw_series(
                    series
                        .values
                        .iter()
                        .zip(mids)
                        .enumerate()
                        .filter(|(_, (v, _))| v.is_finite() && **v > 0.0)
                        .map(|(cat_idx, (&v, mid))| {
                            let at = if horizontal { (mid, cat_idx as f64) } else { (cat_idx as f64, mid) };
                            Text::new(format_amount(v), at, label_style.clone())
                        }),
                )
                .context("Failed to draw bar labels")?;
        }
    }

    if n_series > 1 {
        draw_legend(&mut chart)?;
    }

    Ok(())
}

/// Whole numbers with thousands separators, others to one decimal
fn format_amount(value: f64) -> String {
    if value.fract() != 0.0 {
        return format!("{:.1}", value);
    }
    let digits = format!("{}", value.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}

/// Points of an annular (or full) wedge between two angles
fn wedge(start: f64, end: f64, inner: f64, outer: f64) -> Vec<(f64, f64)> {
    let steps = (((end - start) / TAU) * 120.0).ceil().max(2.0) as usize;
    let arc = |r: f64| {
        (0..=steps).map(move |k| {
            let a = start + (end - start) * k as f64 / steps as f64;
            (r * a.cos(), r * a.sin())
        })
    };

    let mut points: Vec<(f64, f64)> = arc(outer).collect();
    if inner > 0.0 {
        let mut inner_arc: Vec<(f64, f64)> = arc(inner).collect();
        inner_arc.reverse();
        points.extend(inner_arc);
    } else {
        points.push((0.0, 0.0));
    }
    points
}

fn draw_pie<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    table: &CategoryTable,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let values: Vec<f64> = table
        .series
        .first()
        .map(|s| {
            s.values
                .iter()
                .map(|&v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
                .collect()
        })
        .unwrap_or_default();
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return draw_notice(root, &spec.title, "No positive values to display");
    }

    // Keep the pie circular whatever the figure's aspect ratio
    let (w, h) = root.dim_in_pixel();
    let aspect = (w as f64 - 20.0).max(1.0) / (h as f64 - 60.0).max(1.0);
    let extent = 1.35;

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&spec.title, (FONT, 20))
        .build_cartesian_2d(-extent * aspect..extent * aspect, -extent..extent)
        .context("Failed to build chart")?;

    let inner = if spec.options.donut { 0.6 } else { 0.0 };
    let centred = Pos::new(HPos::Center, VPos::Center);
    let label_style = TextStyle::from((FONT, 14).into_font()).pos(centred);

    let mut angle = FRAC_PI_2;
    for (idx, &value) in values.iter().enumerate() {
        if value <= 0.0 {
            continue;
        }
        let sweep = value / total * TAU;
        let color = palette.color(idx);
        let outline = wedge(angle, angle + sweep, inner, 1.0);

        chart
            .draw_series(std::iter::once(Polygon::new(outline.clone(), color.filled())))
            .context("Failed to draw slice")?;
        let mut border = outline;
        if let Some(first) = border.first().copied() {
            border.push(first);
        }
        chart
            .draw_series(std::iter::once(PathElement::new(border, WHITE.stroke_width(2))))
            .context("Failed to draw slice border")?;

        let mid = angle + sweep / 2.0;
        let name = table.categories.get(idx).cloned().unwrap_or_default();
        let pct_radius = if inner > 0.0 { (inner + 1.0) / 2.0 } else { 0.6 };
        chart
            .draw_series([
                Text::new(name, (1.15 * mid.cos(), 1.15 * mid.sin()), label_style.clone()),
                Text::new(
                    format!("{:.1}%", value / total * 100.0),
                    (pct_radius * mid.cos(), pct_radius * mid.sin()),
                    label_style.clone(),
                ),
            ])
            .context("Failed to draw slice labels")?;

        angle += sweep;
    }

    Ok(())
}

fn draw_boxes<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    boxes: &[BoxSummary],
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let n = boxes.len();
    let y_range = padded_range(boxes.iter().flat_map(|b| {
        [b.lower_whisker, b.upper_whisker]
            .into_iter()
            .chain(b.outliers.iter().copied())
    }));
    let categories: Vec<String> = boxes.iter().map(|b| b.category.clone()).collect();

    let mut chart = base_chart(root, &spec.title, -0.5..(n as f64 - 0.5), y_range, 60)?;
    let labels = |v: &f64| category_label(&categories, *v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&labels)
        .x_desc(axis_title(&spec.encodings.x))
        .y_desc(axis_title(&spec.encodings.y))
        .draw()
        .context("Failed to draw mesh")?;

    let half = 0.3;
    for (idx, b) in boxes.iter().enumerate() {
        let x = idx as f64;
        let color = palette.color(idx);

        chart
            .draw_series([
                Rectangle::new([(x - half, b.q1), (x + half, b.q3)], color.mix(0.7).filled()),
                Rectangle::new([(x - half, b.q1), (x + half, b.q3)], BLACK.stroke_width(1)),
            ])
            .context("Failed to draw box")?;

        let strokes = vec![
            vec![(x - half, b.median), (x + half, b.median)],
            vec![(x, b.q3), (x, b.upper_whisker)],
            vec![(x, b.q1), (x, b.lower_whisker)],
            vec![(x - half / 2.0, b.upper_whisker), (x + half / 2.0, b.upper_whisker)],
            vec![(x - half / 2.0, b.lower_whisker), (x + half / 2.0, b.lower_whisker)],
        ];
        chart
            .draw_series(strokes.into_iter().map(|s| PathElement::new(s, BLACK.stroke_width(2))))
            .context("Failed to draw whiskers")?;

        chart
            .draw_series(b.outliers.iter().map(|&v| Circle::new((x, v), 3, BLACK.stroke_width(1))))
            .context("Failed to draw outliers")?;
    }

    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    points: &PointTable,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let x_range = padded_range(points.x.iter().copied());
    let y_range = padded_range(points.y.iter().copied());
    let mut chart = base_chart(root, &spec.title, x_range, y_range, 60)?;
    chart
        .configure_mesh()
        .x_desc(axis_title(&spec.encodings.x))
        .y_desc(axis_title(&spec.encodings.y))
        .draw()
        .context("Failed to draw mesh")?;

    let pairs = points.x.iter().copied().zip(points.y.iter().copied());

    match &points.color {
        Some(hues) => {
            let keys = distinct_sorted(hues);
            for (key_idx, key) in keys.iter().enumerate() {
                let color = palette.color(key_idx);
                chart
                    .draw_series(
                        pairs
                            .clone()
                            .zip(hues)
                            .filter(|(_, h)| *h == key)
                            .map(|((x, y), _)| Circle::new((x, y), 3, color.mix(0.7).filled())),
                    )
                    .context("Failed to draw points")?
                    .label(key.clone())
                    .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
            }
            draw_legend(&mut chart)?;
        }
        None => {
            let color = palette.color(0);
            chart
                .draw_series(pairs.map(|(x, y)| Circle::new((x, y), 3, color.mix(0.7).filled())))
                .context("Failed to draw points")?;
        }
    }

    Ok(())
}

fn draw_line<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    points: &PointTable,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let x_range = padded_range(points.x.iter().copied());
    let y_range = padded_range(points.y.iter().copied());
    let mut chart = base_chart(root, &spec.title, x_range, y_range, 60)?;
    chart
        .configure_mesh()
        .x_desc(axis_title(&spec.encodings.x))
        .y_desc(axis_title(&spec.encodings.y))
        .draw()
        .context("Failed to draw mesh")?;

    let line: Vec<(f64, f64)> = points.x.iter().copied().zip(points.y.iter().copied()).collect();
    chart
        .draw_series(LineSeries::new(line, palette.color(0).stroke_width(2)))
        .context("Failed to draw line series")?;

    Ok(())
}

fn draw_histogram<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    hist: &HistogramData,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (Some(first), Some(last)) = (hist.bins.first(), hist.bins.last()) else {
        return draw_notice(root, &spec.title, "No data to display");
    };
    let y_range = zero_based_range(hist.bins.iter().map(|b| b.count as f64));

    let mut chart = base_chart(root, &spec.title, first.start..last.end, y_range, 60)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(axis_title(&spec.encodings.x))
        .y_desc(axis_title(&spec.encodings.y))
        .draw()
        .context("Failed to draw mesh")?;

    let color = palette.color(0);
    chart
        .draw_series(
            hist.bins
                .iter()
                .map(|b| Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], color.mix(0.8).filled())),
        )
        .context("Failed to draw bins")?;
    chart
        .draw_series(
            hist.bins
                .iter()
                .map(|b| Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], WHITE.stroke_width(1))),
        )
        .context("Failed to draw bin edges")?;

    Ok(())
}

fn format_correlation(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn draw_heatmap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    matrix: &CorrelationMatrix,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let n = matrix.columns.len();
    let range = -0.5..(n as f64 - 0.5);
    let mut chart = base_chart(root, &spec.title, range.clone(), range, 90)?;

    // First column's row sits at the top
    let rows_top_down: Vec<String> = matrix.columns.iter().rev().cloned().collect();
    let x_labels = |v: &f64| category_label(&matrix.columns, *v);
    let y_labels = |v: &f64| category_label(&rows_top_down, *v);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&x_labels)
        .y_label_formatter(&y_labels)
        .draw()
        .context("Failed to draw mesh")?;

    let centred = Pos::new(HPos::Center, VPos::Center);
    let text_style = TextStyle::from((FONT, 13).into_font()).pos(centred);

    for (i, row) in matrix.values.iter().enumerate() {
        let y = (n - 1 - i) as f64;
        chart
            .draw_series(row.iter().enumerate().map(|(j, &v)| {
                let x = j as f64;
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], coolwarm(v).filled())
            }))
            .context("Failed to draw heatmap cells")?;
        chart
            .draw_series(
                row.iter()
                    .enumerate()
                    .map(|(j, &v)| Text::new(format_correlation(v), (j as f64, y), text_style.clone())),
            )
            .context("Failed to draw heatmap annotations")?;
    }

    Ok(())
}

fn draw_time_series<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    series: &TimeSeriesData,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let origin = series.buckets[0];
    let xs: Vec<f64> = series
        .buckets
        .iter()
        .map(|d| (*d - origin).num_days() as f64)
        .collect();

    let span = match series.unit {
        TimeUnit::Day => 1.0,
        TimeUnit::Week => 7.0,
        TimeUnit::Month => 30.0,
    };
    let last = xs.last().copied().unwrap_or(0.0);
    let x_range = (-span * 0.6)..(last + span * 0.6);

    let as_bars = spec.kind == ChartKind::Bar;
    let y_range = if as_bars {
        zero_based_range(series.values.iter().copied())
    } else {
        padded_range(series.values.iter().copied())
    };

    let mut chart = base_chart(root, &spec.title, x_range, y_range, 60)?;
    let date_labels = |v: &f64| date_label(origin, *v, series.unit);
    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&date_labels)
        .x_desc(axis_title(&spec.encodings.x))
        .y_desc(axis_title(&spec.encodings.y))
        .draw()
        .context("Failed to draw mesh")?;

    let color = palette.color(0);
    let points: Vec<(f64, f64)> = xs.iter().copied().zip(series.values.iter().copied()).collect();

    if as_bars {
        let half = span * 0.4;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, v)| Rectangle::new([(x - half, 0.0), (x + half, v)], color.filled())),
            )
            .context("Failed to draw bars")?;
    } else {
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
            .context("Failed to draw line series")?;
        // Markers only while they stay readable
        if points.len() <= 60 {
            chart
                .draw_series(points.iter().map(|&(x, v)| Circle::new((x, v), 3, color.filled())))
                .context("Failed to draw markers")?;
        }
    }

    Ok(())
}

fn date_label(origin: NaiveDate, offset: f64, unit: TimeUnit) -> String {
    let format = match unit {
        TimeUnit::Month => "%b %Y",
        TimeUnit::Day | TimeUnit::Week => "%Y-%m-%d",
    };
    origin
        .checked_add_signed(Duration::days(offset.round() as i64))
        .map(|d| d.format(format).to_string())
        .unwrap_or_default()
}

fn distinct_sorted(values: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = values
        .iter()
        .cloned()
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    transform::sort_categories(&mut keys);
    keys
}

fn draw_pairplot<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    table: &NumericTable,
    palette: &ColorPalette,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let n = table.columns.len();
    let root = root.titled(&spec.title, (FONT, 20)).context("Failed to draw title")?;
    let cells = root.split_evenly((n, n));
    let columns: Vec<Vec<f64>> = (0..n).map(|i| table.column(i)).collect();

    let point_colors: Vec<RGBColor> = match &table.hue {
        Some(hues) => {
            let keys = distinct_sorted(hues);
            let colors: HashMap<String, RGBColor> = palette.assign_colors(&keys);
            hues.iter().map(|h| colors[h]).collect()
        }
        None => vec![palette.color(0); table.rows.len()],
    };

    for (idx, cell) in cells.iter().enumerate() {
        let (row, col) = (idx / n, idx % n);
        let x_desc = if row == n - 1 { table.columns[col].as_str() } else { "" };
        let y_desc = if col == 0 { table.columns[row].as_str() } else { "" };

        if row == col {
            let bins = transform::histogram_bins(&columns[row], PAIRPLOT_BINS);
            let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
                continue;
            };
            let y_range = zero_based_range(bins.iter().map(|b| b.count as f64));
            let mut chart = pair_cell(cell, first.start..last.end, y_range)?;
            chart
                .configure_mesh()
                .disable_mesh()
                .x_labels(3)
                .y_labels(3)
                .x_desc(x_desc)
                .y_desc(y_desc)
                .draw()
                .context("Failed to draw mesh")?;
            let color = palette.color(0);
            chart
                .draw_series(
                    bins.iter()
                        .map(|b| Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], color.mix(0.8).filled())),
                )
                .context("Failed to draw bins")?;
        } else {
            let xs = &columns[col];
            let ys = &columns[row];
            let mut chart = pair_cell(cell, padded_range(xs.iter().copied()), padded_range(ys.iter().copied()))?;
            chart
                .configure_mesh()
                .disable_mesh()
                .x_labels(3)
                .y_labels(3)
                .x_desc(x_desc)
                .y_desc(y_desc)
                .draw()
                .context("Failed to draw mesh")?;
            chart
                .draw_series(
                    xs.iter()
                        .zip(ys.iter())
                        .zip(point_colors.iter())
                        .map(|((&x, &y), c)| Circle::new((x, y), 2, c.mix(0.6).filled())),
                )
                .context("Failed to draw points")?;
        }
    }

    Ok(())
}

fn pair_cell<'a, DB: DrawingBackend>(
    cell: &'a DrawingArea<DB, Shift>,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<Chart<'a, DB>>
where
    DB::ErrorType: 'static,
{
    ChartBuilder::on(cell)
        .margin(4)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build pair plot cell")
}
