// Event-driven dashboard: panels, dispatch, bike-share preset and explorer flow

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::builder::ChartSpecBuilder;
use crate::data::Dataset;
use crate::input::{collect_input, InputKind, InputSource, Prompt};
use crate::render::{RenderedChart, Renderer};
use crate::schema::{ColumnType, SchemaOverrides};
use crate::selection::{Aggregation, ChartKind, Selection, TimeUnit, DEFAULT_BIN_COUNT, MAX_BIN_COUNT, MIN_BIN_COUNT};

/// Integer-coded factor columns of the bike-share `day.csv`
pub const BIKE_CATEGORICAL: [&str; 7] = [
    "season",
    "yr",
    "mnth",
    "holiday",
    "weekday",
    "workingday",
    "weathersit",
];

pub const DEFAULT_DATE_COLUMN: &str = "dteday";

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn bike_overrides() -> SchemaOverrides {
    SchemaOverrides::categorical(BIKE_CATEGORICAL)
}

/// A named slot on the dashboard holding one selection
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: String,
    pub heading: String,
    pub selection: Selection,
}

impl Panel {
    pub fn new(id: impl Into<String>, heading: impl Into<String>, selection: Selection) -> Self {
        Self {
            id: id.into(),
            heading: heading.into(),
            selection,
        }
    }
}

/// What a panel currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum PanelOutput {
    Chart(RenderedChart),
    /// Inline message in place of the chart
    Notice(String),
}

impl PanelOutput {
    /// Write to `dir/<id>.<ext>`, or `dir/<id>.txt` for notices
    pub fn write_to(&self, dir: &Path, id: &str) -> Result<PathBuf> {
        match self {
            PanelOutput::Chart(chart) => chart.write_to(dir, id),
            PanelOutput::Notice(message) => {
                let path = dir.join(format!("{}.txt", id));
                fs::write(&path, format!("{}\n", message))
                    .with_context(|| format!("Failed to write notice to '{}'", path.display()))?;
                Ok(path)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    SelectionChanged { panel: String, selection: Selection },
    /// `None` shows every year
    YearChanged(Option<i32>),
}

/// Holds the loaded dataset, the current year view and every panel's output.
/// Events recompute only the panels they touch.
pub struct Dashboard {
    dataset: Arc<Dataset>,
    view: Dataset,
    date_column: String,
    year: Option<i32>,
    panels: Vec<Panel>,
    outputs: BTreeMap<String, PanelOutput>,
    renderer: Box<dyn Renderer>,
}

impl Dashboard {
    pub fn new(
        dataset: Arc<Dataset>,
        panels: Vec<Panel>,
        renderer: Box<dyn Renderer>,
        date_column: impl Into<String>,
    ) -> Self {
        Self {
            view: (*dataset).clone(),
            dataset,
            date_column: date_column.into(),
            year: None,
            panels,
            outputs: BTreeMap::new(),
            renderer,
        }
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    /// Rows currently shown
    pub fn view(&self) -> &Dataset {
        &self.view
    }

    pub fn output(&self, panel: &str) -> Option<&PanelOutput> {
        self.outputs.get(panel)
    }

    pub fn years(&self) -> Result<Vec<i32>> {
        self.dataset.years(&self.date_column)
    }

    /// Restrict the view to one year without re-rendering
    pub fn set_year(&mut self, year: Option<i32>) -> Result<()> {
        self.view = match year {
            Some(y) => self.dataset.filter_year(&self.date_column, y)?,
            None => (*self.dataset).clone(),
        };
        self.year = year;
        info!(year = ?year, rows = self.view.row_count(), "year filter applied");
        Ok(())
    }

    /// Render every panel; returns the ids rendered
    pub fn render_all(&mut self) -> Result<Vec<String>> {
        let ids: Vec<String> = self.panels.iter().map(|p| p.id.clone()).collect();
        for id in &ids {
            self.refresh(id)?;
        }
        Ok(ids)
    }

    /// Apply an event and re-render what it affects; returns those panel ids
    pub fn dispatch(&mut self, event: DashboardEvent) -> Result<Vec<String>> {
        match event {
            DashboardEvent::SelectionChanged { panel, selection } => {
                match self.panels.iter_mut().find(|p| p.id == panel) {
                    Some(existing) => existing.selection = selection,
                    None => {
                        debug!(panel = %panel, "adding panel");
                        self.panels.push(Panel::new(panel.clone(), panel.clone(), selection));
                    }
                }
                self.refresh(&panel)?;
                Ok(vec![panel])
            }
            DashboardEvent::YearChanged(year) => {
                self.set_year(year)?;
                self.render_all()
            }
        }
    }

    fn refresh(&mut self, id: &str) -> Result<()> {
        let Some(panel) = self.panels.iter().find(|p| p.id == id) else {
            bail!("Unknown panel '{}'", id);
        };
        let output = render_panel(&self.view, &panel.selection, self.renderer.as_ref())
            .with_context(|| format!("Failed to render panel '{}'", id))?;
        self.outputs.insert(id.to_string(), output);
        Ok(())
    }

    /// Write the given panels' outputs into `dir`
    pub fn write_outputs(&self, dir: &Path, ids: &[String]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;
        let mut written = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(output) = self.outputs.get(id) {
                written.push(output.write_to(dir, id)?);
            }
        }
        Ok(written)
    }

    /// Export the rows in view as `dir/raw.csv`
    pub fn write_raw(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;
        let path = dir.join("raw.csv");
        let file = File::create(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        self.view.write_csv(file)?;
        info!(
            path = %path.display(),
            rows = self.view.row_count(),
            total = self.dataset.row_count(),
            "raw data exported"
        );
        Ok(path)
    }
}

/// Build and render one selection. An invalid selection becomes a notice;
/// only rendering failures are errors.
pub fn render_panel(dataset: &Dataset, selection: &Selection, renderer: &dyn Renderer) -> Result<PanelOutput> {
    match ChartSpecBuilder::new(dataset).build(selection) {
        Ok(spec) => Ok(PanelOutput::Chart(renderer.render(&spec)?)),
        Err(e) => {
            warn!(kind = %selection.kind, error = %e, "invalid selection");
            Ok(PanelOutput::Notice(e.to_string()))
        }
    }
}

fn with_labels(mut selection: Selection, labels: &[(&str, &str)]) -> Selection {
    for (value, display) in labels {
        selection = selection.label(*value, *display);
    }
    selection
}

/// Fixed panels of the bike-share dashboard
pub fn bike_share_panels() -> Vec<Panel> {
    let months: Vec<(String, &str)> = MONTH_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| ((i + 1).to_string(), *name))
        .collect();
    let month_labels: Vec<(&str, &str)> = months.iter().map(|(k, v)| (k.as_str(), *v)).collect();

    let seasons = [("1", "Spring"), ("2", "Summer"), ("3", "Fall"), ("4", "Winter")];
    let weather = [
        ("1", "Clear"),
        ("2", "Mist"),
        ("3", "Light Snow/Rain"),
        ("4", "Heavy Rain"),
    ];
    let day_types = [("0", "Non-working Day"), ("1", "Working Day")];

    vec![
        Panel::new(
            "rider_share",
            "Share of casual and registered riders",
            with_labels(
                Selection::new(ChartKind::Pie)
                    .columns(["casual", "registered"])
                    .aggregate(Aggregation::Sum)
                    .donut()
                    .title("Casual vs Registered Riders"),
                &[("casual", "Casual"), ("registered", "Registered")],
            ),
        ),
        Panel::new(
            "monthly_distribution",
            "Rentals per month",
            with_labels(
                Selection::new(ChartKind::Bar)
                    .x("mnth")
                    .columns(["casual", "registered"])
                    .aggregate(Aggregation::Sum)
                    .stacked()
                    .horizontal()
                    .title("Monthly Rental Distribution"),
                &month_labels,
            ),
        ),
        Panel::new(
            "weather_correlation",
            "Do weather conditions affect rentals?",
            Selection::new(ChartKind::Heatmap)
                .columns(["temp", "hum", "windspeed", "casual", "registered", "cnt"])
                .title("Correlation of Weather and Rentals"),
        ),
        Panel::new(
            "daily_rentals",
            "Daily Bike Rentals",
            Selection::new(ChartKind::Line)
                .x("dteday")
                .y("cnt")
                .time_unit(TimeUnit::Day)
                .title("Daily Bike Rentals"),
        ),
        Panel::new(
            "monthly_rentals",
            "Monthly Bike Rentals",
            Selection::new(ChartKind::Line)
                .x("dteday")
                .y("cnt")
                .time_unit(TimeUnit::Month)
                .title("Monthly Bike Rentals"),
        ),
        Panel::new(
            "seasonal_rentals",
            "Average Bike Rentals by Season",
            with_labels(
                Selection::new(ChartKind::Bar)
                    .x("season")
                    .y("cnt")
                    .aggregate(Aggregation::Mean)
                    .title("Average Bike Rentals by Season"),
                &seasons,
            ),
        ),
        Panel::new(
            "weather_impact",
            "Impact of Weather on Bike Rentals",
            with_labels(
                Selection::new(ChartKind::Box)
                    .x("weathersit")
                    .y("cnt")
                    .title("Impact of Weather on Bike Rentals"),
                &weather,
            ),
        ),
        Panel::new(
            "temp_impact",
            "Impact of Temperature on Bike Rentals",
            Selection::new(ChartKind::Scatter)
                .x("temp")
                .y("cnt")
                .title("Impact of Temperature on Bike Rentals"),
        ),
        Panel::new(
            "humidity_impact",
            "Impact of Humidity on Bike Rentals",
            Selection::new(ChartKind::Scatter)
                .x("hum")
                .y("cnt")
                .title("Impact of Humidity on Bike Rentals"),
        ),
        Panel::new(
            "windspeed_impact",
            "Impact of Wind Speed on Bike Rentals",
            Selection::new(ChartKind::Scatter)
                .x("windspeed")
                .y("cnt")
                .title("Impact of Wind Speed on Bike Rentals"),
        ),
        Panel::new(
            "day_type_impact",
            "Impact of Day Type on Bike Rentals",
            with_labels(
                Selection::new(ChartKind::Box)
                    .x("workingday")
                    .y("cnt")
                    .title("Impact of Day Type on Bike Rentals"),
                &day_types,
            ),
        ),
    ]
}

// =============================================================================
// Explorer
// =============================================================================

fn pick_one(source: &mut dyn InputSource, label: &str, options: &[String], kind_name: &str) -> Result<String> {
    if options.is_empty() {
        bail!("No suitable column for '{}' in this dataset ({} chart)", label, kind_name);
    }
    collect_input(source, label, options, InputKind::SelectOne, None)?.into_one()
}

/// Optional categorical colour column; `none` leaves it unset
fn pick_hue(source: &mut dyn InputSource, categorical: &[String]) -> Result<Option<String>> {
    let mut hues = vec!["none".to_string()];
    hues.extend(categorical.iter().cloned());
    let hue = collect_input(source, "Color by", &hues, InputKind::SelectOne, Some("none"))?.into_one()?;
    Ok((hue != "none").then_some(hue))
}

fn names<T>(items: &[T], name: impl Fn(&T) -> &'static str) -> Vec<String> {
    items.iter().map(|i| name(i).to_string()).collect()
}

/// Ask the user for a chart kind and the columns it needs
pub fn explore_selection(dataset: &Dataset, source: &mut dyn InputSource) -> Result<Selection> {
    let schema = dataset.schema();
    let numeric = schema.numeric();
    let categorical = schema.categorical();

    let kinds = names(&ChartKind::ALL, ChartKind::name);
    let kind: ChartKind = collect_input(source, "Chart type", &kinds, InputKind::Radio, Some("scatter"))?
        .into_one()?
        .parse()?;
    let name = kind.name();
    let mut selection = Selection::new(kind);

    match kind {
        ChartKind::Bar | ChartKind::Pie | ChartKind::Box => {
            selection.x = Some(pick_one(source, "Category column", &categorical, name)?);
            selection.y = Some(pick_one(source, "Value column", &numeric, name)?);
            if kind != ChartKind::Box {
                let reducers = names(&[Aggregation::Mean, Aggregation::Sum], Aggregation::name);
                let agg = collect_input(source, "Aggregation", &reducers, InputKind::Radio, Some("mean"))?.into_one()?;
                selection.aggregation = Some(agg.parse::<Aggregation>()?);
            }
        }
        ChartKind::Scatter => {
            selection.x = Some(pick_one(source, "X column", &numeric, name)?);
            selection.y = Some(pick_one(source, "Y column", &numeric, name)?);
            selection.group = pick_hue(source, &categorical)?;
        }
        ChartKind::Histogram => {
            selection.x = Some(pick_one(source, "Column", &numeric, name)?);
            let bins = source
                .collect(&Prompt::slider(
                    "Bins",
                    MIN_BIN_COUNT as f64,
                    MAX_BIN_COUNT as f64,
                    DEFAULT_BIN_COUNT as f64,
                ))?
                .into_number()?;
            selection.bin_count = Some(bins.round() as usize);
        }
        ChartKind::Heatmap | ChartKind::Pairplot => {
            let all = numeric.join(",");
            selection.columns =
                collect_input(source, "Columns", &numeric, InputKind::SelectMany, Some(all.as_str()))?.into_many()?;
            if kind == ChartKind::Pairplot && !categorical.is_empty() {
                selection.group = pick_hue(source, &categorical)?;
            }
        }
        ChartKind::Line => {
            let mut xs = schema.temporal();
            xs.extend(numeric.iter().cloned());
            let x = pick_one(source, "X column", &xs, name)?;
            if schema.column_type(&x) == Some(ColumnType::Temporal) {
                let units = names(&TimeUnit::ALL, TimeUnit::name);
                let unit = collect_input(source, "Time unit", &units, InputKind::Radio, Some("day"))?.into_one()?;
                selection.time_unit = Some(unit.parse()?);
            }
            selection.x = Some(x);
            selection.y = Some(pick_one(source, "Y column", &numeric, name)?);
        }
    }

    debug!(?selection, "explorer selection");
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedInput;
    use crate::OutputFormat;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records which chart titles it was asked to render
    struct RecordingRenderer {
        titles: Rc<RefCell<Vec<String>>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, spec: &crate::chart::ChartSpec) -> Result<RenderedChart> {
            self.titles.borrow_mut().push(spec.title.clone());
            Ok(RenderedChart {
                format: OutputFormat::Vegalite,
                bytes: spec.title.as_bytes().to_vec(),
            })
        }
    }

    fn bike_dataset() -> Arc<Dataset> {
        let headers = vec![
            "instant", "dteday", "season", "yr", "mnth", "holiday", "weekday", "workingday",
            "weathersit", "temp", "atemp", "hum", "windspeed", "casual", "registered", "cnt",
        ];
        let rows = vec![
            vec!["1", "2011-01-01", "1", "0", "1", "0", "6", "0", "2", "0.344", "0.363", "0.805", "0.160", "331", "654", "985"],
            vec!["2", "2011-01-02", "1", "0", "1", "0", "0", "0", "2", "0.363", "0.353", "0.696", "0.248", "131", "670", "801"],
            vec!["3", "2011-01-03", "1", "0", "1", "0", "1", "1", "1", "0.196", "0.189", "0.437", "0.248", "120", "1229", "1349"],
            vec!["4", "2011-02-04", "1", "0", "2", "0", "5", "1", "1", "0.200", "0.212", "0.590", "0.160", "108", "1454", "1562"],
            vec!["5", "2012-06-05", "2", "1", "6", "0", "2", "1", "1", "0.620", "0.590", "0.640", "0.180", "900", "4200", "5100"],
            vec!["6", "2012-06-06", "2", "1", "6", "0", "3", "1", "3", "0.610", "0.580", "0.880", "0.300", "200", "2300", "2500"],
        ];
        Arc::new(
            Dataset::from_records(
                headers.iter().map(|s| s.to_string()).collect(),
                rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
                &bike_overrides(),
            )
            .unwrap(),
        )
    }

    fn dashboard() -> (Dashboard, Rc<RefCell<Vec<String>>>) {
        let titles = Rc::new(RefCell::new(Vec::new()));
        let renderer = RecordingRenderer { titles: Rc::clone(&titles) };
        let dash = Dashboard::new(bike_dataset(), bike_share_panels(), Box::new(renderer), DEFAULT_DATE_COLUMN);
        (dash, titles)
    }

    #[test]
    fn test_all_preset_panels_render() {
        let (mut dash, titles) = dashboard();
        let ids = dash.render_all().unwrap();
        assert_eq!(ids.len(), 11);
        for id in &ids {
            assert!(
                matches!(dash.output(id), Some(PanelOutput::Chart(_))),
                "panel {} did not render: {:?}",
                id,
                dash.output(id)
            );
        }
        assert_eq!(titles.borrow().len(), 11);
    }

    #[test]
    fn test_selection_change_rerenders_only_that_panel() {
        let (mut dash, titles) = dashboard();
        dash.render_all().unwrap();
        titles.borrow_mut().clear();

        let changed = dash
            .dispatch(DashboardEvent::SelectionChanged {
                panel: "seasonal_rentals".to_string(),
                selection: Selection::new(ChartKind::Bar).x("season").y("casual").title("Casual by season"),
            })
            .unwrap();

        assert_eq!(changed, vec!["seasonal_rentals"]);
        assert_eq!(*titles.borrow(), vec!["Casual by season".to_string()]);
    }

    #[test]
    fn test_invalid_selection_becomes_notice() {
        let (mut dash, titles) = dashboard();
        dash.render_all().unwrap();
        titles.borrow_mut().clear();

        dash.dispatch(DashboardEvent::SelectionChanged {
            panel: "weather_correlation".to_string(),
            selection: Selection::new(ChartKind::Heatmap).columns(["temp"]),
        })
        .unwrap();

        match dash.output("weather_correlation") {
            Some(PanelOutput::Notice(msg)) => assert!(msg.contains("at least 2")),
            other => panic!("Expected notice, got {:?}", other),
        }
        assert!(titles.borrow().is_empty());
        // Other panels keep their charts
        assert!(matches!(dash.output("seasonal_rentals"), Some(PanelOutput::Chart(_))));
    }

    #[test]
    fn test_year_change_filters_and_rerenders_all() {
        let (mut dash, _) = dashboard();
        assert_eq!(dash.years().unwrap(), vec![2011, 2012]);

        let changed = dash.dispatch(DashboardEvent::YearChanged(Some(2011))).unwrap();
        assert_eq!(changed.len(), 11);
        assert_eq!(dash.view().row_count(), 4);
        assert_eq!(dash.year(), Some(2011));

        dash.dispatch(DashboardEvent::YearChanged(None)).unwrap();
        assert_eq!(dash.view().row_count(), 6);
    }

    #[test]
    fn test_new_panel_added_on_demand() {
        let (mut dash, _) = dashboard();
        dash.dispatch(DashboardEvent::SelectionChanged {
            panel: "extra".to_string(),
            selection: Selection::new(ChartKind::Histogram).x("temp"),
        })
        .unwrap();
        assert_eq!(dash.panels().len(), 12);
        assert!(dash.output("extra").is_some());
    }

    #[test]
    fn test_write_outputs_and_raw() {
        let (mut dash, _) = dashboard();
        dash.set_year(Some(2012)).unwrap();
        let ids = dash.render_all().unwrap();
        dash.dispatch(DashboardEvent::SelectionChanged {
            panel: "bad".to_string(),
            selection: Selection::new(ChartKind::Scatter).x("season").y("cnt"),
        })
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut all = ids.clone();
        all.push("bad".to_string());
        let written = dash.write_outputs(dir.path(), &all).unwrap();
        assert_eq!(written.len(), 12);
        assert!(dir.path().join("seasonal_rentals.vl.json").exists());
        assert!(dir.path().join("bad.txt").exists());

        let raw = dash.write_raw(dir.path()).unwrap();
        let text = fs::read_to_string(raw).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("instant,dteday"));
    }

    #[test]
    fn test_explore_scatter() {
        let ds = bike_dataset();
        let mut source = ScriptedInput::new(["scatter", "temp", "cnt", "season"]);
        let sel = explore_selection(&ds, &mut source).unwrap();
        assert_eq!(sel.kind, ChartKind::Scatter);
        assert_eq!(sel.x.as_deref(), Some("temp"));
        assert_eq!(sel.group.as_deref(), Some("season"));
    }

    #[test]
    fn test_explore_heatmap_defaults_to_all_numeric() {
        let ds = bike_dataset();
        let mut source = ScriptedInput::new(["heatmap", ""]);
        let sel = explore_selection(&ds, &mut source).unwrap();
        assert_eq!(sel.columns, ds.schema().numeric());
    }

    #[test]
    fn test_explore_histogram_and_line() {
        let ds = bike_dataset();
        let mut source = ScriptedInput::new(["histogram", "hum", "12"]);
        let sel = explore_selection(&ds, &mut source).unwrap();
        assert_eq!(sel.bin_count, Some(12));

        let mut source = ScriptedInput::new(["line", "dteday", "month", "cnt"]);
        let sel = explore_selection(&ds, &mut source).unwrap();
        assert_eq!(sel.time_unit, Some(TimeUnit::Month));
        assert_eq!(sel.y.as_deref(), Some("cnt"));
    }
}
