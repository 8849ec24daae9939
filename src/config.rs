// Dashboard configuration: JSON file merged with command-line flags

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::dashboard::{bike_overrides, DEFAULT_DATE_COLUMN};
use crate::schema::SchemaOverrides;
use crate::store::DataSource;
use crate::{OutputFormat, RenderOptions};

/// Which year the dashboard starts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawYear")]
pub enum YearFilter {
    /// Earliest year in the data
    #[default]
    First,
    All,
    Year(i32),
}

impl YearFilter {
    /// Concrete year to filter on, given the years present
    pub fn resolve(&self, years: &[i32]) -> Option<i32> {
        match self {
            YearFilter::First => years.first().copied(),
            YearFilter::All => None,
            YearFilter::Year(y) => Some(*y),
        }
    }
}

impl FromStr for YearFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(YearFilter::First),
            "all" => Ok(YearFilter::All),
            other => other
                .parse::<i32>()
                .map(YearFilter::Year)
                .map_err(|_| format!("'{}' is not a year (expected a number, 'first' or 'all')", s)),
        }
    }
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearFilter::First => f.write_str("first"),
            YearFilter::All => f.write_str("all"),
            YearFilter::Year(y) => write!(f, "{}", y),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawYear {
    Number(i32),
    Text(String),
}

impl TryFrom<RawYear> for YearFilter {
    type Error = String;

    fn try_from(raw: RawYear) -> Result<Self, Self::Error> {
        match raw {
            RawYear::Number(y) => Ok(YearFilter::Year(y)),
            RawYear::Text(s) => s.parse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// CSV path, `-` for stdin
    pub data: Option<String>,
    pub year: YearFilter,
    pub output_dir: PathBuf,
    pub render: RenderOptions,
    /// Columns forced to categorical; unset means the preset's own list
    pub categorical: Option<Vec<String>>,
    pub date_column: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data: None,
            year: YearFilter::default(),
            output_dir: PathBuf::from("dashboard"),
            render: RenderOptions::default(),
            categorical: None,
            date_column: DEFAULT_DATE_COLUMN.to_string(),
        }
    }
}

/// Values given on the command line; each one present wins over the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub data: Option<String>,
    pub year: Option<YearFilter>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub categorical: Option<Vec<String>>,
}

impl DashboardConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config '{}'", path.display()))?;
        debug!(path = %path.display(), ?config, "config loaded");
        Ok(config)
    }

    /// File values when a path is given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(data) = overrides.data {
            self.data = Some(data);
        }
        if let Some(year) = overrides.year {
            self.year = year;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        if let Some(format) = overrides.format {
            self.render.format = format;
        }
        if let Some(width) = overrides.width {
            self.render.width = width;
        }
        if let Some(height) = overrides.height {
            self.render.height = height;
        }
        if let Some(categorical) = overrides.categorical {
            self.categorical = Some(categorical);
        }
        self
    }

    pub fn data_source(&self) -> Result<DataSource> {
        match self.data.as_deref() {
            Some(arg) => Ok(DataSource::from_arg(arg)),
            None => bail!("No dataset given (use --data or set \"data\" in the config file)"),
        }
    }

    /// Categorical overrides. Without an explicit list, the bike-share
    /// factor columns apply only when `bike_preset` is set.
    pub fn overrides(&self, bike_preset: bool) -> SchemaOverrides {
        match &self.categorical {
            Some(names) => SchemaOverrides::categorical(names),
            None if bike_preset => bike_overrides(),
            None => SchemaOverrides::default(),
        }
    }
}
