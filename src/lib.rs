// Library exports for bikedash

pub mod csv_reader;
pub mod data;
pub mod schema;
pub mod store;

// Selection -> chart spec
pub mod builder;
pub mod chart;
pub mod error;
pub mod selection;
pub mod transform;

// Hosts and capabilities
pub mod config;
pub mod dashboard;
pub mod graph;
pub mod input;
pub mod palette;
pub mod parser;
pub mod render;
pub mod vegalite;

use serde::Deserialize;

use crate::palette::PaletteName;

pub use builder::{build, ChartSpecBuilder};
pub use chart::ChartSpec;
pub use data::Dataset;
pub use error::InvalidSelection;
pub use selection::{ChartKind, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
    /// Vega-Lite v5 JSON
    #[serde(rename = "vegalite")]
    Vegalite,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
            OutputFormat::Vegalite => "vl.json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
    #[serde(default)]
    pub palette: PaletteName,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
            palette: PaletteName::default(),
        }
    }
}
