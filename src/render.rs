// Rendering capability: ChartSpec -> encoded figure

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::chart::ChartSpec;
use crate::graph::PlottersRenderer;
use crate::vegalite::VegaLiteRenderer;
use crate::{OutputFormat, RenderOptions};

/// Encoded chart ready to be written out
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl RenderedChart {
    /// Write to `dir/<stem>.<ext>` and return the path
    pub fn write_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        let path = dir.join(format!("{}.{}", stem, self.format.extension()));
        fs::write(&path, &self.bytes)
            .with_context(|| format!("Failed to write chart to '{}'", path.display()))?;
        debug!(path = %path.display(), bytes = self.bytes.len(), "chart written");
        Ok(path)
    }
}

pub trait Renderer {
    fn render(&self, spec: &ChartSpec) -> Result<RenderedChart>;
}

/// Pick the backend for the requested output format
pub fn renderer_for(options: &RenderOptions) -> Box<dyn Renderer> {
    match options.format {
        OutputFormat::Png | OutputFormat::Svg => Box::new(PlottersRenderer::new(options.clone())),
        OutputFormat::Vegalite => Box::new(VegaLiteRenderer::new(options.clone())),
    }
}
