use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bikedash::config::{ConfigOverrides, DashboardConfig, YearFilter};
use bikedash::dashboard::{bike_share_panels, explore_selection, render_panel, Dashboard, DashboardEvent, PanelOutput};
use bikedash::input::LineInput;
use bikedash::parser::{self, Command};
use bikedash::render::renderer_for;
use bikedash::store::{DataSource, DatasetStore};
use bikedash::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "bikedash")]
#[command(about = "Explore bike-share CSV data as charts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every panel of the bike-share dashboard
    Dashboard {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        render: RenderArgs,
        /// Year to show: a number, 'first' or 'all'
        #[arg(long)]
        year: Option<YearFilter>,
        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the filtered rows as raw.csv
        #[arg(long)]
        show_raw: bool,
    },
    /// Render one chart from a selection such as 'bar(x: season, y: cnt)'
    Explore {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        render: RenderArgs,
        /// Selection; prompts for one when omitted
        selection: Option<String>,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Read 'panel = selection' and 'year = N' lines from stdin, re-rendering as they arrive
    Interactive {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        render: RenderArgs,
        #[arg(long)]
        year: Option<YearFilter>,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Start with the bike-share panels already rendered
        #[arg(long)]
        preset: bool,
    },
    /// Print the inferred column types as JSON
    Schema {
        #[command(flatten)]
        data: DataArgs,
    },
}

#[derive(Args, Debug)]
struct DataArgs {
    /// CSV file, '-' for stdin
    #[arg(long)]
    data: Option<String>,
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Columns to treat as categorical (comma separated)
    #[arg(long, value_delimiter = ',')]
    categorical: Option<Vec<String>>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
}

fn load_config(
    data: DataArgs,
    render: Option<RenderArgs>,
    year: Option<YearFilter>,
    out: Option<PathBuf>,
) -> Result<DashboardConfig> {
    let file = DashboardConfig::load_or_default(data.config.as_deref())?;
    let render = render.unwrap_or(RenderArgs {
        format: None,
        width: None,
        height: None,
    });
    Ok(file.merge(ConfigOverrides {
        data: data.data,
        year,
        output_dir: out,
        format: render.format,
        width: render.width,
        height: render.height,
        categorical: data.categorical,
    }))
}

fn open_store(config: &DashboardConfig, bike_preset: bool) -> Result<DatasetStore> {
    Ok(DatasetStore::new(config.data_source()?, config.overrides(bike_preset)))
}

fn run_dashboard(config: DashboardConfig, show_raw: bool) -> Result<()> {
    let dataset = open_store(&config, true)?.get().context("Failed to load dataset")?;
    let mut dashboard = Dashboard::new(
        dataset,
        bike_share_panels(),
        renderer_for(&config.render),
        config.date_column.clone(),
    );

    let year = config.year.resolve(&dashboard.years()?);
    dashboard.set_year(year)?;
    let ids = dashboard.render_all()?;

    let dir = &config.output_dir;
    let mut stdout = io::stdout().lock();
    for path in dashboard.write_outputs(dir, &ids)? {
        writeln!(stdout, "{}", path.display()).context("Failed to write to stdout")?;
    }
    if show_raw {
        let path = dashboard.write_raw(dir)?;
        writeln!(stdout, "{}", path.display()).context("Failed to write to stdout")?;
    }

    let notices = ids
        .iter()
        .filter(|id| matches!(dashboard.output(id), Some(PanelOutput::Notice(_))))
        .count();
    info!(panels = ids.len(), notices, dir = %dir.display(), "dashboard written");
    Ok(())
}

fn run_explore(config: DashboardConfig, selection: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let store = open_store(&config, false)?;
    let dataset = store.get().context("Failed to load dataset")?;

    let selection = match selection {
        Some(text) => parser::parse_selection(&text)?,
        None => {
            if config.data_source()? == DataSource::Stdin {
                bail!("Interactive prompts need the dataset from a file, not stdin");
            }
            let stdin = io::stdin();
            let mut source = LineInput::new(stdin.lock(), io::stderr());
            explore_selection(&dataset, &mut source)?
        }
    };

    let renderer = renderer_for(&config.render);
    match render_panel(&dataset, &selection, renderer.as_ref())? {
        PanelOutput::Chart(chart) => match out {
            Some(path) => {
                std::fs::write(&path, &chart.bytes)
                    .with_context(|| format!("Failed to write chart to '{}'", path.display()))?;
                info!(path = %path.display(), "chart written");
            }
            None => {
                let mut handle = io::stdout().lock();
                handle
                    .write_all(&chart.bytes)
                    .context("Failed to write chart to stdout")?;
                handle.flush().context("Failed to flush stdout")?;
            }
        },
        PanelOutput::Notice(message) => bail!("{}", message),
    }
    Ok(())
}

fn run_interactive(config: DashboardConfig, preset: bool) -> Result<()> {
    if config.data_source()? == DataSource::Stdin {
        bail!("Interactive mode reads commands from stdin; give the dataset as a file");
    }
    let dataset = open_store(&config, preset)?.get().context("Failed to load dataset")?;
    let panels = if preset { bike_share_panels() } else { Vec::new() };
    let mut dashboard = Dashboard::new(dataset, panels, renderer_for(&config.render), config.date_column.clone());

    let has_dates = dashboard.years().is_ok();
    if has_dates {
        let year = config.year.resolve(&dashboard.years()?);
        dashboard.set_year(year)?;
    }

    let dir = config.output_dir.clone();
    let mut stdout = io::stdout().lock();
    let ids = dashboard.render_all()?;
    for path in dashboard.write_outputs(&dir, &ids)? {
        writeln!(stdout, "{}", path.display()).context("Failed to write to stdout")?;
    }

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read command")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event = match parser::parse_command(line) {
            Ok(Command::Select { panel, selection }) => DashboardEvent::SelectionChanged { panel, selection },
            Ok(Command::Year(year)) => {
                if !has_dates {
                    warn!(date_column = %config.date_column, "dataset has no date column to filter by year");
                    continue;
                }
                DashboardEvent::YearChanged(year)
            }
            Err(e) => {
                warn!(error = %e, "ignoring command");
                continue;
            }
        };

        let changed = dashboard.dispatch(event)?;
        for path in dashboard.write_outputs(&dir, &changed)? {
            writeln!(stdout, "{}", path.display()).context("Failed to write to stdout")?;
        }
        stdout.flush().context("Failed to flush stdout")?;
    }
    Ok(())
}

fn run_schema(config: DashboardConfig) -> Result<()> {
    let dataset = open_store(&config, false)?.get().context("Failed to load dataset")?;
    let json = serde_json::to_string_pretty(dataset.schema()).context("Failed to serialize schema")?;
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dashboard {
            data,
            render,
            year,
            out,
            show_raw,
        } => run_dashboard(load_config(data, Some(render), year, out)?, show_raw),
        Commands::Explore {
            data,
            render,
            selection,
            out,
        } => run_explore(load_config(data, Some(render), None, None)?, selection, out),
        Commands::Interactive {
            data,
            render,
            year,
            out,
            preset,
        } => run_interactive(load_config(data, Some(render), year, out)?, preset),
        Commands::Schema { data } => run_schema(load_config(data, None, None, None)?),
    }
}
