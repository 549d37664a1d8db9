use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cydash::layout::generate_layout;
use cydash::render::render_chart;
use cydash::{
    ClickPayload, DashboardConfig, Dataset, Engine, FilterState, RenderOptions, Session,
    TriggerEvent,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "cydash")]
#[command(about = "Cyber-events dashboard: filters, chart specs and chart images from an event extract", long_about = None)]
struct Args {
    /// Dashboard configuration (JSON)
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Event dataset (.csv or .json)
    #[arg(long, global = true, default_value = "events.csv")]
    data: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the dashboard layout (filter panel and chart grid) as JSON
    Layout,
    /// Run one reconciliation pass and print the filter state and charts
    Reconcile {
        /// Current filter values, a JSON object keyed by filter id
        #[arg(long)]
        filters: Option<PathBuf>,
        /// The trigger event (JSON)
        #[arg(long, required_unless_present = "element", conflicts_with = "element")]
        trigger: Option<PathBuf>,
        /// Build the trigger from a UI element id instead
        #[arg(long)]
        element: Option<String>,
        /// Dropdown value when --element names a filter
        #[arg(long, requires = "element")]
        value: Option<String>,
        /// Click payload (JSON) when --element names a visualization
        #[arg(long, requires = "element")]
        payload: Option<PathBuf>,
    },
    /// Apply a JSON array of triggers from a clean state and print the final pass
    Replay {
        #[arg(long)]
        triggers: PathBuf,
    },
    /// Write one PNG per visualization
    Render {
        #[arg(long)]
        filters: Option<PathBuf>,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 800)]
        width: u32,
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    let dataset = Dataset::load(&args.data)
        .with_context(|| format!("Failed to load dataset {}", args.data.display()))?;
    let config = DashboardConfig::load(&args.config, &dataset)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    let engine = Engine::new(&config, &dataset);

    match args.command {
        Command::Layout => print_json(&generate_layout(&config, &dataset)),
        Command::Reconcile {
            filters,
            trigger,
            element,
            value,
            payload,
        } => {
            let current = read_filters(filters.as_deref(), &config)?;
            let trigger: TriggerEvent = match (trigger, element) {
                (Some(path), _) => read_json(&path)?,
                (None, Some(id)) => {
                    let element = config
                        .element(&id)
                        .with_context(|| format!("Unknown element {}", id))?;
                    let payload: ClickPayload = match payload {
                        Some(path) => read_json(&path)?,
                        None => ClickPayload::default(),
                    };
                    TriggerEvent::from_element(element, value, payload)
                }
                (None, None) => anyhow::bail!("Either --trigger or --element is required"),
            };
            print_json(&engine.reconcile(&current, &trigger))
        }
        Command::Replay { triggers } => {
            let triggers: Vec<TriggerEvent> = read_json(&triggers)?;
            let mut session = Session::new(engine);
            print_json(&session.replay(&triggers))
        }
        Command::Render {
            filters,
            out,
            width,
            height,
        } => {
            let current = read_filters(filters.as_deref(), &config)?;
            let session = Session::with_filters(engine, current);
            let options = RenderOptions { width, height };
            fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            for chart in session.current().charts {
                let png = render_chart(&chart, &options)
                    .with_context(|| format!("Failed to render {}", chart.id))?;
                let path = out.join(format!("{}.png", chart.id));
                fs::write(&path, png)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                log::info!("wrote {}", path.display());
            }
            Ok(())
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_filters(path: Option<&Path>, config: &DashboardConfig) -> Result<FilterState> {
    match path {
        Some(path) => {
            let values: HashMap<String, Option<String>> = read_json(path)?;
            Ok(FilterState::from_map(&config.filters, values))
        }
        None => Ok(FilterState::unset(&config.filters)),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value).context("Failed to write JSON")?;
    writeln!(handle).context("Failed to write to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
