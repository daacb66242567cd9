use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use tool_wear_monitor::config::{self, Config};
use tool_wear_monitor::error::WearError;
use tool_wear_monitor::history::HistoryStore;
use tool_wear_monitor::model_store::ModelStore;
use tool_wear_monitor::models::{GroupKey, SessionContext, FEATURE_COUNT};
use tool_wear_monitor::predict::Predictor;
use tool_wear_monitor::session::Session;
use tool_wear_monitor::table::FeatureTable;
use tool_wear_monitor::{report, trend};

#[derive(Parser)]
#[command(name = "tool-wear-monitor")]
#[command(about = "Predicts and tracks cutting tool wear from sensor measurements", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Override the model file from the configuration
    #[arg(long)]
    model: Option<PathBuf>,
    /// Override the history file from the configuration
    #[arg(long)]
    history: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict wear for a CSV of measurements without saving
    Predict {
        #[arg(long)]
        input: PathBuf,
    },
    /// Predict wear for a CSV of measurements and append it to the history
    Save {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        tool_type: String,
        #[arg(long)]
        usage_minutes: f64,
        #[arg(long)]
        material: String,
    },
    /// Show the most recent saved measurements
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Fit wear over time for one tool and material, or for everything
    Trend {
        #[arg(long, requires = "material")]
        tool_type: Option<String>,
        #[arg(long, requires = "tool_type")]
        material: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, requires = "material")]
        tool_type: Option<String>,
        #[arg(long, requires = "tool_type")]
        material: Option<String>,
        #[arg(long, default_value = "wear_report.md")]
        out: PathBuf,
    },
    /// Delete the saved history
    Reset,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(path) = cli.model {
        config.model.path = path;
    }
    if let Some(path) = cli.history {
        config.history.path = path;
    }

    let predictor = Predictor::new(config.model.features.clone());
    let store = HistoryStore::new(&config.history.path, config.model.features.clone());
    let mut session = Session::new(&store);

    match cli.command {
        Commands::Predict { input } => {
            let mut models = ModelStore::new(&config.model.path, FEATURE_COUNT);
            models.load().context("cannot start without a regression model")?;
            let table = FeatureTable::from_path(&input)?;
            let rows = session.stage(&predictor, models.model(), &table)?;

            println!("Predictions for {}:", input.display());
            for (index, row) in rows.iter().enumerate() {
                println!(
                    "- row {}: wear {:.2} ({}), {}% capacity left",
                    index + 1,
                    row.wear_value,
                    row.severity,
                    row.capacity_percent
                );
            }
        }
        Commands::Save {
            input,
            tool_type,
            usage_minutes,
            material,
        } => {
            let context = SessionContext::new(tool_type, usage_minutes, material)?;
            let mut models = ModelStore::new(&config.model.path, FEATURE_COUNT);
            models.load().context("cannot start without a regression model")?;
            let table = FeatureTable::from_path(&input)?;
            session.stage(&predictor, models.model(), &table)?;

            let summary = session
                .save(&context)
                .with_context(|| format!("failed to save {}", input.display()))?;
            println!(
                "Saved {} rows to {} ({} total).",
                summary.rows_added,
                store.path().display(),
                summary.total_rows
            );
        }
        Commands::History { limit } => {
            let record = session.record()?;
            if record.is_empty() {
                println!("No measurements saved yet.");
                return Ok(());
            }

            println!("Most recent measurements:");
            for row in record.iter().rev().take(limit) {
                println!(
                    "- {} {} on {} after {} min: wear {:.2} ({}), {}% capacity left",
                    row.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    row.tool_type,
                    row.material,
                    row.usage_minutes,
                    row.wear_value,
                    row.severity(),
                    row.capacity_percent
                );
            }
        }
        Commands::Trend {
            tool_type,
            material,
        } => {
            let filter = group_filter(tool_type, material);
            let record = session.record()?;
            match trend::fit(record, filter.as_ref()) {
                Ok(fit) => println!(
                    "wear = {:.4} x minutes + {:.2} ({} measurements over {:.0} minutes)",
                    fit.slope, fit.intercept, fit.points, fit.span_minutes
                ),
                Err(e @ WearError::InsufficientData { .. }) => {
                    info!("{e}");
                    println!("No trend available yet.");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Report {
            tool_type,
            material,
            out,
        } => {
            let filter = group_filter(tool_type, material);
            let record = session.record()?;
            let fit = trend::fit(record, filter.as_ref());
            let report = report::build_report(filter.as_ref(), record, &fit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Reset => {
            session.reset()?;
            println!("History cleared.");
        }
    }

    Ok(())
}

fn group_filter(tool_type: Option<String>, material: Option<String>) -> Option<GroupKey> {
    match (tool_type, material) {
        (Some(tool_type), Some(material)) => Some(GroupKey::new(tool_type, material)),
        _ => None,
    }
}
