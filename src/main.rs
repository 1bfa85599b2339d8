use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gridcast::config::Config;
use gridcast::domain::Target;
use gridcast::forecast::{FeatureSchema, WeatherFeed};
use gridcast::io::{load_generation_csv, load_weather_csv, parse_timestamp};
use gridcast::ml::{ModelRegistry, ModelStore};
use gridcast::service::{ForecastRequest, ForecastService, TrainingJob};
use gridcast::telemetry::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (missing file means built-in defaults)
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train models from historical weather and generation feeds
    Train {
        #[arg(long)]
        weather: PathBuf,
        #[arg(long)]
        generation: PathBuf,
        /// Targets to train (default: all)
        #[arg(long = "target")]
        targets: Vec<Target>,
    },
    /// Forecast an hourly horizon from stored models and a weather feed
    Forecast {
        #[arg(long)]
        weather: PathBuf,
        /// RFC 3339, or local time in the operating timezone
        #[arg(long)]
        start: String,
        #[arg(long, default_value_t = 24)]
        hours: u32,
        /// Targets to forecast (default: all)
        #[arg(long = "target")]
        targets: Vec<Target>,
    },
}

fn or_all(targets: Vec<Target>) -> Vec<Target> {
    if targets.is_empty() {
        Target::iter().collect()
    } else {
        targets
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    let tz = cfg.timezone.tz()?;

    match cli.command {
        Commands::Train {
            weather,
            generation,
            targets,
        } => {
            let weather = load_weather_csv(&weather, &tz)?;
            let generation = load_generation_csv(&generation, &tz)?;
            let registry = Arc::new(ModelRegistry::new());
            let job = TrainingJob::from_config(&cfg, registry)?;

            let results = job.run_all(&or_all(targets), &weather, &generation).await;
            let mut failed = Vec::new();
            for (target, result) in results {
                match result {
                    Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                    Err(e) => {
                        warn!(target = %target, error = %e, "Target not retrained");
                        failed.push(target);
                    }
                }
            }
            if !failed.is_empty() {
                bail!("training failed for {:?}", failed);
            }
        }
        Commands::Forecast {
            weather,
            start,
            hours,
            targets,
        } => {
            let start = parse_timestamp(&start, &tz).context("invalid --start")?;
            let registry = Arc::new(ModelRegistry::new());
            let loaded = ModelStore::new(&cfg.models.dir)
                .load_into(&registry, &FeatureSchema::standard())
                .await?;
            info!(?loaded, dir = %cfg.models.dir.display(), "Models loaded");

            let feed = WeatherFeed::new(load_weather_csv(&weather, &tz)?);
            let service = ForecastService::from_config(&cfg, registry, Arc::new(feed))?;
            let request = ForecastRequest::horizon(start, hours, or_all(targets));
            let response = service.forecast(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
