use std::env;

use chrono::{Duration, Utc};
use clap::Parser;
use fern::Dispatch;
use log::{info, warn, LevelFilter};

use buoycast::analysis::ResampleInterval;
use buoycast::data::{BuoyDataTable, BuoyVariable};
use buoycast::fetch::HttpBuoyDataProvider;
use buoycast::forecast::{Forecast, ForecastError, SequenceForecaster};
use buoycast::registry::{batch_current_conditions, batch_trends, StationRegistry};

#[derive(Parser, Clone, Debug)]
#[command(
    author,
    version,
    about = "Current conditions, trends, and forecasts from NDBC nearshore buoys"
)]
struct Cli {
    /// Log level: trace, debug, info, warn, error
    #[arg(short, long)]
    level: Option<String>,

    /// Hours of history feeding the trend window
    #[arg(long, default_value_t = 24)]
    lookback: i64,

    /// Train wave height and water temperature forecasters per station and
    /// print their forecasts
    #[arg(short, long)]
    forecast: bool,
}

fn get_log_level(cli: &Cli) -> LevelFilter {
    let level_str = cli
        .level
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    match level_str.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

fn setup_logger() -> Dispatch {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}: {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.target(),
                message
            ));
        })
        .chain(std::io::stdout())
}

fn forecast_variable(
    table: &BuoyDataTable,
    variable: BuoyVariable,
) -> Result<Forecast, ForecastError> {
    let mut forecaster = SequenceForecaster::new(variable);
    forecaster.train(table)?;
    forecaster.predict(table)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logger().level(get_log_level(&cli)).apply()?;

    let registry = StationRegistry::with_default_stations();
    let provider = HttpBuoyDataProvider::new()?;

    info!("fetching {} stations", registry.len());
    let batch = registry.fetch_all(&provider);
    let now = Utc::now();

    let conditions = batch_current_conditions(&batch);
    println!("{}", serde_json::to_string_pretty(&conditions)?);

    let trends = batch_trends(
        &batch,
        BuoyVariable::WaveHeight,
        ResampleInterval::Hourly,
        now,
        Duration::hours(cli.lookback),
    );
    for (location, (series, trend)) in &trends {
        println!(
            "{}: wave height {} ({:+.1}% over {} buckets, confidence {:.2})",
            location,
            trend.direction,
            trend.change_percentage,
            series.len(),
            trend.rounded_confidence()
        );

        if let Some(table) = batch.get(location) {
            let summary = table.condition_summary();
            if let (Some(max), Some(avg)) = (summary.max_wave_height, summary.average_wave_height)
            {
                println!("  reported range: avg {:.2} m, max {:.2} m", avg, max);
            }
        }
    }

    if cli.forecast {
        for table in batch.values() {
            for variable in [BuoyVariable::WaveHeight, BuoyVariable::WaterTemperature] {
                match forecast_variable(table, variable) {
                    Ok(forecast) => println!("{}", serde_json::to_string_pretty(&forecast)?),
                    Err(e) => warn!("no {} forecast for {}: {}", variable, table.location, e),
                }
            }
        }
    }

    Ok(())
}
