use anyhow::{Context, Result};
use clap::Parser;
use pricecast::application::dataset::loader::SeriesSource;
use pricecast::application::pipeline::ForecastPipeline;
use pricecast::config::ForecastConfig;
use pricecast::domain::ports::MarketDataProvider;
use pricecast::infrastructure::{CsvMarketDataProvider, YahooMarketDataProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "LSTM next-day price forecaster", long_about = None)]
struct Args {
    /// TOML configuration file (defaults plus FORECAST_* variables otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read <DIR>/<SYMBOL>.csv instead of querying Yahoo Finance
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the configured ticker
    #[arg(short, long)]
    ticker: Option<String>,

    /// Write the report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not open the chart window
    #[arg(long)]
    no_chart: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ForecastConfig::from_toml_file(path)?,
        None => ForecastConfig::from_env().context("Failed to load configuration")?,
    };
    if let Some(ticker) = args.ticker {
        config.ticker = ticker;
    }
    info!(
        "Forecasting {} (n_steps={}, lookup_step={}, test_size={})",
        config.ticker, config.dataset.n_steps, config.dataset.lookup_step, config.dataset.test_size
    );

    let provider: Arc<dyn MarketDataProvider> = match &args.data_dir {
        Some(dir) => Arc::new(CsvMarketDataProvider::new(dir)),
        None => Arc::new(YahooMarketDataProvider::new()),
    };

    let primary = SeriesSource::Ticker(config.ticker.clone());
    let secondary = config.secondary_ticker.clone().map(SeriesSource::Ticker);
    let pipeline = ForecastPipeline::new(config, provider);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;
    let report = rt
        .block_on(pipeline.run(primary, secondary))
        .context("Forecast run failed")?;

    report.log_summary();

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if args.no_chart {
        return Ok(());
    }

    #[cfg(feature = "ui")]
    {
        use pricecast::interfaces::forecast_chart::{ForecastChartApp, show_chart};
        show_chart(ForecastChartApp::from_report(&report))?;
    }
    #[cfg(not(feature = "ui"))]
    info!("Built without the `ui` feature; skipping chart");

    Ok(())
}
