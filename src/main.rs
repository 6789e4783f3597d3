use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, warn};

use macrolens::app::create_app;
use macrolens::config::AppConfig;
use macrolens::logging::{init_logging, LoggingConfig};
use macrolens::models::RunMode;
use macrolens::services::pipeline_service::PipelineRunner;
use macrolens::services::{decision_service, indicator_service};
use macrolens::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "macrolens", version, about = "Score macro news and attribute its impact on valuations")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Log filter, overrides RUST_LOG (e.g. "debug" or "macrolens=debug,sqlx=warn")
    #[arg(long)]
    log_level: Option<String>,

    /// Only fetch articles
    #[arg(long, group = "mode")]
    fetch_only: bool,

    /// Only run keyword, sentiment, aggregation and event analysis
    #[arg(long, group = "mode")]
    analyze_only: bool,

    /// Only adjust model parameters
    #[arg(long, group = "mode")]
    integrate_only: bool,

    /// Only attribute recorded decisions
    #[arg(long, group = "mode")]
    attribution_only: bool,

    /// Serve the read-only HTTP API instead of running the pipeline
    #[arg(long, group = "mode")]
    serve: bool,

    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Load economic indicator rows (and price:<SYMBOL> series) from a CSV
    #[arg(long, value_name = "CSV")]
    import_indicators: Option<PathBuf>,

    /// Load investment decisions from a CSV
    #[arg(long, value_name = "CSV")]
    import_decisions: Option<PathBuf>,
}

impl Cli {
    fn run_mode(&self) -> Option<RunMode> {
        if self.fetch_only {
            Some(RunMode::FetchOnly)
        } else if self.analyze_only {
            Some(RunMode::AnalyzeOnly)
        } else if self.integrate_only {
            Some(RunMode::IntegrateOnly)
        } else if self.attribution_only {
            Some(RunMode::AttributionOnly)
        } else {
            None
        }
    }

    fn imports_only(&self) -> bool {
        (self.import_indicators.is_some() || self.import_decisions.is_some())
            && self.run_mode().is_none()
            && !self.serve
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging FIRST
    let logging = LoggingConfig::from_env().with_level_override(cli.log_level.as_deref());
    init_logging(logging).map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;
    let config = Arc::new(config);
    info!("⚙️ Loaded configuration from {}", cli.config.display());

    let database_url = config
        .database
        .url
        .clone()
        .context("no database url: set DATABASE_URL or database.url")?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    if let Some(path) = &cli.import_indicators {
        let rows = indicator_service::read_indicator_csv(path)?;
        indicator_service::ingest(&pool, rows, config.indicators.duplicate_policy).await?;
    }
    if let Some(path) = &cli.import_decisions {
        let decisions = decision_service::read_decision_csv(path)?;
        decision_service::import_decisions(&pool, &decisions).await?;
    }
    if cli.imports_only() {
        return Ok(());
    }

    if cli.serve {
        let app = create_app(AppState { pool, config });
        let listener = TcpListener::bind(cli.bind)
            .await
            .with_context(|| format!("failed to bind {}", cli.bind))?;
        info!("🚀 macrolens API running at http://{}/", cli.bind);
        axum::serve(listener, app).await?;
        return Ok(());
    }

    let mode = cli.run_mode().unwrap_or(RunMode::Full);
    let runner = PipelineRunner::new(pool, config)?;
    let summary = runner.run(mode).await;

    let failed = summary.total_failed();
    if failed > 0 {
        warn!("⚠️ Run finished with {} failed records", failed);
    } else {
        info!("✅ Run finished");
    }
    Ok(())
}
