use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use valuation_core::analytics::{AnalyticsPipeline, PipelineConfig};
use valuation_core::config::Settings;
use valuation_core::ingest::{FixtureDataSource, MarketDataSource, TushareClient};
use valuation_core::protocol::{parse_command, reply, CommandProtocol, ProtocolConfig};

#[derive(Debug, Parser)]
#[command(name = "valuation_cli")]
struct Args {
    /// Read bars and factors from a JSON fixture instead of Tushare.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Compute adjusted-price and volume percentiles for one security.
    Query {
        /// Tushare code, e.g. 300604.SZ. Defaults to DEFAULT_TS_CODE.
        #[arg(long)]
        ts_code: Option<String>,

        /// Last trade date of the lookback (YYYY-MM-DD). Defaults to today's CST date.
        #[arg(long)]
        as_of_date: Option<String>,

        /// Print every record as JSON instead of the latest-day summary.
        #[arg(long)]
        json: bool,
    },

    /// Answer a chat command the way the webhook would.
    Reply { text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let pipeline = AnalyticsPipeline::new(
        build_source(&settings, args.fixture.as_deref())?,
        PipelineConfig::from_settings(&settings),
    );

    let result = match args.command {
        Cmd::Query {
            ts_code,
            as_of_date,
            json,
        } => {
            let ts_code = ts_code.unwrap_or_else(|| settings.default_ts_code.clone());
            run_query(&pipeline, &ts_code, as_of_date.as_deref(), json).await
        }
        Cmd::Reply { text } => {
            // Signatures are never checked offline.
            let config = ProtocolConfig {
                shared_secret: String::new(),
                bypass_signature: false,
            };
            let protocol = CommandProtocol::new(config, pipeline);
            println!("{}", protocol.dispatch(&parse_command(&text)).await);
            Ok(())
        }
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

fn build_source(
    settings: &Settings,
    fixture: Option<&std::path::Path>,
) -> anyhow::Result<Arc<dyn MarketDataSource>> {
    match fixture {
        Some(path) => {
            let source = FixtureDataSource::from_json_file(path)?;
            tracing::info!(
                path = %path.display(),
                bars = source.bars.len(),
                factors = source.factors.len(),
                "using fixture data source"
            );
            Ok(Arc::new(source))
        }
        None => Ok(Arc::new(TushareClient::from_settings(settings)?)),
    }
}

async fn run_query(
    pipeline: &AnalyticsPipeline,
    ts_code: &str,
    as_of_date: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let result = match as_of_date {
        Some(s) => {
            let end = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("invalid --as-of-date {s:?}"))?;
            pipeline.run_as_of(ts_code, end).await?
        }
        None => pipeline.run(ts_code).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let latest = result
        .latest()
        .with_context(|| format!("no records for {ts_code}"))?;
    println!("{}", reply::latest_summary(ts_code, latest));
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
