use clap::Parser;
use logminer_capture::source::table::TableFilter;
use logminer_capture::{Config, Error, Result};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "logminer-capture")]
#[command(about = "Oracle LogMiner change data capture source", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting logminer-capture");
    info!("Loading configuration from {:?}", args.config);

    let config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(Error::Config(e.to_string()));
        }
    };

    // Surface filter contract violations before any connection attempt.
    TableFilter::from_patterns(&config.miner.include, &config.miner.exclude)?;

    info!(
        url = %config.connection.url,
        username = %config.connection.username,
        seek_scn = ?config.miner.seek_scn,
        fetch_size = %config.miner.fetch_size,
        max_tasks = %config.miner.max_tasks,
        include = ?config.miner.include,
        exclude = ?config.miner.exclude,
        "Configuration summary"
    );

    // TODO: wire in a driver-backed ClientFactory once one is selected
    error!("No mining driver is linked into this build");

    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("logminer_capture=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("logminer_capture=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
