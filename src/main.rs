//! Demo host for the app_metrics crate.
//!
//! Serves the debug, exported-variable and Prometheus endpoints, or prints a
//! single measured snapshot and exits.

use std::time::Duration;

use anyhow::Context;
use app_metrics::{
    start_web_server, AppState, RuntimeSampler, Sampler, Snapshot, SystemSampler,
    TrackingAllocator, Values, WebConfig, DEFAULT_INTERVAL, DEFAULT_WEB_PORT,
};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();

#[derive(Parser)]
#[command(name = "app_metrics")]
#[command(about = "Periodic process and host metrics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Collection interval in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL.as_millis() as u64)]
    interval: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve(ServeArgs),

    /// Measure one window and print every metric
    Snapshot(SnapshotArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Do not run the Prometheus collector or serve /metrics
    #[arg(long)]
    no_registry: bool,

    /// Maximum wait accepted by /debug/stats/, in seconds
    #[arg(long, default_value_t = app_metrics::MAX_STATS_SECONDS)]
    max_stats_seconds: u64,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or text
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Length of the measured window in seconds
    #[arg(short, long, default_value_t = 1)]
    seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(args).await?,
        None => serve_command(&cli, &ServeArgs::default()).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(log_level(cli), rust_log.as_deref()))
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn log_level(cli: &Cli) -> Level {
    if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// `RUST_LOG` wins when set and valid; otherwise the CLI level applies.
fn log_filter(level: Level, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}

async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    let config = WebConfig::new(&cli.host, cli.port)
        .with_collect_interval(Duration::from_millis(cli.interval))
        .with_max_stats_seconds(args.max_stats_seconds)
        .with_registry(!args.no_registry);

    info!("Web server configuration:");
    info!("  - Bind address: {}", config.bind_address());
    info!("  - Collection interval: {:?}", config.collect_interval());
    info!("  - Prometheus registry: {}", config.enable_registry);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let state = AppState::new(config).with_allocator(&ALLOCATOR);
    start_web_server(state, shutdown_rx)
        .await
        .context("web server failed")?;

    Ok(())
}

async fn snapshot_command(args: &SnapshotArgs) -> anyhow::Result<()> {
    let mut runtime = RuntimeSampler::new().with_allocator(&ALLOCATOR);
    let mut system = SystemSampler::new();
    runtime.sample();
    system.sample();

    tokio::time::sleep(Duration::from_secs(args.seconds)).await;

    let runtime_stats = runtime.sample();
    let system_stats = system.sample();

    match args.format.as_str() {
        "json" => {
            let json = serde_json::json!({
                "runtime": runtime_stats,
                "system": system_stats,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        "text" => {
            for (key, value) in runtime_stats.tags() {
                println!("{}={}", key, value);
            }
            let mut values: Values = runtime_stats.values();
            values.extend(system_stats.values());
            print!("{}", app_metrics::web::handlers::render_lines(&values));
        }
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'text'", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["app_metrics", "--port", "9090"]).unwrap();
        assert_eq!(cli.port, 9090);
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["app_metrics"]).unwrap();
        assert_eq!(cli.port, DEFAULT_WEB_PORT);
        assert_eq!(cli.interval, 10_000);
        assert_eq!(cli.host, "0.0.0.0");
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::try_parse_from(["app_metrics"]).unwrap();
        assert_eq!(log_level(&cli), Level::WARN);

        let cli = Cli::try_parse_from(["app_metrics", "--verbose"]).unwrap();
        assert_eq!(log_level(&cli), Level::INFO);

        let cli = Cli::try_parse_from(["app_metrics", "--debug"]).unwrap();
        assert_eq!(log_level(&cli), Level::DEBUG);
    }

    #[test]
    fn test_log_filter_uses_cli_level_without_rust_log() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(
            log_filter(Level::DEBUG, None).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            log_filter(Level::INFO, None).max_level_hint(),
            Some(LevelFilter::INFO)
        );
        assert_eq!(
            log_filter(Level::WARN, Some("trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(
            log_filter(Level::INFO, Some("app_metrics=notalevel")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }

    #[test]
    fn test_snapshot_subcommand() {
        let cli = Cli::try_parse_from(["app_metrics", "snapshot", "--format", "json", "-s", "2"])
            .unwrap();
        match cli.command {
            Some(Commands::Snapshot(args)) => {
                assert_eq!(args.format, "json");
                assert_eq!(args.seconds, 2);
            }
            _ => panic!("expected snapshot command"),
        }
    }
}
