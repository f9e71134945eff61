use anyhow::{Context, Result};
use clap::Parser;
use signcascade::{DetectionOrchestrator, EventBus, Frame, RemoteClassifier, SignConfig};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "signcascade")]
#[command(about = "Hand-sign detection with a cascade of remote, learned and geometric classifiers")]
#[command(version)]
#[command(long_about = "Runs still images through the sign detection pipeline: hand landmark \
detection with a skin-colour fallback, then remote, local and geometric classifiers in order \
until one is confident enough. Prints one JSON detection result per image.")]
struct Args {
    /// Images to classify
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "signcascade.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Load models and print the pipeline status report
    #[arg(long)]
    status: bool,

    /// Print the remote classifier's model description
    #[arg(long)]
    model_info: bool,

    /// Reset the landmark provider and initialize it again before detecting
    #[arg(long)]
    retry_initialization: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting signcascade v{}", env!("CARGO_PKG_VERSION"));

    let config = SignConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate().context("Invalid configuration")?;

    let event_bus = EventBus::new(config.pipeline.event_bus_capacity);
    let orchestrator = DetectionOrchestrator::from_config(config, Some(event_bus))
        .context("Failed to build detection pipeline")?;

    if args.model_info {
        let info = orchestrator
            .remote()
            .model_info()
            .await
            .context("Remote classifier did not describe its model")?;
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    if args.retry_initialization {
        if orchestrator.provider().retry_initialization().await {
            info!("Landmark provider reinitialized");
        } else {
            warn!("Landmark provider still unavailable after retry");
        }
    }

    if args.status {
        orchestrator.models().ensure_loaded().await;
        let report = orchestrator.status_report();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.images.is_empty() {
        warn!("No images given, nothing to detect");
        return Ok(());
    }

    let mut failures = 0usize;
    for (id, path) in args.images.iter().enumerate() {
        let frame = match Frame::open(id as u64, path) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Skipping {}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };

        let result = orchestrator.detect(&frame).await;
        info!(
            "{}: '{}' ({:.2}) via {}",
            path.display(),
            result.gesture,
            result.confidence,
            result.method
        );
        println!("{}", serde_json::to_string(&result)?);
    }

    let health = orchestrator.health_check();
    for warning in &health.warnings {
        warn!("{}", warning);
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images could not be read", failures, args.images.len());
    }

    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("signcascade={}", log_level)));

    // Results go to stdout, so logs stay on stderr
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_writer(std::io::stderr).boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "signcascade.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# signcascade configuration file");
    println!("# Every option with its default value; SIGNCASCADE__<SECTION>__<KEY> overrides");
    println!();
    println!("{}", toml::to_string_pretty(&SignConfig::default())?);
    Ok(())
}
