use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rws_quality::{telemetry, MatchStrategy, QualityConfig, QualityController};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "rws-quality")]
#[command(about = "Inspect and exercise the adaptive video quality controller")]
#[command(version)]
#[command(long_about = "Loads the quality controller configuration, prints the resolution \
table it selects, maps bitrates to resolutions and replays recorded telemetry sessions \
(JSON lines) through the controller.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "rws-quality.toml")]
    config: PathBuf,

    /// Enable debug logging (most verbose)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective configuration (defaults, file and environment) as TOML
    PrintConfig,

    /// Load and validate the configuration file
    Validate,

    /// Show the resolution table selected by the configuration
    Table {
        /// Emit JSON instead of a text table
        #[arg(long)]
        json: bool,
    },

    /// Map target bitrates (kbps) to resolutions, in order
    Match {
        #[arg(required = true)]
        bitrates: Vec<u32>,

        /// Override the configured match strategy (nearest, first_valley)
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<MatchStrategy>,
    },

    /// Replay a recorded telemetry session (JSON lines)
    Replay {
        input: PathBuf,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = init_logging(&args)?;

    let config = QualityConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    match args.command {
        Command::PrintConfig => print_config(&config)?,
        Command::Validate => match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        },
        Command::Table { json } => print_table(&config, json)?,
        Command::Match { bitrates, strategy } => {
            let mut config = config;
            if let Some(strategy) = strategy {
                config.video.match_strategy = strategy;
            }
            run_match(&config, &bitrates)?
        }
        Command::Replay { input, json } => run_replay(&config, &input, json)?,
    }

    Ok(())
}

fn parse_strategy(value: &str) -> std::result::Result<MatchStrategy, String> {
    match value {
        "nearest" => Ok(MatchStrategy::Nearest),
        "first_valley" | "first-valley" => Ok(MatchStrategy::FirstValley),
        other => Err(format!(
            "unknown strategy '{}', expected nearest or first_valley",
            other
        )),
    }
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
        .unwrap_or_else(|_| EnvFilter::new(format!("rws_quality={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .with_writer(std::io::stderr)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .context("Log file path must name a file")?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
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

/// Print configuration in TOML format
fn print_config(config: &QualityConfig) -> Result<()> {
    println!("# rws-quality configuration file");
    println!("# Every key is optional; missing keys take their defaults.");
    println!("# Environment overrides use RWS_QUALITY_<SECTION>__<KEY>, e.g. RWS_QUALITY_THRESHOLDS__RTT_MS=150");
    println!();

    let text = config.to_toml().context("Failed to serialize configuration")?;
    println!("{}", text);
    Ok(())
}

fn print_table(config: &QualityConfig, json: bool) -> Result<()> {
    let controller = QualityController::new(config)?;
    let table = controller.table();

    if json {
        println!("{}", serde_json::to_string_pretty(table)?);
        return Ok(());
    }

    println!("Resolution table ({})", config.aspect_family());
    println!(
        "{:>11}  {:>7}  {:>9}  {:>9}  {:>9}",
        "resolution", "fps", "min kbps", "avg kbps", "max kbps"
    );
    for profile in table.profiles() {
        println!(
            "{:>11}  {:>7}  {:>9}  {:>9}  {:>9}",
            profile.resolution().to_string(),
            format!("{}-{}", profile.min_fps(), profile.max_fps()),
            profile.min_bandwidth(),
            profile.average_bandwidth(),
            profile.max_bandwidth()
        );
    }
    Ok(())
}

fn run_match(config: &QualityConfig, bitrates: &[u32]) -> Result<()> {
    let mut controller = QualityController::new(config)?;

    for &bitrate in bitrates {
        let (resolution, note) = match controller.best_match_for(bitrate) {
            Some(resolution) => (resolution, "  (changed)"),
            None => (controller.current_resolution(), ""),
        };
        println!(
            "{:>7} kbps -> {:>9}{}",
            bitrate,
            resolution.to_string(),
            note
        );
    }
    Ok(())
}

fn run_replay(config: &QualityConfig, input: &Path, json: bool) -> Result<()> {
    let samples = telemetry::load_samples(input)
        .with_context(|| format!("Failed to read telemetry from {}", input.display()))?;
    let mut controller = QualityController::new(config)?;

    let report = telemetry::replay(&mut controller, &samples);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Samples replayed:     {}", report.samples);
    if let Some(resolution) = report.initial_resolution {
        println!("Initial resolution:   {}", resolution);
    }
    for change in &report.changes {
        println!(
            "  sample {:>5}: {:>6} kbps -> {}",
            change.sample, change.bitrate, change.resolution
        );
    }
    println!("Adaptation required:  {}", report.adaptation_required);
    println!("Adaptation direction: {:?}", report.final_state.adaptation);
    println!("Final resolution:     {}", report.final_state.current_resolution);
    Ok(())
}
