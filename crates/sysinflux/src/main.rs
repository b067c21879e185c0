//! sysinflux - host metrics sampler.
//!
//! Samples CPU, memory, swap, uptime, load, network, disk and mount metrics
//! from /proc, turns counters into per-interval rates and prints them and/or
//! writes them to an InfluxDB 0.8 server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use sysinflux_core::VERSION;
use sysinflux_core::collector::{Family, RealFs};
use sysinflux_core::config::{
    Config, ConfigError, DEFAULT_MAX_RETRIES, DisplayMode, parse_duration,
};
use sysinflux_core::orchestrator::Orchestrator;
use sysinflux_core::sink::{DisplayFormat, DisplaySink, InfluxConfig, InfluxSink, Sink};
use sysinflux_core::util;

/// Host metrics sampler with rate normalization and InfluxDB output.
#[derive(Parser)]
#[command(name = "sysinflux", about = "Host metrics sampler", version = VERSION)]
struct Args {
    /// Delay between laps in daemon mode (e.g., "500ms", "1s", "2m", "10").
    #[arg(short, long, default_value = "1s", value_parser = parse_duration)]
    interval: Duration,

    /// Window counter rates are expressed over. "0" reports raw deltas.
    #[arg(short = 'C', long, default_value = "1s", value_parser = parse_duration)]
    consistency: Duration,

    /// Keep sampling until interrupted instead of emitting once.
    #[arg(short = 'D', long)]
    daemon: bool,

    /// Comma-separated families to collect (default: all).
    /// Known: cpu, cpus, mem, swap, uptime, load, network, disks, mounts.
    #[arg(short = 'c', long, value_delimiter = ',', value_parser = parse_family)]
    collect: Vec<Family>,

    /// Series name prefix (default: host name).
    #[arg(short = 'P', long)]
    prefix: Option<String>,

    /// Add an "fqdn" column with the fully-qualified host name.
    #[arg(short, long)]
    fqdn: bool,

    /// Output on stdout: off, text or json.
    /// Defaults to text without --database, off with it.
    #[arg(short = 'o', long, value_parser = parse_display)]
    display: Option<DisplayMode>,

    /// InfluxDB HTTP API address.
    #[arg(long, default_value = "localhost:8086")]
    host: String,

    /// InfluxDB user.
    #[arg(short, long, default_value = "root")]
    username: String,

    /// InfluxDB password.
    #[arg(short, long, default_value = "root")]
    password: String,

    /// File whose first line is the InfluxDB password. Overrides --password.
    #[arg(short, long, value_name = "PATH")]
    secret: Option<PathBuf>,

    /// InfluxDB database. Enables writing to InfluxDB.
    #[arg(short, long)]
    database: Option<String>,

    /// Write the process id to this file before sampling.
    #[arg(long, value_name = "PATH")]
    pidfile: Option<PathBuf>,

    /// Path to /proc filesystem (for containers or testing).
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Upper bound on a single family's read.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    timeout: Duration,

    /// Immediate re-samples allowed in one-shot mode before giving up on
    /// incomplete families.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_family(s: &str) -> Result<Family, ConfigError> {
    s.parse()
}

fn parse_display(s: &str) -> Result<DisplayMode, String> {
    s.parse()
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
/// Logs go to stderr; stdout is reserved for the display output.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["sysinflux", "sysinflux_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Logs a startup failure and exits.
fn fatal(message: &str, error: &dyn std::error::Error) -> ! {
    error!(error = %error, "{}", message);
    process::exit(1);
}

fn build_config(args: &Args) -> Result<Config, ConfigError> {
    let families = if args.collect.is_empty() {
        Family::ALL.to_vec()
    } else {
        args.collect.clone()
    };
    let display = args.display.unwrap_or(if args.database.is_some() {
        DisplayMode::Off
    } else {
        DisplayMode::Text
    });

    Config {
        interval: args.interval,
        consistency: args.consistency,
        daemon: args.daemon,
        families,
        prefix: args.prefix.clone().unwrap_or_else(util::hostname),
        fqdn: args.fqdn,
        display,
        proc_path: args.proc_path.clone(),
        sample_timeout: args.timeout,
        max_retries: args.max_retries,
    }
    .validate()
}

fn build_sinks(args: &Args, config: &Config) -> Vec<Arc<dyn Sink>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    match config.display {
        DisplayMode::Off => {}
        DisplayMode::Text => sinks.push(Arc::new(DisplaySink::stdout(DisplayFormat::Text))),
        DisplayMode::Json => sinks.push(Arc::new(DisplaySink::stdout(DisplayFormat::Json))),
    }

    if let Some(database) = &args.database {
        let password = match &args.secret {
            Some(path) => util::read_secret(path)
                .unwrap_or_else(|e| fatal(&format!("failed to read {}", path.display()), &e)),
            None => args.password.clone(),
        };
        let influx = InfluxConfig {
            host: args.host.clone(),
            database: database.clone(),
            username: args.username.clone(),
            password,
        };
        match InfluxSink::new(&influx) {
            Ok(sink) => {
                info!(host = %influx.host, database = %influx.database, "InfluxDB output enabled");
                sinks.push(Arc::new(sink));
            }
            Err(e) => fatal("invalid InfluxDB settings", &e),
        }
    }

    if sinks.is_empty() {
        warn!("no output configured; samples will be discarded");
    }
    sinks
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = build_config(&args).unwrap_or_else(|e| fatal("invalid configuration", &e));

    info!("sysinflux {} starting", VERSION);
    info!(
        "Config: interval={:?}, consistency={:?}, daemon={}, proc={}, families={}",
        config.interval,
        config.consistency,
        config.daemon,
        config.proc_path.display(),
        config
            .families
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(",")
    );

    if let Some(path) = &args.pidfile {
        util::write_pidfile(path)
            .unwrap_or_else(|e| fatal(&format!("failed to write pid file {}", path.display()), &e));
        debug!(path = %path.display(), "pid file written");
    }

    let sinks = build_sinks(&args, &config);

    let mut orchestrator = Orchestrator::new(&config, RealFs::new());
    if config.fqdn {
        let fqdn = util::fqdn();
        debug!(fqdn = %fqdn, "resolved host name");
        orchestrator = orchestrator.with_fqdn(fqdn);
    }
    for sink in sinks {
        orchestrator.add_sink(sink);
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(orchestrator.run(&running));

    info!("Shutdown complete");
}
