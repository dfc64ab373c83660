use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use atopweb::app::{Dashboard, FileSource, SampleRequest};
use atopweb::config::{self, Config, load_config, load_config_from_path};
use atopweb::display::annotate_snapshot;
use atopweb::normalize::normalize;
use atopweb::sample::parse_snapshot;
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::Result;
use serde_json::Value;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "atopweb",
    about = "Normalize atop samples into the web dashboard document"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Process sort order: cpu, mem, disk
    #[arg(long, global = true)]
    sort: Option<String>,

    /// Maximum number of processes to keep
    #[arg(long, global = true)]
    procs: Option<usize>,

    /// Include threads in the process list
    #[arg(long, global = true, default_value_t = false)]
    all_threads: bool,

    /// Refresh rate in milliseconds
    #[arg(long, global = true)]
    refresh_rate: Option<u64>,

    /// Log as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize one sample read from FILE, or stdin when omitted.
    Normalize {
        file: Option<PathBuf>,

        /// Render classified fields for display.
        #[arg(long, default_value_t = false)]
        annotate: bool,

        /// Pretty-print the output document.
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Re-read FILE on every tick and print a one-line summary.
    Watch {
        file: PathBuf,

        /// Stop after this many refreshes.
        #[arg(long)]
        ticks: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.verbose);
    let config = load_config_for_cli(&cli);

    match cli.command {
        Command::Normalize {
            file,
            annotate,
            pretty,
        } => run_normalize(&config, file, annotate, pretty),
        Command::Watch { file, ticks } => run_watch(&config, file, ticks).await,
    }
}

fn init_tracing(json: bool, verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(ref sort) = cli.sort {
        config.general.default_sort = sort.clone();
    }
    if let Some(procs) = cli.procs {
        config.limits.processes = procs;
    }
    if cli.all_threads {
        config.general.only_proc = false;
    }
    tracing::debug!(path = ?config::config_path(), "configuration loaded");

    config
}

fn run_normalize(config: &Config, file: Option<PathBuf>, annotate: bool, pretty: bool) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let snapshot = normalize(parse_snapshot(&raw)?, &config.display_config())?;
    let document: Value = if annotate {
        let (value, errors) = annotate_snapshot(&snapshot)?;
        if !errors.is_empty() {
            tracing::warn!(count = errors.len(), "some fields could not be formatted");
        }
        value
    } else {
        snapshot.to_value()?
    };

    let out = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    println!("{out}");
    Ok(())
}

async fn run_watch(config: &Config, file: PathBuf, ticks: Option<u64>) -> Result<()> {
    let dashboard = Dashboard::new(FileSource::new(file), config.display_config());
    let rate = Duration::from_millis(config.general.refresh_rate_ms.max(1));
    let mut interval = tokio::time::interval(rate);
    let mut done = 0u64;

    loop {
        interval.tick().await;
        match dashboard.refresh(SampleRequest::latest()).await {
            Ok(snapshot) => println!(
                "{} cpu {}% procs {}/{} sort {}",
                snapshot.date,
                snapshot.cpu.cpubusy,
                snapshot.processes.len(),
                snapshot.process_summary.proc_count,
                dashboard.config().sort_mode.label(),
            ),
            Err(err) => tracing::warn!(%err, "refresh failed"),
        }
        done += 1;
        if ticks.is_some_and(|limit| done >= limit) {
            return Ok(());
        }
    }
}
