//! PHP Log Watch - tail a PHP error log and stream structured entries.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use php_log_watch::config::{ConfigError, ConfigLoader, WatchConfig};
use php_log_watch::display;
use php_log_watch::parser::{parse_all, LogEntry};
use php_log_watch::watcher::{truncate_file, LogWatcher, WatchError, WatchEvent};

#[derive(Parser)]
#[command(
    name = "php-log-watch",
    about = "Tail a PHP error log and stream structured entries",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct OutputArgs {
    /// Print full messages and every stack frame.
    #[arg(long)]
    raw: bool,
    /// Print events as JSON lines.
    #[arg(long, conflicts_with = "raw")]
    json: bool,
    /// Only show entries whose message or stack trace contains this text.
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a log file until interrupted.
    Watch {
        /// Log file to watch. Defaults to `log_path` from the config.
        path: Option<PathBuf>,
        /// Show existing content instead of starting at the end.
        #[arg(long)]
        from_beginning: bool,
        /// Suppress identical alerts for this many milliseconds.
        #[arg(long)]
        cooldown_ms: Option<u64>,
        /// Do not raise alerts.
        #[arg(long)]
        no_alerts: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Parse a whole log file once and print its entries.
    Parse {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Empty a log file.
    Truncate { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No log file given and no log_path configured")]
    NoLogPath,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<WatchConfig, ConfigError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load()
}

fn filtered<'a>(entries: &'a [LogEntry], output: &OutputArgs) -> Vec<&'a LogEntry> {
    let query = output.filter.as_deref().unwrap_or_default();
    entries.iter().filter(|e| e.matches(query)).collect()
}

fn print_event(event: WatchEvent, output: &OutputArgs) -> Result<(), CliError> {
    let event = match event {
        WatchEvent::EntriesAppended { path, entries } => {
            let entries: Vec<LogEntry> = filtered(&entries, output).into_iter().cloned().collect();
            if entries.is_empty() {
                return Ok(());
            }
            WatchEvent::EntriesAppended { path, entries }
        }
        WatchEvent::Alert { notice }
            if !notice
                .entry
                .matches(output.filter.as_deref().unwrap_or_default()) =>
        {
            return Ok(());
        }
        other => other,
    };

    if output.json {
        println!("{}", serde_json::to_string(&event)?);
        return Ok(());
    }

    match &event {
        WatchEvent::Reset { path } => display::print_reset(path),
        WatchEvent::EntriesAppended { entries, .. } => {
            let now = Utc::now();
            for entry in entries {
                display::print_entry(entry, now, output.raw);
            }
        }
        WatchEvent::Alert { notice } => display::print_alert(notice),
        WatchEvent::Status { path, condition } => display::print_status(path, condition),
    }
    Ok(())
}

async fn run_watch(
    config: WatchConfig,
    path: Option<PathBuf>,
    output: OutputArgs,
) -> Result<(), CliError> {
    let path = path
        .or_else(|| config.log_path.clone())
        .ok_or(CliError::NoLogPath)?;

    let (watcher, rx) = LogWatcher::new(config.clone());
    tracing::info!(
        path = %path.display(),
        from_beginning = config.from_beginning,
        cooldown_ms = config.alerts.cooldown_ms,
        "Starting PHP log watch"
    );
    watcher.watch(path).await?;

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Interrupted, stopping");
    };
    let result = pump_events(UnboundedReceiverStream::new(rx), interrupted, &output).await;

    watcher.stop().await;
    result
}

/// Print events until the stream ends or `shutdown` resolves.
///
/// `shutdown` is polled for the whole loop, so a signal that arrives while
/// an event is being printed is still seen.
async fn pump_events<S, F>(
    mut events: S,
    shutdown: F,
    output: &OutputArgs,
) -> Result<(), CliError>
where
    S: Stream<Item = WatchEvent> + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => return Ok(()),
            event = events.next() => match event {
                Some(event) => print_event(event, output)?,
                None => return Ok(()),
            },
        }
    }
}

async fn run_parse(path: PathBuf, output: &OutputArgs) -> Result<(), CliError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
    let entries = parse_all(&String::from_utf8_lossy(&bytes));
    let entries = filtered(&entries, output);
    tracing::debug!(path = %path.display(), count = entries.len(), "Parsed log file");

    if output.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let now = Utc::now();
    if output.raw {
        let owned: Vec<LogEntry> = entries.into_iter().cloned().collect();
        println!("{}", display::format_raw(&owned, now));
    } else {
        for entry in entries {
            display::print_entry(entry, now, false);
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Watch {
            path,
            from_beginning,
            cooldown_ms,
            no_alerts,
            output,
        } => {
            let mut config = config;
            config.from_beginning |= from_beginning;
            if let Some(ms) = cooldown_ms {
                config.alerts.cooldown_ms = ms;
            }
            if no_alerts {
                config.alerts.enabled = false;
            }
            run_watch(config, path, output).await
        }
        Commands::Parse { path, output } => run_parse(path, &output).await,
        Commands::Truncate { path } => {
            truncate_file(&path).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
