//! logtail - list, tail, search and follow application log files.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use logtail::{
    BroadcasterState, ChannelPushSink, LiveTailBroadcaster, LogSearchCriteria, LogTailConfig,
    SearchEngine, SearchResult, SessionId,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "logtail")]
#[command(about = "Tail, search and follow rotated application logs")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true, env = "LOGTAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory (overrides the config file)
    #[arg(long, global = true, env = "LOGTAIL_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Active log file name (overrides the config file)
    #[arg(long, global = true, env = "LOGTAIL_ACTIVE_FILE")]
    active_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Filters shared by `tail` and `search`.
#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// File to read (defaults to the active file)
    #[arg(short, long)]
    file: Option<String>,

    /// Maximum entries for tail mode
    #[arg(short = 'n', long, default_value_t = 100)]
    lines: usize,

    /// Only keep these levels (repeatable)
    #[arg(short, long = "level")]
    levels: Vec<String>,

    /// Case-insensitive substring to match
    #[arg(short, long)]
    keyword: Option<String>,
}

impl FilterArgs {
    fn criteria(&self) -> LogSearchCriteria {
        let mut criteria = LogSearchCriteria::new().with_lines(self.lines);
        if let Some(ref file) = self.file {
            criteria = criteria.with_filename(file.clone());
        }
        for level in &self.levels {
            criteria = criteria.with_level(level.clone());
        }
        if let Some(ref keyword) = self.keyword {
            criteria = criteria.with_keyword(keyword.clone());
        }
        criteria
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List log files, the active file first
    List,

    /// Show the most recent matching entries
    Tail(FilterArgs),

    /// Scan a whole file for matching entries
    Search(FilterArgs),

    /// Copy a log file to stdout or a path
    Download {
        /// File to copy
        file: String,

        /// Destination (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stream new entries of the active file until interrupted
    Follow,

    /// Write a config file with default values
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "logtail.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("logtail=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Commands::InitConfig { output } = &cli.command {
        let config = LogTailConfig::default();
        std::fs::write(output, serde_json::to_string_pretty(&config)?)
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!(path = %output.display(), "wrote default config");
        return Ok(());
    }

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::List => {
            let engine = SearchEngine::new(&config);
            print_json(&engine.list_files())?;
        }
        Commands::Tail(filters) => {
            let engine = SearchEngine::new(&config);
            report(&engine.tail(&filters.criteria()))?;
        }
        Commands::Search(filters) => {
            let engine = SearchEngine::new(&config);
            report(&engine.search(&filters.criteria()))?;
        }
        Commands::Download { file, output } => {
            let engine = SearchEngine::new(&config);
            let mut download = engine
                .open_download(&file)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            let copied = match output {
                Some(path) => {
                    let mut out = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    std::io::copy(&mut download.file, &mut out)?
                }
                None => std::io::copy(&mut download.file, &mut std::io::stdout().lock())?,
            };
            info!(file = %download.filename, bytes = copied, size = download.size_bytes, "download complete");
        }
        Commands::Follow => follow(&config).await?,
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Loads the config file (if any) and applies command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<LogTailConfig> {
    let mut config = match cli.config {
        Some(ref path) => LogTailConfig::from_file(path)?,
        None => LogTailConfig::default(),
    };
    if let Some(ref dir) = cli.log_dir {
        config.log_dir.clone_from(dir);
    }
    if let Some(ref name) = cli.active_file {
        config.active_file.clone_from(name);
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn report(result: &SearchResult) -> anyhow::Result<()> {
    print_json(result)?;
    if !result.success {
        bail!(
            "{}",
            result.error.as_deref().unwrap_or("log query failed")
        );
    }
    Ok(())
}

async fn follow(config: &LogTailConfig) -> anyhow::Result<()> {
    let sink = Arc::new(ChannelPushSink::new());
    let broadcaster = LiveTailBroadcaster::new(config, sink.clone());
    if broadcaster.start().await == BroadcasterState::Stopped {
        bail!(
            "live tail unavailable for log directory {}",
            config.log_dir.display()
        );
    }

    let session = SessionId::generate();
    let mut rx = sink.open(session.clone());
    broadcaster.subscribe(session.clone());
    info!(session = %session, file = %config.active_file, "following, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                let mut out = std::io::stdout().lock();
                for entry in &message.entries {
                    serde_json::to_writer(&mut out, entry)?;
                    writeln!(out)?;
                }
                out.flush()?;
            }
            _ = &mut ctrl_c => break,
        }
    }

    broadcaster.unsubscribe(&session);
    sink.close(&session);
    broadcaster.stop().await;
    Ok(())
}
