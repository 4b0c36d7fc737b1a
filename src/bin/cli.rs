//! Config Collector CLI
//!
//! Polls the account's channels for the last window of messages and keeps a
//! deduplicated list of the connection strings found in them.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use collector::{
    error::{AppError, Result},
    models::{Config, RunState, RunSummary},
    pipeline::{CollectionPipeline, RunOptions},
    storage::LocalStorage,
    transport,
    utils::SystemClock,
};
use tokio_util::sync::CancellationToken;

/// Config Collector - channel poller for proxy connection strings
#[derive(Parser, Debug)]
#[command(
    name = "collector",
    version,
    about = "Collects proxy configs posted to messaging channels in the last 24 hours"
)]
struct Cli {
    /// Path to storage directory containing config.toml and all outputs
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log chat, message id and time for every examined message
    #[arg(long)]
    debug_sample: bool,

    /// List dialogs and exit
    #[arg(long)]
    list_dialogs: bool,

    /// Scan only this chat id, bypassing selection
    #[arg(long, allow_hyphen_values = true)]
    chat: Option<i64>,

    /// Ignore the selection cache (the fresh selection is still saved)
    #[arg(long)]
    no_cache: bool,

    /// Select chats only; write no files and skip extraction
    #[arg(long)]
    dry_run: bool,

    /// Maximum chats to scan (0 = unlimited)
    #[arg(long)]
    max_chats: Option<usize>,

    /// Maximum messages examined per chat (0 = unlimited)
    #[arg(long)]
    per_chat_limit: Option<usize>,

    /// Seconds to wait between page requests (fractional allowed)
    #[arg(long, allow_hyphen_values = true)]
    delay: Option<f64>,

    /// Include private user dialogs in selection
    #[arg(long)]
    include_users: bool,

    /// Treat every eligible chat as relevant
    #[arg(long)]
    no_keywords: bool,

    /// Selection cache file (default: {storage_dir}/selected_chats.json)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Number of chats collected at once
    #[arg(long)]
    concurrency: Option<usize>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    fn apply_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(max_chats) = self.max_chats {
            config.collector.max_chats = max_chats;
        }
        if let Some(limit) = self.per_chat_limit {
            config.collector.per_chat_limit = limit;
        }
        if let Some(delay) = self.delay {
            if !delay.is_finite() || delay < 0.0 {
                return Err(AppError::validation(format!(
                    "--delay must be a non-negative number of seconds, got {delay}"
                )));
            }
            config.collector.request_delay_ms = (delay * 1000.0).round() as u64;
        }
        if let Some(concurrency) = self.concurrency {
            config.collector.max_concurrent = concurrency;
        }
        if self.include_users {
            config.selection.include_users = true;
        }
        if self.no_keywords {
            config.selection.no_keywords = true;
        }
        if let Some(path) = &self.cache_file {
            config.paths.selection_cache = path.to_string_lossy().into_owned();
        }
        Ok(())
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            chat: self.chat,
            use_cache: !self.no_cache,
            dry_run: self.dry_run,
            debug_sample: self.debug_sample,
        }
    }
}

/// Initialize logging based on the debug flag.
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel the run on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; finishing current chats and writing partial results");
            cancel.cancel();
        }
    });
}

fn log_summary(summary: &RunSummary) {
    match summary.state {
        RunState::AbortedDryRun => {
            log::info!("[DRY RUN] {} chats would be scanned", summary.selected.len());
        }
        _ => {
            log::info!(
                "Scanned {} chats ({} partial), {} messages in window",
                summary.collections.len(),
                summary.failed_channels(),
                summary.message_count()
            );
            log::info!(
                "Configs: {} extracted | {} new | {} total unique",
                summary.extracted,
                summary.added,
                summary.total_unique
            );
        }
    }
}

/// Decide how a run that never produced a summary ends the process.
///
/// A Ctrl-C before collection started is a clean exit. Fatal errors point at
/// the config file, everything else is reported as is.
fn finish_failed_run(err: AppError, config_path: &std::path::Path) -> Result<()> {
    match err {
        AppError::Cancelled => {
            log::warn!("Cancelled before collection started; nothing written");
            Ok(())
        }
        e if e.is_fatal() => {
            log::error!("Cannot start collection: {}", e);
            log::error!("Check the [transport] section of {}", config_path.display());
            Err(e)
        }
        e => {
            log::error!("Run failed: {}", e);
            Err(e)
        }
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    log::info!("Config Collector starting...");

    // Load configuration
    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);
    cli.apply_overrides(&mut config)?;

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let config = Arc::new(config);
    let source = transport::from_config(&config)?;
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let pipeline = CollectionPipeline::new(
        Arc::clone(&config),
        source,
        Arc::new(SystemClock),
        cancel,
        LocalStorage::new(&cli.storage_dir),
    )?;

    if cli.list_dialogs {
        let dialogs = match pipeline.list_dialogs().await {
            Ok(dialogs) => dialogs,
            Err(e) => return finish_failed_run(e, &config_path),
        };
        log::info!("{} dialogs:", dialogs.len());
        for channel in &dialogs {
            log::info!(
                "  {} | chat_id={} | {}",
                channel.title,
                channel.id,
                channel.kind.label()
            );
        }
        return Ok(());
    }

    let summary = match pipeline.run(&cli.run_options()).await {
        Ok(summary) => summary,
        Err(e) => return finish_failed_run(e, &config_path),
    };
    log_summary(&summary);

    log::info!("Done!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("collector").chain(args.iter().copied()))
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = parse(&[
            "--max-chats",
            "5",
            "--per-chat-limit",
            "200",
            "--delay",
            "0.25",
            "--include-users",
            "--concurrency",
            "3",
            "--cache-file",
            "/tmp/chats.json",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config).unwrap();

        assert_eq!(config.collector.max_chats, 5);
        assert_eq!(config.collector.per_chat_limit, 200);
        assert_eq!(config.collector.request_delay_ms, 250);
        assert_eq!(config.collector.max_concurrent, 3);
        assert!(config.selection.include_users);
        assert!(!config.selection.no_keywords);
        assert_eq!(config.paths.selection_cache, "/tmp/chats.json");
    }

    #[test]
    fn test_negative_delay_rejected() {
        let cli = parse(&["--delay", "-1"]);
        assert!(cli.apply_overrides(&mut Config::default()).is_err());
    }

    #[test]
    fn test_run_options() {
        let cli = parse(&["--chat", "-1001234", "--no-cache", "--dry-run"]);
        let options = cli.run_options();
        assert_eq!(options.chat, Some(-1001234));
        assert!(!options.use_cache);
        assert!(options.dry_run);
        assert!(!options.debug_sample);
    }

    #[test]
    fn test_cancel_before_collection_exits_cleanly() {
        let path = std::path::Path::new("storage/config.toml");
        assert!(finish_failed_run(AppError::Cancelled, path).is_ok());
    }

    #[test]
    fn test_fatal_and_other_failures_are_returned() {
        let path = std::path::Path::new("storage/config.toml");
        let fatal = finish_failed_run(AppError::AuthenticationRequired("no token".into()), path);
        assert!(matches!(fatal, Err(AppError::AuthenticationRequired(_))));

        let other = finish_failed_run(AppError::transport("dialogs", "reset"), path);
        assert!(matches!(other, Err(AppError::Transport { .. })));
    }
}
