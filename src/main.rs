// ABOUTME: Main entry point for the salon bot: CLI, logging, metrics, and the Matrix sync loop
// ABOUTME: Runs the event loop on a current-thread runtime with the scheduler on its own thread

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use matrix_sdk::config::SyncSettings;
use salon::{
    config::Config,
    features::{self, Features},
    matrix_client,
    platform::MatrixPlatform,
    runtime::Runtime,
    utils::messages_from_csv,
};
use salon_core::message::sort_chronologically;
use salon_core::{
    submission_bridge, ChatPlatform, DiscussionArchive, DiscussionSegmenter, ModuleRegistry,
    Scheduler, SchedulerThread, SetupError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "info,matrix_sdk_crypto=warn";

#[derive(Parser)]
#[command(name = "salon", version, about = "Community chat bot for Matrix")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Matrix and run the bot (default)
    Run,
    /// Validate configuration and print the job schedule
    CheckConfig,
    /// Split a `Timestamp,Author,Message` CSV export into discussion files
    Segment {
        csv: PathBuf,
        /// Output directory (defaults to the data directory's discussions/)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Inactivity gap in minutes (defaults to bot.gap_minutes)
        #[arg(long)]
        gap_minutes: Option<i64>,
    },
}

fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\nPANIC! salon crashed with the following error:\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load_unvalidated()?;
    let _guard = init_logging(&config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            config.validate()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build the event loop runtime")?;
            runtime.block_on(serve(config))
        }
        Commands::CheckConfig => check_config(&config),
        Commands::Segment {
            csv,
            out,
            gap_minutes,
        } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build runtime")?;
            let out = out.unwrap_or_else(|| config.bot.discussions_dir());
            let gap = match gap_minutes {
                Some(minutes) => chrono::Duration::try_minutes(minutes)
                    .with_context(|| format!("--gap-minutes {} is out of range", minutes))?,
                None => config.bot.gap(),
            };
            runtime.block_on(segment_export(&csv, &out, gap))
        }
    }
}

/// Console layer (human or JSON) plus an optional daily-rotated file.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .logging
                .filter
                .as_deref()
                .unwrap_or(DEFAULT_LOG_FILTER),
        )
    });

    let console = if config.logging.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let (file_layer, guard) = if config.logging.file {
        let log_dir = config.bot.log_dir();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let appender = tracing_appender::rolling::daily(&log_dir, "salon.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn check_config(config: &Config) -> Result<()> {
    match config.validate() {
        Ok(()) => println!("Configuration OK"),
        Err(e) => println!("Configuration problem: {}", e),
    }
    println!("{:#?}", config);

    let schedule = features::schedule_preview(config)?;
    println!("\nScheduled jobs ({}, timezone {}):", schedule.len(), config.scheduler.timezone);
    for job in schedule.iter() {
        println!("  {:<28} {}", job.name, job.rule);
    }
    Ok(())
}

async fn segment_export(csv: &Path, out: &Path, gap: chrono::Duration) -> Result<()> {
    let text = tokio::fs::read_to_string(csv)
        .await
        .with_context(|| format!("Failed to read {}", csv.display()))?;
    let label = csv
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut messages = messages_from_csv(&text, &label)?;
    sort_chronologically(&mut messages);
    let discussions = DiscussionSegmenter::new(gap).segment(messages);
    let written = DiscussionArchive::new(out).store(&discussions).await?;

    println!(
        "{} discussions written to {}",
        written.len(),
        out.display()
    );
    for (path, discussion) in written.iter().zip(&discussions) {
        println!(
            "  {}  {} messages, {} participants",
            path.display(),
            discussion.len(),
            discussion.participants().len()
        );
    }
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!(
        homeserver = %config.matrix.home_server,
        user_id = %config.matrix.user_id,
        home_channel = %config.bot.home_channel,
        timezone = %config.scheduler.timezone,
        "Starting salon"
    );

    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        tracing::info!(port = config.metrics.port, "Prometheus exporter listening");
    }
    salon_core::metrics::init_metrics();

    let client =
        matrix_client::create_client(&config.matrix.home_server, &config.bot.matrix_store_dir())
            .await?;
    matrix_client::login(&client, &config.matrix).await?;

    // Initial sync so joined rooms are known before anything is resolved
    tracing::info!("Performing initial sync...");
    let response = client
        .sync_once(SyncSettings::default())
        .await
        .context("Initial sync failed")?;

    let platform: Arc<dyn ChatPlatform> = Arc::new(MatrixPlatform::new(client.clone())?);
    let home_channel = matrix_client::resolve_channel(&client, &config.bot.home_channel).await?;
    if !platform.has_channel(&home_channel).await {
        return Err(SetupError::MissingChannel(config.bot.home_channel.clone()).into());
    }

    let features = Features::from_config(&config, Arc::clone(&platform), &home_channel)?;
    let mut registry = ModuleRegistry::new();
    features.install(&mut registry)?;
    let table = features.job_table(&config.scheduler.jobs)?;
    for job in table.iter() {
        tracing::info!(job = %job.name, rule = %job.rule, "Scheduled job");
    }

    let events = platform.event_stream().await?;
    let runtime = Runtime::new(
        Arc::clone(&platform),
        Arc::new(registry),
        config.bot.command_prefix.clone(),
    );

    let (bridge, endpoint) = submission_bridge();
    tokio::spawn(endpoint.run());
    let scheduler = Scheduler::new(table, config.scheduler.tz()?, bridge, Utc::now());
    let scheduler_thread = SchedulerThread::spawn(scheduler, config.scheduler.tick())?;

    let settings = SyncSettings::default().token(response.next_batch);
    tracing::info!("Bot ready, starting continuous sync loop");

    let outcome = tokio::select! {
        _ = runtime.run(events) => Err(anyhow::anyhow!("Event stream closed unexpectedly")),
        result = client.sync(settings) => match result {
            Ok(()) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Matrix sync failed")),
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
            Ok(())
        }
    };

    scheduler_thread.shutdown();
    platform.shutdown().await?;
    tracing::info!("salon stopped");
    outcome
}
