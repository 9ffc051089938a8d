//! Command-line entry point.
//!
//! `playlist-sync sync <COLLECTION>` mirrors a playlist into a directory;
//! `playlist-sync convert` extracts audio from the downloaded videos.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use playlist_sync::{
    Config, Event, FfmpegTranscoder, RunController, RunReport, StreamSelection, SyncMode,
    convert_directory, run_with_shutdown,
};

/// Keep a local directory in step with a remote playlist
#[derive(Parser, Debug)]
#[command(name = "playlist-sync")]
#[command(about = "Mirror a remote playlist into a local directory")]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v: per-item progress and debug logs, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every playlist item missing from the output directory
    Sync(SyncArgs),
    /// Extract .mp3 audio from every .mp4 lacking one
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Playlist identifier or URL
    collection: String,

    /// Output directory (default from config, else ./downloads)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Run policy: resume or overwrite
    #[arg(short = 'm', long = "mode")]
    mode: Option<String>,

    /// JSON configuration file
    #[arg(short = 'c', long = "config", env = "PLAYLIST_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Which variant to download per item
    #[arg(long = "selection", value_enum)]
    selection: Option<StreamSelection>,

    /// Total attempts per item, including the first
    #[arg(long = "retries")]
    retries: Option<u32>,

    /// Path to the yt-dlp executable
    #[arg(long = "yt-dlp")]
    yt_dlp: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Folder containing the files to convert
    #[arg(short = 'p', long = "path", default_value = "downloads")]
    path: PathBuf,

    /// Path to the ffmpeg executable
    #[arg(long = "ffmpeg")]
    ffmpeg: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Sync(args) => sync(args, cli.verbose).await,
        Command::Convert(args) => convert(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("warn,playlist_sync={default_level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

fn load_config(args: &SyncArgs) -> playlist_sync::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(output) = &args.output {
        config.download.output_dir = output.clone();
    }
    if let Some(selection) = args.selection {
        config.download.stream_selection = selection;
    }
    if let Some(retries) = args.retries {
        config.retry.max_attempts = retries;
    }
    if let Some(path) = &args.yt_dlp {
        config.tools.yt_dlp_path = Some(path.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn sync(args: SyncArgs, verbose: u8) -> playlist_sync::Result<()> {
    // Mode is checked before anything else happens
    let cli_mode = args.mode.as_deref().map(str::parse::<SyncMode>).transpose()?;
    let config = load_config(&args)?;
    let mode = cli_mode.unwrap_or(config.download.mode);

    let controller = RunController::from_config(&config)?;
    let printer = (verbose >= 1).then(|| {
        let mut events = controller.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(line) = describe(&event) {
                            println!("{line}");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Progress output fell behind");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    });

    let result = run_with_shutdown(&controller, &args.collection, config.output_dir(), mode).await;
    drop(controller);
    if let Some(printer) = printer {
        printer.await.ok();
    }

    let report = result?;
    print_summary(&report);
    Ok(())
}

async fn convert(args: ConvertArgs) -> playlist_sync::Result<()> {
    let tools = playlist_sync::ToolsConfig {
        ffmpeg_path: args.ffmpeg.clone(),
        ..Default::default()
    };
    let ffmpeg = FfmpegTranscoder::new(tools.resolve(tools.ffmpeg_path.as_ref(), "ffmpeg")?);

    let report = convert_directory(&args.path, "mp4", "mp3", &ffmpeg).await?;
    println!(
        "Converted {} of {} videos ({} already converted).",
        report.converted,
        report.total - report.skipped_existing,
        report.skipped_existing
    );
    if !report.failed.is_empty() {
        println!("Errored on:");
        for path in &report.failed {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

/// One progress line per item decision
fn describe(event: &Event) -> Option<String> {
    let line = match event {
        Event::RunStarted {
            collection,
            mode,
            directory,
        } => format!("Syncing {collection} into {} ({mode})", directory.display()),
        Event::DirectoryReset { directory } => {
            format!("Cleared {}", directory.display())
        }
        Event::ItemSkippedExisting { item_id } => format!("{item_id}: already present"),
        Event::ItemFetching { item_id, filename } => format!("{item_id}: downloading {filename}"),
        Event::ItemRetrying {
            item_id,
            attempt,
            error,
        } => format!("{item_id}: attempt {attempt} failed ({error}), retrying"),
        Event::ItemCompleted {
            item_id, attempts, ..
        } if *attempts > 1 => format!("{item_id}: downloaded after {attempts} attempts"),
        Event::ItemCompleted { item_id, .. } => format!("{item_id}: downloaded"),
        Event::ItemFailed {
            item_id,
            status,
            error,
        } => format!("{item_id}: {status}: {error}"),
        Event::RunFinished { .. } => return None,
    };
    Some(line)
}

fn print_summary(report: &RunReport) {
    println!(
        "Sync finished ({}): {} attempted, {} downloaded, {} already present, {} failed",
        report.mode, report.attempted, report.succeeded, report.skipped_existing, report.failed
    );
    if report.listing_incomplete {
        println!("Warning: the playlist listing ended early; later items were not considered.");
    }
    if report.cancelled {
        println!("Run was interrupted before all items were processed.");
    }
    if !report.failed_items.is_empty() {
        println!("Failed items:");
        for item in &report.failed_items {
            match &item.error {
                Some(error) => println!("  {} {}: {}", item.item_id, item.status, error),
                None => println!("  {} {}", item.item_id, item.status),
            }
        }
    }
}
