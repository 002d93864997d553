//! Training video review binary.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tacreview_models::SessionReport;
use tacreview_vision::DEFAULT_CONTEXT;
use tacreview_worker::{render_text, GeminiReviewSession, ReportExporter, WorkerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Tactical review of urban warfare training videos", long_about = None)]
struct Cli {
    /// Training video to analyze
    #[arg(required_unless_present = "print_schema")]
    video: Option<PathBuf>,

    /// Exercise description passed to the vision model
    #[arg(long, env = "TACREVIEW_CONTEXT", default_value = DEFAULT_CONTEXT)]
    context: String,

    /// Root directory for exported artifacts
    #[arg(long, env = "TACREVIEW_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Print the report without writing artifacts
    #[arg(long)]
    no_export: bool,

    /// Print the JSON schema of the session report and exit
    #[arg(long)]
    print_schema: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing();

    if let Err(e) = run(cli).await {
        error!("Review failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tacreview=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.print_schema {
        let schema = schemars::schema_for!(SessionReport);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let video = cli.video.context("No video path given")?;

    let mut config = WorkerConfig::from_env();
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    info!("Worker config: {:?}", config);

    tacreview_media::check_ffprobe()?;
    tacreview_media::check_ffmpeg()?;

    let session = GeminiReviewSession::from_config(&config)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, finishing with a partial report");
            cancel_tx.send(true).ok();
        }
    });

    let output = session.run(&video, &cli.context, Some(cancel_rx)).await?;

    println!("{}", render_text(&output.report));

    if !cli.no_export {
        let exporter = ReportExporter::new(&config.output_dir);
        let paths = exporter
            .export(&output.report, &output.frames)
            .await
            .with_context(|| format!("Failed to export to {}", config.output_dir.display()))?;
        info!("Artifacts written to {}", paths.root.display());
    }

    Ok(())
}
