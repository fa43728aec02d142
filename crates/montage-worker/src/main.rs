//! Montage render worker binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use montage_models::{
    timeline_schema, Phase, RenderRequest, TaskStatus, TimelineDocument, TransitionSpec,
};
use montage_worker::{ArtifactJanitor, RenderPipeline, TaskService, TaskStore, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "montage-worker", version, about = "Render timelines and clip operations with FFmpeg")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a timeline document
    Render {
        /// Timeline JSON file
        timeline: PathBuf,
        /// Copy the finished render here
        output: Option<PathBuf>,
    },
    /// Apply a transition to one resource, or between two
    Transition {
        /// fade, zoom, dissolve, wipe or slide
        kind: String,
        first: String,
        second: Option<String>,
        #[command(flatten)]
        transition: TransitionArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Keep [start, end) of a resource
    Cut {
        resource_id: String,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Drop seconds from the head and tail of a resource
    Trim {
        resource_id: String,
        #[arg(long, default_value_t = 0.0)]
        trim_start: f64,
        #[arg(long, default_value_t = 0.0)]
        trim_end: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Concatenate resources, optionally joining seams with a transition
    Merge {
        #[arg(required = true, num_args = 2..)]
        resource_ids: Vec<String>,
        /// dissolve, wipe or slide
        #[arg(long)]
        transition: Option<String>,
        #[command(flatten)]
        transition_args: TransitionArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the timeline document JSON schema
    Schema,
}

#[derive(Debug, Args)]
struct TransitionArgs {
    /// Transition length in seconds
    #[arg(long, default_value_t = 1.0)]
    duration: f64,
    /// in/out for fade and zoom, left/right/up/down for wipe and slide
    #[arg(long)]
    direction: Option<String>,
}

impl TransitionArgs {
    fn spec(&self, kind: &str) -> anyhow::Result<TransitionSpec> {
        Ok(TransitionSpec::parse(
            kind,
            self.duration,
            self.direction.as_deref(),
            Phase::In,
        )?)
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("montage=info".parse()?);

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
    Ok(())
}

async fn build_request(command: Command) -> anyhow::Result<(RenderRequest, Option<PathBuf>)> {
    let built = match command {
        Command::Render { timeline, output } => {
            let json = tokio::fs::read_to_string(&timeline)
                .await
                .with_context(|| format!("reading {}", timeline.display()))?;
            let timeline = TimelineDocument::parse(&json)?;
            (RenderRequest::Export { timeline }, output)
        }
        Command::Transition {
            kind,
            first,
            second,
            transition,
            output,
        } => {
            let spec = transition.spec(&kind)?;
            (RenderRequest::Transition { first, second, spec }, output)
        }
        Command::Cut {
            resource_id,
            start,
            end,
            output,
        } => (RenderRequest::Cut { resource_id, start, end }, output),
        Command::Trim {
            resource_id,
            trim_start,
            trim_end,
            output,
        } => (
            RenderRequest::Trim {
                resource_id,
                trim_start,
                trim_end,
            },
            output,
        ),
        Command::Merge {
            resource_ids,
            transition,
            transition_args,
            output,
        } => {
            let transition = transition
                .map(|kind| transition_args.spec(&kind))
                .transpose()?;
            (
                RenderRequest::Merge {
                    resource_ids,
                    transition,
                },
                output,
            )
        }
        Command::Schema => anyhow::bail!("schema does not render"),
    };
    Ok(built)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    if let Command::Schema = cli.command {
        println!("{}", serde_json::to_string_pretty(&timeline_schema())?);
        return Ok(());
    }

    let config = WorkerConfig::from_env();
    config.validate()?;
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        montage_worker::metrics::init_metrics(addr)?;
        info!("Serving metrics on {}", addr);
    }

    montage_media::check_ffmpeg()?;
    montage_media::check_ffprobe()?;

    let (request, copy_to) = build_request(cli.command).await?;

    let pipeline = RenderPipeline::from_config(&config).await?;
    let janitor = ArtifactJanitor::from_config(pipeline.outputs().clone(), &config);
    let service = TaskService::start(
        Arc::new(TaskStore::new()),
        Arc::new(pipeline),
        janitor,
        config.max_concurrent_renders,
        config.queue_capacity,
    );

    let task_id = service.submit(request).await?;
    let doc = service.wait(&task_id).await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);

    let succeeded = doc.status == TaskStatus::Completed;
    if let (true, Some(dst), Some(src)) = (succeeded, copy_to, doc.output_location.as_deref()) {
        tokio::fs::copy(src, &dst)
            .await
            .with_context(|| format!("copying render to {}", dst.display()))?;
        info!("Copied render to {}", dst.display());
    }

    service.shutdown(config.shutdown_timeout).await;

    if !succeeded {
        error!(task_id = %task_id, "Task ended {}", doc.status);
        std::process::exit(1);
    }
    Ok(())
}
