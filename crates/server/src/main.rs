//! # Askthen Server
//!
//! HTTP front end and CLI for the ask-then-answer pipeline.

mod api;
mod config;
mod imaging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use askthen_core::completion::ImagePayload;
use askthen_core::models::ModelConfig;
use askthen_core::orchestrator::{AskRequest, Orchestrator, PipelineEvent, PipelineEventKind};
use askthen_core::roles::RoleCatalog;

use crate::api::{AppState, ClientFactory};
use crate::config::{config_path, PersistedConfig};

#[derive(Parser, Clone)]
#[command(author, version, about = "Askthen - clarify first, then answer")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Interface to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Run one question through the pipeline (CLI mode, no server)
    Ask {
        /// The question
        query: String,
        /// Answer to a clarifying question; repeat for several
        #[arg(short, long = "clarification")]
        clarifications: Vec<String>,
        /// Image file to attach; repeat for several
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,
    },
    /// Print the role catalog
    Roles,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn client_factory() -> ClientFactory {
    Arc::new(|config: &ModelConfig| config.create_client())
}

fn log_diagnostics(config: &ModelConfig, catalog: &RoleCatalog) {
    tracing::info!(
        provider = config.provider.display_name(),
        model = %config.model,
        vision_model = %config.vision_model,
        base_url = config.effective_base_url(),
        timeout_secs = config.request_timeout_secs,
        "Completion backend"
    );
    if config.api_key_present() {
        tracing::info!(var = config.provider.env_var(), "API key found");
    } else {
        tracing::warn!(var = config.provider.env_var(), "API key not set");
    }
    tracing::info!(roles = catalog.len(), "Role catalog loaded");
}

async fn run_server(host: String, port: u16) -> anyhow::Result<()> {
    let path = config_path();
    let config = PersistedConfig::load_from(&path).await;
    let catalog = Arc::new(RoleCatalog::default());
    log_diagnostics(&config.model_config()?, &catalog);

    let state = Arc::new(AppState::new(config, path, catalog, client_factory()));
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))?;
    tracing::info!("Askthen server running at http://{}", addr);
    tracing::info!("   Ask:     /api/v1/ask (POST)");
    tracing::info!("   Upload:  /api/v1/upload-image (POST, multipart)");
    tracing::info!("   Roles:   /api/v1/roles (GET)");
    tracing::info!("   Config:  /api/v1/config (GET, PATCH)");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_image(path: &Path) -> anyhow::Result<ImagePayload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let prepared = imaging::prepare_upload(&bytes)
        .with_context(|| format!("cannot prepare {}", path.display()))?;
    Ok(ImagePayload::jpeg(prepared.jpeg))
}

fn print_event(event: &PipelineEvent) {
    match event.kind {
        PipelineEventKind::StageStarted => println!("… {}", event.stage),
        PipelineEventKind::StageCompleted => println!("✓ {}", event.stage),
        PipelineEventKind::RetryTriggered => println!("↻ answer rejected, retrying"),
        PipelineEventKind::ClarificationRequested => println!("? more information needed"),
        PipelineEventKind::ImageAnalysisFailed => println!("✗ image analysis failed"),
        PipelineEventKind::PipelineFailed => println!("✗ {} failed", event.stage),
        PipelineEventKind::PipelineStarted | PipelineEventKind::PipelineCompleted => {}
    }
}

async fn run_cli(
    query: String,
    clarifications: Vec<String>,
    images: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let config = PersistedConfig::load().await;
    let model_config = config.model_config()?;
    let catalog = Arc::new(RoleCatalog::default());
    log_diagnostics(&model_config, &catalog);

    let orchestrator = Orchestrator::new(model_config.create_client()?, catalog)
        .with_config(config.pipeline_config());

    let images = images
        .iter()
        .map(|path| load_image(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut request = AskRequest::new(query).with_images(images);
    if !clarifications.is_empty() {
        request = request.with_clarifications(clarifications);
    }

    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(32);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let result = orchestrator.run_with_events(request, tx).await;
    let _ = printer.await;
    let result = result?;

    println!();
    println!("Role: {}", result.role());
    if let Some(questions) = result.questions() {
        println!("Please clarify, then rerun with --clarification for each answer:");
        for (i, question) in questions.iter().enumerate() {
            println!("  {}. {}", i + 1, question);
        }
        return Ok(());
    }
    if let Some(answer) = result.answer() {
        println!("\n{}\n", answer);
    }
    if let (Some(judge), Some(reason)) = (result.judge(), result.reason()) {
        let verdict = if judge { "passed" } else { "not passed" };
        println!("Review: {} ({})", verdict, reason);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Ask {
            query,
            clarifications,
            images,
        }) => run_cli(query, clarifications, images).await,
        Some(CliCommand::Roles) => {
            for role in RoleCatalog::default().roles() {
                println!("{}: {} - {}", role.id, role.name, role.short_description);
            }
            Ok(())
        }
        Some(CliCommand::Serve { host, port }) => run_server(host, port).await,
        None => run_server("127.0.0.1".to_string(), 8000).await,
    }
}
