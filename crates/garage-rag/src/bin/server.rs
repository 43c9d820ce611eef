//! garage-rag server binary
//!
//! Run with: cargo run -p garage-rag --bin garage-rag-server -- --config garage-rag.toml

use std::path::PathBuf;

use clap::Parser;
use garage_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Question answering over uploaded PDF manuals
#[derive(Debug, Parser)]
#[command(name = "garage-rag-server", version)]
struct Args {
    /// TOML configuration file (defaults to $GARAGE_RAG_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "garage_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                        Garage RAG                         ║
║            Ask questions about your car manuals           ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedder: {:?} ({})", config.embeddings.provider, config.embeddings.model());
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - Generator: {:?} ({})", config.llm.provider, config.llm.model());
    tracing::info!("  - Index: {}", config.index.storage_path.display());
    tracing::info!("  - Passages per question: {}", config.retrieval.top_k);

    let server = RagServer::new(config).await?;

    let state = server.state();
    match state.generator().health_check().await {
        Ok(true) => tracing::info!("Generator {} is reachable", state.generator().name()),
        _ => tracing::warn!(
            "Generator {} is not reachable; answers will carry a generation error",
            state.generator().name()
        ),
    }
    match state.embedder().health_check().await {
        Ok(true) => tracing::info!("Embedder {} is ready", state.embedder().name()),
        _ => tracing::warn!("Embedder {} is not reachable", state.embedder().name()),
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /upload    - Upload a PDF (field: file)");
    println!("  POST /generate  - Ask a question (fields: prompt, optional file, optional k)");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
