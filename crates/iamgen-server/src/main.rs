use clap::{Parser, Subcommand};
use iamgen_core::AppConfig;
use iamgen_model::ChatCompletionsClient;
use iamgen_runtime::{PipelineOptions, PolicyPipeline};
use iamgen_server::{AppState, build_router};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "iamgen-server",
    version,
    about = "Generate and apply Google Cloud IAM policies from natural language"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default).
    Serve {
        /// Bind address, e.g. 0.0.0.0:8000. Overrides IAMGEN_BIND.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the generation pipeline once and print the result as JSON.
    Generate {
        /// What access to grant, in plain language.
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    match cli.cmd.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            config.validate()?;
            serve(config).await
        }
        Command::Generate { prompt } => {
            config.validate_model()?;
            generate(&config, &prompt).await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = build_router(state, &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("iamgen-server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn generate(config: &AppConfig, prompt: &str) -> anyhow::Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("prompt must not be empty");
    }
    let model = ChatCompletionsClient::from_config(&config.model)?;
    let pipeline = PolicyPipeline::new(Arc::new(model), PipelineOptions::from_config(&config.model));
    let outcome = pipeline.produce_policy(prompt).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
