//! thread-agent - conversational agent over a remote assistant API
//!
//! Serves a plain-text chat endpoint with a small web UI, or runs an
//! interactive console menu. Both drive the same `Agent`.

mod agent;
mod api;
mod assistants;
mod config;
mod console;

use agent::{Agent, Credentials};
use api::{create_router, AppState};
use assistants::{ClientFactory, OpenAIClientFactory};
use clap::Parser;
use config::{AgentArgs, Cli, Command, API_KEY_ENV, ASSISTANT_ID_ENV};
use console::{Console, Prompter};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.command);

    let factory: Arc<dyn ClientFactory> = Arc::new(OpenAIClientFactory::new(
        cli.agent.base_url.clone(),
        cli.agent.request_timeout(),
    ));

    match cli.command {
        Command::Serve { port } => serve(&cli.agent, factory, port).await,
        Command::Console => run_console(&cli.agent, factory).await,
    }
}

fn init_logging(command: &Command) {
    let registry = tracing_subscriber::registry();
    match command {
        Command::Serve { .. } => registry
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "thread_agent=info,tower_http=debug".into()),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init(),
        // Keep stdout for the menu
        Command::Console => registry
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "thread_agent=warn".into()),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn serve(
    args: &AgentArgs,
    factory: Arc<dyn ClientFactory>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = args.require_credentials()?;
    let agent = Arc::new(Agent::new(credentials, factory, args.poll_config())?);

    // A failed start is not fatal: the first chat request retries
    if let Err(e) = agent.initialize().await {
        tracing::error!(error = %e, "Agent initialization failed at startup");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(AppState::new(agent.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(agent.clone()))
        .await?;

    agent.shutdown();
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling in-flight turns so open requests finish quickly
async fn shutdown_signal(agent: Arc<Agent>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    agent.shutdown();
}

async fn run_console(
    args: &AgentArgs,
    factory: Arc<dyn ClientFactory>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut prompter = Prompter::new(stdin, tokio::io::stdout());

    let Some(token) = prompter
        .value_or_prompt(args.api_key.as_deref(), API_KEY_ENV)
        .await?
    else {
        return Ok(());
    };
    let Some(assistant_id) = prompter
        .value_or_prompt(args.assistant_id.as_deref(), ASSISTANT_ID_ENV)
        .await?
    else {
        return Ok(());
    };

    let credentials = Credentials::new(token, Some(assistant_id))?;
    let agent = Arc::new(Agent::new(credentials, factory, args.poll_config())?);

    let mut console = Console::new(agent, prompter);
    console.initialize().await?;
    console.run().await?;
    Ok(())
}
