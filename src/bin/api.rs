use commerce_agent_orchestrator::{
    agent::Orchestrator,
    api::start_server,
    model::GeminiClient,
    tools::create_default_registry,
    wallet::provider_from_env,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("GEMINI_API_KEY not set in .env; model calls will fail until it is configured");
        String::new()
    });

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Commerce Agent Orchestrator - API Server");
    info!("Port: {}", api_port);

    // Create components
    let provider = provider_from_env();
    let registry = create_default_registry(provider.clone());
    let model = Box::new(GeminiClient::new(gemini_api_key, registry.declarations())?);

    let orchestrator = Arc::new(Mutex::new(Orchestrator::new(model, registry, provider)));

    info!("Orchestrator initialized");

    // Start API server
    start_server(orchestrator, api_port).await?;

    Ok(())
}
