use payment_agent::{
    agent::PaymentAgent,
    api::{start_server, ApiState},
    config::AgentConfig,
    speech::{OpenAiSpeech, OpenAiTranscriber},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AgentConfig::from_env()?;

    if config.api_key.is_empty() {
        warn!("OPENAI_API_KEY not set: every model call will fail until it is configured");
    }

    info!("Payment Agent - API Server");
    info!(port = config.port, model = %config.chat_model, upload_dir = %config.upload_dir.display());

    // Create components
    let state = ApiState {
        agent: Arc::new(PaymentAgent::from_config(&config)?),
        transcriber: Arc::new(OpenAiTranscriber::from_config(&config)?),
        synthesizer: Arc::new(OpenAiSpeech::from_config(&config)?),
        upload_dir: Arc::new(config.upload_dir.clone()),
    };

    info!("Agent initialized, starting API server");

    start_server(state, config.port).await?;

    Ok(())
}
