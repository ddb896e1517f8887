use deposit_advisor::{
    api::{start_server, ApiState},
    config::AdvisorConfig,
    session::Advisor,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Loads .env as well
    let config = AdvisorConfig::from_env()?;

    info!("Deposit Advisor - API Server");
    info!(
        port = config.port,
        max_retries = config.controller.max_retries,
        top_k = config.top_k,
        "Configuration loaded"
    );

    let advisor = Advisor::from_config(&config)?;
    info!("Advisor initialized");

    start_server(ApiState::new(advisor), config.port).await?;

    Ok(())
}
