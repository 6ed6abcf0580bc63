use account_service::config::AccountServiceConfig;
use account_service::services::metrics::init_metrics;
use account_service::startup::Application;
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AccountServiceConfig::load().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "account-service",
        &config.common.log_level,
        &config.common.otlp_endpoint,
    );
    init_metrics()?;

    tracing::info!(
        environment = %config.common.environment,
        remote = config.remote.is_some(),
        "Starting account-service"
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;
    application.run_until_stopped().await?;

    Ok(())
}
