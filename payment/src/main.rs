//! sp-payment Binary
//!
//! Runs the payment service: ledger storage, the identity client and the profile event
//! subscriber.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sp_payment_common::SnowflakeGenerator;
use sp_payment_crypto::FieldCipher;
use sp_payment_ledger::PgRepository;
use sp_payment_service::{
    EventSubscriber, HttpIdentityClient, Metrics, PaymentConfig, PgEventPublisher,
    ProfileEventHandler, ServiceContext, Services,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting sp-payment");

    // Load configuration
    let config = PaymentConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let cipher = FieldCipher::new(config.db_key.clone(), config.hash_key.clone())
        .map_err(|e| anyhow::anyhow!("Field cipher: {}", e))?;

    let repo = PgRepository::connect(&config.database_url, config.db_max_connections).await?;
    if config.ignore_migrations {
        info!("Skipping migrations");
    } else {
        repo.migrate().await?;
        info!("Migrations applied");
    }
    let pool = repo.pool().clone();

    let identity = HttpIdentityClient::new(
        config.auth_service_addr.clone(),
        config.identity_timeout,
        &config.service_name,
    )?;
    let publisher = Arc::new(PgEventPublisher::new(pool.clone()));
    let metrics = Arc::new(Metrics::new());

    let ctx = Arc::new(ServiceContext::new(
        Arc::new(repo),
        cipher,
        Arc::new(identity),
        publisher.clone(),
        Arc::new(SnowflakeGenerator::new(config.machine_id)),
        config.system_account_id,
        metrics.clone(),
    ));
    let services = Services::new(ctx);

    // Keep profiles in step with the identity service
    let handler = ProfileEventHandler::new(
        services.customers.clone(),
        services.merchants.clone(),
        publisher,
    );
    let subscriber = EventSubscriber::new(Arc::new(handler), metrics.clone());
    let listener = EventSubscriber::listen(&pool).await?;
    let events = tokio::spawn(async move { subscriber.run(listener).await });

    info!(
        service_id = %config.service_id,
        environment = ?config.environment,
        "sp-payment running"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    events.abort();
    info!(metrics = ?metrics.snapshot(), "sp-payment shutdown complete");
    Ok(())
}
