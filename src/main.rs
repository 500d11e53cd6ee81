//! renewal-engine - runs the renewal driver against Postgres and Stripe
//! until interrupted.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use renewal_engine::adapters::postgres::{
    self, PostgresActionQueue, PostgresRenewalLedger, PostgresSubscriptionRepository,
};
use renewal_engine::adapters::stripe::{StripeGateway, StripeGatewayConfig};
use renewal_engine::adapters::{RenewalRunner, RenewalRunnerConfig, TracingNotifier};
use renewal_engine::application::{
    CancelLapsedSubscriptionsHandler, PaymentProcessor, ProcessRenewalHandler, Scheduler,
};
use renewal_engine::config::AppConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.runtime.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config);

    tracing::info!(
        environment = ?config.runtime.environment,
        database = %config.database.redacted_url(),
        action_hook = %config.billing.action_hook,
        "Starting renewal engine"
    );

    // Storage
    let pool = postgres::connect(&config.database).await?;
    let repository = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let scheduler = Arc::new(Scheduler::with_hook(
        Arc::new(PostgresActionQueue::new(pool.clone())),
        config.billing.action_hook.clone(),
    ));
    let ledger = Arc::new(PostgresRenewalLedger::new(pool));

    // Gateway
    let mut gateway_config = StripeGatewayConfig::new(config.payment.stripe_api_key.clone())
        .with_timeout(config.payment.gateway_timeout());
    if let Some(url) = &config.payment.api_base_url {
        gateway_config = gateway_config.with_base_url(url.clone());
    }
    let gateway = Arc::new(StripeGateway::new(gateway_config)?);
    let processor = Arc::new(PaymentProcessor::with_timeout(
        gateway,
        config.payment.gateway_timeout(),
    ));

    // Handlers
    let notifier = Arc::new(TracingNotifier::new());
    let renewals = Arc::new(ProcessRenewalHandler::new(
        repository.clone(),
        processor,
        scheduler.clone(),
        notifier.clone(),
        ledger,
        Arc::new(config.billing.retry_policy()?),
    ));
    let lapsed = Arc::new(CancelLapsedSubscriptionsHandler::new(
        repository.clone(),
        scheduler.clone(),
        notifier,
    ));

    let runner = RenewalRunner::with_config(
        scheduler,
        repository,
        renewals,
        lapsed,
        RenewalRunnerConfig::from(&config.runner),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, finishing current pass");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}
