//! AIS forwarder service

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::signal;
use tracing::info;

use ais_forwarder::cache::{DownsampleCache, FailedDeliveryQueue};
use ais_forwarder::config::AppConfig;
use ais_forwarder::errors::AisPluginError;
use ais_forwarder::exchange::{ExchangePublisher, ExchangeService};
use ais_forwarder::feed::TcpFeed;
use ais_forwarder::nats::NatsExchange;
use ais_forwarder::registration::RegistrationStateMachine;
use ais_forwarder::scheduler::Scheduler;
use ais_forwarder::service::AisService;

#[tokio::main]
async fn main() -> Result<(), AisPluginError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration, preferring environment variables and config
    // files. Configuration problems are the only startup-fatal errors.
    let config = AppConfig::load()?;
    config.validate()?;

    // The client reconnects in the background, so bus unavailability
    // never prevents the service from starting.
    let client = async_nats::ConnectOptions::new()
        .retry_on_initial_connect()
        .connect(&config.exchange.url)
        .await
        .map_err(|e| AisPluginError::ExchangeConnectionError(e.to_string()))?;
    let publisher: Arc<dyn ExchangePublisher> =
        Arc::new(NatsExchange::new(client, config.exchange.subjects.clone()));

    let cache = Arc::new(DownsampleCache::new());
    let failed = Arc::new(FailedDeliveryQueue::new());
    let exchange = Arc::new(ExchangeService::new(
        publisher.clone(),
        config.plugin.group_id.clone(),
    ));
    let registration = Arc::new(RegistrationStateMachine::new(
        publisher.clone(),
        &config.plugin,
    ));
    let service = Arc::new(AisService::new(
        config.feed.clone(),
        Box::new(TcpFeed::new()),
        cache,
        failed,
        exchange,
        registration.clone(),
    ));

    let periods = config.scheduler.clone();
    let mut scheduler = Scheduler::new();
    scheduler.every("feed-poll", periods.feed_poll_interval, {
        let service = service.clone();
        move || {
            let service = service.clone();
            async move {
                service.poll_feed().await;
                ControlFlow::Continue(())
            }
        }
    });
    scheduler.every("registration", periods.registration_interval, {
        let registration = registration.clone();
        move || {
            let registration = registration.clone();
            async move { registration.tick().await }
        }
    });
    scheduler.every("movement-flush", periods.movement_flush_interval, {
        let service = service.clone();
        move || {
            let service = service.clone();
            async move {
                service.flush_movements().await;
                ControlFlow::Continue(())
            }
        }
    });
    scheduler.every("delivery-retry", periods.delivery_retry_interval, {
        let service = service.clone();
        move || {
            let service = service.clone();
            async move {
                service.retry_failed_deliveries().await;
                ControlFlow::Continue(())
            }
        }
    });
    scheduler.every("asset-flush", periods.asset_flush_interval, {
        let service = service.clone();
        move || {
            let service = service.clone();
            async move {
                service.flush_assets().await;
                ControlFlow::Continue(())
            }
        }
    });

    info!("AIS forwarder started as {}", config.plugin.group_id);
    signal::ctrl_c().await?;
    info!("Received shutdown signal");

    scheduler.shutdown(periods.shutdown_grace).await;
    service.shutdown(periods.shutdown_grace).await;
    registration.unregister().await;

    Ok(())
}
