use event_bus::BusConfig;
use event_sync::ListenerOptions;
use payments_rs::{start_listeners, OrderReplicaStore, SERVICE_NAME};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let bus_config =
        BusConfig::from_env()?.with_stream_subjects(platform_contracts::stream_subjects());
    let listener_options = ListenerOptions::from_env(SERVICE_NAME)?;

    let bus = event_bus::connect(&bus_config).await?;
    let orders = Arc::new(OrderReplicaStore::new());
    let listeners = start_listeners(bus.clone(), orders, listener_options).await?;

    tracing::info!(listeners = listeners.len(), "Payments service running");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    bus.close().await?;
    for listener in listeners {
        listener.join().await;
    }
    Ok(())
}
