use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use courier_notification_service::channel::{
    ChannelAdapter, EmailAdapter, InAppAdapter, SmsAdapter, WebhookAdapter,
};
use courier_notification_service::config::Settings;
use courier_notification_service::notification::Channel;
use courier_notification_service::queue::create_channel_queues;
use courier_notification_service::repository::{
    MemoryNotificationRepository, MemoryTemplateRepository, NotificationRepository,
    TemplateRepository,
};
use courier_notification_service::retry::RetryPolicy;
use courier_notification_service::server::{create_app, AppState};
use courier_notification_service::worker::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Connect Redis when the queue backend needs it; failing to reach it
    // at startup is fatal, the service must not accept submissions it
    // cannot store.
    let redis_conn = if settings.queue.backend == "redis" {
        let client = redis::Client::open(settings.queue.redis_url.as_str())
            .context("Invalid Redis URL")?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        tracing::info!(url = %settings.queue.redis_url, "Connected to Redis");
        Some(conn)
    } else {
        None
    };

    // Build queues, repositories, and adapters
    let queues = create_channel_queues(&settings.queue, redis_conn);
    let records: Arc<dyn NotificationRepository> = Arc::new(MemoryNotificationRepository::new());
    let templates: Arc<dyn TemplateRepository> = Arc::new(MemoryTemplateRepository::new());

    let email = Arc::new(
        EmailAdapter::new(settings.smtp.clone(), templates.clone())
            .map_err(|e| anyhow::anyhow!("Failed to build SMTP transport: {e}"))?,
    );
    let sms = Arc::new(SmsAdapter::new(settings.sms.clone()));
    let webhook = Arc::new(WebhookAdapter::new(settings.webhook.clone()));
    let in_app = Arc::new(InAppAdapter::new());

    // Spawn the per-channel worker pools
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let policy = RetryPolicy::new(&settings.retry);
    let adapters: [(Channel, Arc<dyn ChannelAdapter>); 4] = [
        (Channel::Email, email),
        (Channel::Sms, sms),
        (Channel::Webhook, webhook),
        (Channel::InApp, in_app),
    ];
    let mut worker_handles = Vec::new();
    for (channel, adapter) in adapters {
        let pool = WorkerPool::new(
            channel,
            queues.get(channel).clone(),
            adapter,
            records.clone(),
            policy.clone(),
            &settings.workers,
        );
        worker_handles.extend(pool.spawn(&shutdown_tx));
    }

    // Create Axum app
    let state = AppState::new(settings.clone(), queues, records, templates);
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx.clone()))
        .await?;

    // Wait for workers to finish their in-flight jobs
    tracing::info!("Waiting for worker pools to finish...");
    futures::future::join_all(worker_handles).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the worker pools
    let _ = shutdown_tx.send(());
}
