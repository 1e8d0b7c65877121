use {
    gastro_pay::{
        AppState,
        adapters::{http, providers::ProviderRegistry},
        config::Config,
        domain::store::Store,
        infra::{mailer::LogMailer, memory::MemoryStore, postgres::PgStore},
        metrics::Metrics,
        services::notifier::{RetryPolicy, run_notifier},
    },
    sqlx::postgres::PgPoolOptions,
    std::{error::Error, sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(3))
                .connect(url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let providers = ProviderRegistry::from_config(&config)?;
    if let Err(e) = providers.default_provider() {
        tracing::warn!(provider = %config.payment_provider, error = %e, "default payment provider unavailable");
    }

    let metrics = Arc::new(Metrics::new());
    let (state, notifications) = AppState::new(
        store.clone(),
        providers,
        metrics.clone(),
        config.notify_queue_capacity,
        config.currency,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let notifier = tokio::spawn(run_notifier(
        notifications,
        store,
        Arc::new(LogMailer),
        metrics,
        RetryPolicy {
            max_attempts: config.notify_max_attempts.max(1),
            ..RetryPolicy::default()
        },
        shutdown_rx,
    ));

    let app = http::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(provider = %config.payment_provider, "listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = notifier.await {
        tracing::error!(error = %e, "notifier task failed");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
