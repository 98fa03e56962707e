use {
    axum::extract::DefaultBodyLimit,
    pay_sync::{
        AppState,
        domain::payment::ProviderKind,
        gateway::{
            GatewayConfig, GatewayRegistry, ProviderGateway, bank_transfer::BankTransferGateway,
            card::CardGateway, http::ProviderHttpClient, mobile::MobileGateway,
            virtual_account::VirtualAccountGateway,
        },
        services::{
            lifecycle::LifecycleEngine,
            notify::TracingNotifier,
            sweeper::{SWEEP_INTERVAL, run_sweeper},
        },
        store::{PaymentStore, postgres::PgStore},
        transport,
    },
    sqlx::postgres::PgPoolOptions,
    std::{env, sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tower_http::timeout::TimeoutLayer,
};

const PROVIDER_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let store: Arc<dyn PaymentStore> = Arc::new(PgStore::new(pool));
    let registry = build_registry().expect("failed to build gateway registry");
    let engine = Arc::new(LifecycleEngine::new(
        store,
        Arc::new(registry),
        Arc::new(TracingNotifier),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(run_sweeper(engine.clone(), SWEEP_INTERVAL, shutdown_rx));

    let app = transport::http::router(AppState { engine })
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(DefaultBodyLimit::max(64 * 1024)); // provider webhooks are small

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("listening on 0.0.0.0:3000");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
}

/// One adapter per provider the deployment has credentials for, read from
/// `<PROVIDER>_BASE_URL` / `<PROVIDER>_SECRET_KEY` / `<PROVIDER>_WEBHOOK_SECRET`.
fn build_registry() -> Result<GatewayRegistry, pay_sync::domain::error::PaymentError> {
    let http = ProviderHttpClient::new(PROVIDER_CALL_TIMEOUT)?;
    let mut registry = GatewayRegistry::new();

    for provider in [
        ProviderKind::Toss,
        ProviderKind::Iamport,
        ProviderKind::Kakao,
        ProviderKind::Naver,
    ] {
        let Some(config) = config_from_env(provider) else {
            tracing::info!(%provider, "no credentials configured, gateway disabled");
            continue;
        };

        let gateway: Arc<dyn ProviderGateway> = match provider {
            ProviderKind::Toss => Arc::new(CardGateway::new(provider, http.clone(), config)),
            ProviderKind::Iamport => {
                Arc::new(BankTransferGateway::new(provider, http.clone(), config))
            }
            ProviderKind::Naver => {
                Arc::new(VirtualAccountGateway::new(provider, http.clone(), config))
            }
            ProviderKind::Kakao => Arc::new(MobileGateway::new(provider, http.clone(), config)),
        };
        registry = registry.register(gateway);
    }

    Ok(registry)
}

fn config_from_env(provider: ProviderKind) -> Option<GatewayConfig> {
    let prefix = provider.as_str();
    Some(GatewayConfig {
        base_url: env::var(format!("{prefix}_BASE_URL")).ok()?,
        secret_key: env::var(format!("{prefix}_SECRET_KEY")).ok()?,
        webhook_secret: env::var(format!("{prefix}_WEBHOOK_SECRET")).ok()?,
    })
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
