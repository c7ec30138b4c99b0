use std::sync::Arc;

use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use sobuy_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);
    let config = Arc::new(cfg);

    // Session store: Redis when configured, otherwise process-local memory
    let sessions: Arc<dyn api::session::SessionStore> = match config.redis_url() {
        Some(url) => {
            info!("Using Redis session store");
            Arc::new(api::session::RedisSessionStore::new(
                url,
                config.session_ttl_secs,
            )?)
        }
        None => {
            info!("No Redis URL configured; sessions are process-local and die on restart");
            Arc::new(api::session::InMemorySessionStore::new())
        }
    };

    // Outbound mail
    let mailer = api::mailer::build_mailer(&config);

    // Event channel and worker for the work that happens off the request path
    let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(
        event_rx,
        api::events::EventContext {
            db: db.clone(),
            mailer,
            order_recipients: config.notification_recipients(),
        },
    ));

    // Aggregate app services used by HTTP handlers
    let services =
        api::handlers::AppServices::new(db.clone(), config.clone(), sessions, event_sender);

    let state = Arc::new(api::AppState {
        db,
        config: config.clone(),
        services,
    });

    let app = api::app(state);

    // Bind and serve
    let addr = format!("{}:{}", config.host, config.port);
    info!("sobuy-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
