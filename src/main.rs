use admin_portal::{
    AppState,
    bootstrap::ensure_admin,
    config::{AppConfig, Env},
    create_router,
    repository::{self, RepositoryState, SqliteRepository},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, opens and migrates the database, makes sure
/// an administrator exists, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fails fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG wins over the default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "admin_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = repository::connect(&config.db_url)
        .await
        .expect("FATAL: Failed to open the SQLite database. Check DATABASE_URL.");
    repository::migrate(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    // 4. Bootstrap administrator
    match ensure_admin(&repo, &config.admin).await {
        Ok(Some(user_id)) => tracing::info!(user_id, "Bootstrap administrator ready"),
        Ok(None) => tracing::debug!("Active administrator already present"),
        Err(e) => panic!("FATAL: Failed to bootstrap the administrator account: {e}"),
    }

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState { repo, config });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly");
}
