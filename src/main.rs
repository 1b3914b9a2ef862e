//! Todo API: user signup/login and per-user Todo CRUD over SQLite.

use std::sync::Arc;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Server,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use todo_api::{auth::TokenService, config::Config, db, route::create_router, AppState};

// Entry point of the application
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "configuration loaded");

    // Connect to the database, creating it if it doesn't exist
    let pool = match db::connect(&config.database_url).await {
        Ok(pool) => {
            tracing::info!(database_url = %config.database_url, "connected to the database");
            pool
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to the database");
            std::process::exit(1);
        }
    };

    if let Err(err) = db::init_schema(&pool).await {
        tracing::error!(error = %err, "failed to create the schema");
        std::process::exit(1);
    }

    let tokens = TokenService::new(
        config.jwt_secret.as_bytes(),
        chrono::Duration::minutes(config.token_expire_minutes),
    );
    let app_state = Arc::new(AppState { db: pool, tokens });

    let origin = match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::error!(error = %err, origin = %config.cors_origin, "invalid CORS origin");
            std::process::exit(1);
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let app = create_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = config.socket_addr();
    tracing::info!(%addr, "server started");

    if let Err(err) = Server::bind(&addr).serve(app.into_make_service()).await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }
}
