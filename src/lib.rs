use sqlx::SqlitePool;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod repository;
pub mod route;
pub mod schema;

use auth::TokenService;

// Struct representing the application state
pub struct AppState {
    pub db: SqlitePool,
    pub tokens: TokenService,
}
