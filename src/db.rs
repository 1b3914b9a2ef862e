use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "user" (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        hashed_password TEXT NOT NULL
    );"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ix_user_username ON "user" (username);"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS ix_user_email ON "user" (email);"#,
    r#"CREATE TABLE IF NOT EXISTS todo (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        done BOOLEAN NOT NULL DEFAULT 0,
        user_id INTEGER REFERENCES "user" (id)
    );"#,
    r#"CREATE INDEX IF NOT EXISTS ix_todo_title ON todo (title);"#,
    r#"CREATE INDEX IF NOT EXISTS ix_todo_description ON todo (description);"#,
];

/// Opens a pool on `database_url`, creating the database file if needed.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
}

/// Creates the `user` and `todo` tables and their indexes if they don't exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!("schema ready");
    Ok(())
}

// Each in-memory connection is its own database, so tests pin the pool to one.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let pool = test_pool().await;
        init_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('user', 'todo') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, ["todo", "user"]);
    }

    #[tokio::test]
    async fn test_done_defaults_to_false() {
        let pool = test_pool().await;
        let done: bool = sqlx::query_scalar(
            "INSERT INTO todo (title, description) VALUES ('a', 'b') RETURNING done",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(!done);
    }
}
