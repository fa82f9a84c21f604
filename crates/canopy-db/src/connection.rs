//! Startup connection to the compliance store.
//!
//! The server talks to a standalone SurrealDB over WebSocket. The store
//! may still be starting when Canopy boots, so connecting retries a
//! bounded number of times before giving up.

use std::fmt;
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::{info, warn};

use crate::error::DbError;
use crate::schema::run_migrations;

/// Where the compliance store lives and how to reach it.
#[derive(Clone)]
pub struct DbConfig {
    /// `host:port` of the SurrealDB WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Connection attempts before startup fails.
    pub connect_attempts: u32,
    /// Pause between connection attempts.
    pub connect_backoff: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "canopy".into(),
            database: "compliance".into(),
            username: "root".into(),
            password: "root".into(),
            connect_attempts: 5,
            connect_backoff: Duration::from_secs(2),
        }
    }
}

// Keeps the password out of logged configuration.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_backoff", &self.connect_backoff)
            .finish()
    }
}

/// Owns the server's handle to the compliance store.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    async fn open(config: &DbConfig) -> Result<Surreal<Client>, surrealdb::Error> {
        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;
        Ok(db)
    }

    /// Connect with retries, then bring the schema up to date.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let attempts = config.connect_attempts.max(1);
        let mut attempt = 1;
        let db = loop {
            info!(
                url = %config.url,
                namespace = %config.namespace,
                database = %config.database,
                attempt,
                "Connecting to compliance store"
            );
            match Self::open(config).await {
                Ok(db) => break db,
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "Compliance store unavailable, retrying");
                    tokio::time::sleep(config.connect_backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        run_migrations(&db).await?;
        info!("Compliance store ready");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_password() {
        let config = DbConfig {
            password: "hunter2".into(),
            ..DbConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
