//! Database layer for PersonaIQ
//!
//! Provides:
//! - SeaORM entity models
//! - Connection pool management
//! - Idempotent schema bootstrap (pgvector)

pub mod models;
pub mod schema;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: Arc<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts).await.map_err(|e| AppError::Storage {
            message: format!("Failed to connect to database: {}", e),
        })?;

        info!("Database connection established");

        Ok(Self { conn: Arc::new(conn) })
    }

    /// Wrap an already established connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn: Arc::new(conn) }
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Database ping failed: {}", e),
            })?;
        Ok(())
    }
}
