//! 数据库连接管理

use clinic_core::{ClinicError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// 数据库连接池
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// 建立连接池
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        tracing::info!("Database pool connected ({} max connections)", max_connections);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
