//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres and the
//! [`PgExposureStore`], which reads and writes the `customer_exposures`
//! table. Grouping and summing happen in SQL; only per-customer totals
//! cross the wire.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use ecl_core::{
    AsOfDate, BranchId, CustomerExposureTotal, Decimal, EclError, EclResult, ExposureFilter,
    ExposureRecord, SnapshotScope, StorageError,
};
use ecl_storage::ExposureStore;
use std::time::Duration;
use tokio_postgres::NoTls;

use crate::error::{ApiError, ApiResult};

const STORE_NAME: &str = "postgres";

/// Schema of the exposure table. Safe to run repeatedly.
pub const CREATE_EXPOSURE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS customer_exposures (
    id UUID PRIMARY KEY,
    customer_id VARCHAR(100) NOT NULL,
    branch_id UUID NOT NULL,
    currency VARCHAR(10) NOT NULL,
    as_of_date DATE NOT NULL,
    amortized_cost NUMERIC(18, 4) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_customer_exposures_snapshot
    ON customer_exposures (branch_id, as_of_date, currency);
"#;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout when acquiring a connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "ecl".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Reads `ECL_DB_HOST`, `ECL_DB_PORT`, `ECL_DB_NAME`, `ECL_DB_USER`,
    /// `ECL_DB_PASSWORD`, `ECL_DB_POOL_SIZE` and `ECL_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("ECL_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("ECL_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("ECL_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("ECL_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("ECL_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("ECL_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("ECL_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn query_failed(err: tokio_postgres::Error) -> EclError {
    tracing::error!("Database error: {:?}", err);
    StorageError::QueryFailed {
        store: STORE_NAME.to_string(),
        reason: err.to_string(),
    }
    .into()
}

fn insert_failed(err: tokio_postgres::Error) -> EclError {
    tracing::error!("Database insert error: {:?}", err);
    StorageError::InsertFailed {
        store: STORE_NAME.to_string(),
        reason: err.to_string(),
    }
    .into()
}

fn pool_unavailable(err: deadpool_postgres::PoolError) -> EclError {
    tracing::error!("Connection pool error: {:?}", err);
    StorageError::Unavailable {
        reason: err.to_string(),
    }
    .into()
}

// ============================================================================
// EXPOSURE STORE
// ============================================================================

/// Exposure store backed by the `customer_exposures` table.
#[derive(Clone)]
pub struct PgExposureStore {
    pool: Pool,
}

impl PgExposureStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create the exposure table and its index if missing.
    pub async fn ensure_schema(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(CREATE_EXPOSURE_TABLE).await?;
        Ok(())
    }

    async fn get_conn(&self) -> EclResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_unavailable)
    }
}

#[async_trait]
impl ExposureStore for PgExposureStore {
    async fn latest_as_of_date(&self, filter: &ExposureFilter) -> EclResult<Option<AsOfDate>> {
        let conn = self.get_conn().await?;
        let currency = filter.currency.as_ref().map(|c| c.as_str());

        let row = conn
            .query_one(
                "SELECT MAX(as_of_date) FROM customer_exposures \
                 WHERE ($1::uuid IS NULL OR branch_id = $1) \
                   AND ($2::text IS NULL OR currency = $2)",
                &[&filter.branch_id, &currency],
            )
            .await
            .map_err(query_failed)?;

        Ok(row.get::<_, Option<AsOfDate>>(0))
    }

    async fn customer_totals(
        &self,
        filter: &ExposureFilter,
        as_of_date: AsOfDate,
    ) -> EclResult<Vec<CustomerExposureTotal>> {
        let conn = self.get_conn().await?;
        let currency = filter.currency.as_ref().map(|c| c.as_str());

        let rows = conn
            .query(
                "SELECT customer_id, SUM(amortized_cost) FROM customer_exposures \
                 WHERE as_of_date = $1 \
                   AND ($2::uuid IS NULL OR branch_id = $2) \
                   AND ($3::text IS NULL OR currency = $3) \
                 GROUP BY customer_id \
                 ORDER BY customer_id",
                &[&as_of_date, &filter.branch_id, &currency],
            )
            .await
            .map_err(query_failed)?;

        Ok(rows
            .iter()
            .map(|row| {
                let customer_id: String = row.get(0);
                let total: Decimal = row.get(1);
                CustomerExposureTotal::new(customer_id, total)
            })
            .collect())
    }

    async fn insert_exposures(&self, records: &[ExposureRecord]) -> EclResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(insert_failed)?;
        let stmt = tx
            .prepare(
                "INSERT INTO customer_exposures \
                 (id, customer_id, branch_id, currency, as_of_date, amortized_cost, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .await
            .map_err(insert_failed)?;

        let mut written = 0;
        for record in records {
            written += tx
                .execute(
                    &stmt,
                    &[
                        &record.id,
                        &record.customer_id,
                        &record.branch_id,
                        &record.currency.as_str(),
                        &record.as_of_date,
                        &record.amortized_cost,
                        &record.created_at,
                        &record.updated_at,
                    ],
                )
                .await
                .map_err(insert_failed)?;
        }
        tx.commit().await.map_err(insert_failed)?;

        Ok(written)
    }

    async fn delete_snapshot(&self, scope: &SnapshotScope) -> EclResult<u64> {
        let conn = self.get_conn().await?;
        let currency = scope.currency.as_ref().map(|c| c.as_str());

        conn.execute(
            "DELETE FROM customer_exposures \
             WHERE branch_id = $1 AND as_of_date = $2 \
               AND ($3::text IS NULL OR currency = $3)",
            &[&scope.branch_id, &scope.as_of_date, &currency],
        )
        .await
        .map_err(query_failed)
    }

    async fn has_snapshot(&self, branch_id: BranchId, as_of_date: AsOfDate) -> EclResult<bool> {
        let conn = self.get_conn().await?;

        let row = conn
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM customer_exposures \
                 WHERE branch_id = $1 AND as_of_date = $2)",
                &[&branch_id, &as_of_date],
            )
            .await
            .map_err(query_failed)?;

        Ok(row.get(0))
    }

    async fn health_check(&self) -> EclResult<()> {
        let conn = self.get_conn().await?;

        // Simple query to verify connectivity
        conn.query_one("SELECT 1", &[]).await.map_err(query_failed)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecl_core::{MAX_AMOUNT_DECIMALS, MAX_AMOUNT_INTEGER_DIGITS};

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "ecl");
        assert_eq!(config.max_size, 16);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_create_pool_is_lazy() {
        // Pool creation does not connect, so an unreachable host still yields a pool.
        let config = DbConfig {
            host: "db.invalid".to_string(),
            ..DbConfig::default()
        };
        let store = PgExposureStore::from_config(&config).unwrap();
        assert_eq!(store.pool_size(), 0);
    }

    #[test]
    fn test_schema_declares_snapshot_index() {
        assert!(CREATE_EXPOSURE_TABLE.contains("customer_exposures"));
        assert!(CREATE_EXPOSURE_TABLE.contains("(branch_id, as_of_date, currency)"));
    }

    #[test]
    fn test_schema_keeps_four_amount_decimals() {
        let column = format!(
            "NUMERIC({}, {})",
            MAX_AMOUNT_INTEGER_DIGITS + MAX_AMOUNT_DECIMALS,
            MAX_AMOUNT_DECIMALS
        );
        assert!(CREATE_EXPOSURE_TABLE.contains(&format!("amortized_cost {}", column)));
    }
}
