use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Row, SqlitePool};
use tracing::{debug, info};

use crate::models::RatioRecord;

/// Metadata key holding the date of the last successful ratio collection
pub const RATIOS_LAST_COLLECTED: &str = "ratios_last_collected";

/// SQLX-based store for the scraped valuation ratios
#[derive(Clone)]
pub struct DatabaseManagerSqlx {
    pool: SqlitePool,
}

impl DatabaseManagerSqlx {
    /// Open (or create) the database file without touching existing ratio data
    pub async fn new(database_path: &str) -> Result<Self> {
        let path = database_path.strip_prefix("sqlite:").unwrap_or(database_path);
        debug!("Connecting to database: {}", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#
        ).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Open the database and start a fresh, empty `ratio` table
    pub async fn create_database(database_path: &str) -> Result<Self> {
        let database = Self::new(database_path).await?;
        database.reset_ratio_table().await?;
        info!("Database initialized at {}", database_path);
        Ok(database)
    }

    /// Drop and recreate the `ratio` table
    pub async fn reset_ratio_table(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS ratio")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE ratio (
                Tickers TEXT,
                PE REAL,
                PB REAL
            )
            "#
        ).execute(&self.pool).await?;

        Ok(())
    }

    pub async fn ratio_table_exists(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'ratio'"
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Insert all records in a single transaction
    pub async fn add_many(&self, records: &[RatioRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query("INSERT INTO ratio (Tickers, PE, PB) VALUES (?, ?, ?)")
                .bind(&record.ticker)
                .bind(record.pe)
                .bind(record.pb)
                .execute(&mut tx)
                .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    /// Remove rows where either ratio is zero or negative
    pub async fn delete_negatives(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ratio WHERE PE <= 0 OR PB <= 0")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Load every ratio row in insertion order
    pub async fn get_existing_data(&self) -> Result<Vec<RatioRecord>> {
        if !self.ratio_table_exists().await? {
            return Err(anyhow!(
                "No ratio table found in database. Run the `collect` command first."
            ));
        }

        let rows = sqlx::query("SELECT Tickers, PE, PB FROM ratio ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let ticker: Option<String> = row.try_get("Tickers")?;
            let pe: Option<f64> = row.try_get("PE")?;
            let pb: Option<f64> = row.try_get("PB")?;

            records.push(RatioRecord {
                ticker: ticker.unwrap_or_default(),
                pe: pe.unwrap_or(f64::NAN),
                pb: pb.unwrap_or(f64::NAN),
            });
        }

        Ok(records)
    }

    pub async fn count_ratios(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratio")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stamp today's date as the last collection date
    pub async fn mark_collected(&self) -> Result<()> {
        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        self.set_metadata(RATIOS_LAST_COLLECTED, &today).await
    }

    /// Days since the ratios were last collected, if ever
    pub async fn days_since_collection(&self) -> Result<Option<i64>> {
        match self.get_metadata(RATIOS_LAST_COLLECTED).await? {
            Some(date_str) => {
                let last_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")?;
                Ok(Some((Utc::now().date_naive() - last_date).num_days()))
            }
            None => Ok(None),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
