//! # PostgreSQL Store
//!
//! PostgreSQL implementation of [`BackingStore`] using sqlx.
//!
//! Records are split over two tables: `aggregate_records` holds one row per
//! aggregate with its version, `aggregate_fields` holds one JSONB row per
//! field. A partial update therefore only touches the rows of the fields it
//! changes. See `migrations/` for the schema.

use crate::config::DatabaseConfig;
use crate::domain::value_objects::{AggregateKey, Version};
use crate::infrastructure::persistence::traits::{
    BackingStore, FetchedFields, FieldValues, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{info, instrument};

/// PostgreSQL implementation of [`BackingStore`].
///
/// Every write runs in its own transaction: the version check and the field
/// upserts commit together or not at all.
///
/// # Examples
///
/// ```ignore
/// use aggregate_repository::infrastructure::persistence::postgres::PostgresStore;
///
/// let store = PostgresStore::connect(&config.database).await?;
/// store.migrate().await?;
/// ```
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Connection` if the pool cannot connect.
    pub async fn connect(config: &DatabaseConfig) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| RepositoryError::connection(e.to_string()))?;
        info!(
            max_connections = config.max_connections,
            "connected to postgres"
        );
        Ok(Self::new(pool))
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Query` if a migration fails.
    pub async fn migrate(&self) -> RepositoryResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::query(e.to_string()))
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::query(e.to_string())
}

fn to_version(raw: i64) -> RepositoryResult<Version> {
    u64::try_from(raw)
        .map(Version::new)
        .map_err(|_| RepositoryError::serialization(format!("negative version {raw}")))
}

fn to_db_version(version: Version) -> RepositoryResult<i64> {
    i64::try_from(version.get())
        .map_err(|_| RepositoryError::serialization(format!("version {version} out of range")))
}

#[async_trait]
impl BackingStore for PostgresStore {
    #[instrument(skip(self, fields), fields(key = %key))]
    async fn fetch(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        fields: &[&str],
    ) -> RepositoryResult<Option<FetchedFields>> {
        // version and values must come from one snapshot
        let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let rows: Vec<FetchRow> = sqlx::query_as(
            r#"
            SELECT r.version, f.field_name, f.value
            FROM aggregate_records r
            LEFT JOIN aggregate_fields f
              ON f.aggregate_type = r.aggregate_type
             AND f.aggregate_key = r.aggregate_key
             AND f.field_name = ANY($3)
            WHERE r.aggregate_type = $1 AND r.aggregate_key = $2
            "#,
        )
        .bind(aggregate_type)
        .bind(key.as_str())
        .bind(&names)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        let Some(version) = rows.first().map(|row| row.version) else {
            return Ok(None);
        };

        let values: FieldValues = rows
            .into_iter()
            .filter_map(|row| Some((row.field_name?, row.value?)))
            .collect();

        Ok(Some(FetchedFields {
            version: to_version(version)?,
            values,
        }))
    }

    #[instrument(skip(self, values), fields(key = %key))]
    async fn insert(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        values: FieldValues,
    ) -> RepositoryResult<Version> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO aggregate_records (aggregate_type, aggregate_key, version)
            VALUES ($1, $2, $3)
            ON CONFLICT (aggregate_type, aggregate_key) DO NOTHING
            "#,
        )
        .bind(aggregate_type)
        .bind(key.as_str())
        .bind(to_db_version(Version::INITIAL)?)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        if inserted.rows_affected() == 0 {
            return Err(RepositoryError::duplicate(aggregate_type, key.as_str()));
        }

        upsert_fields(&mut tx, aggregate_type, key, values).await?;
        tx.commit().await.map_err(query_error)?;
        Ok(Version::INITIAL)
    }

    #[instrument(skip(self, changes), fields(key = %key))]
    async fn write(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
        expected: Option<Version>,
        changes: FieldValues,
    ) -> RepositoryResult<Version> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let bumped: Option<(i64,)> = match expected {
            Some(expected) => {
                sqlx::query_as::<_, (i64,)>(
                    r#"
                    UPDATE aggregate_records
                    SET version = version + 1
                    WHERE aggregate_type = $1 AND aggregate_key = $2 AND version = $3
                    RETURNING version
                    "#,
                )
                .bind(aggregate_type)
                .bind(key.as_str())
                .bind(to_db_version(expected)?)
                .fetch_optional(&mut *tx)
                .await
            }
            None => {
                sqlx::query_as::<_, (i64,)>(
                    r#"
                    UPDATE aggregate_records
                    SET version = version + 1
                    WHERE aggregate_type = $1 AND aggregate_key = $2
                    RETURNING version
                    "#,
                )
                .bind(aggregate_type)
                .bind(key.as_str())
                .fetch_optional(&mut *tx)
                .await
            }
        }
        .map_err(query_error)?;

        let Some((version,)) = bumped else {
            let current: Option<(i64,)> = sqlx::query_as(
                r#"
                SELECT version
                FROM aggregate_records
                WHERE aggregate_type = $1 AND aggregate_key = $2
                "#,
            )
            .bind(aggregate_type)
            .bind(key.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;

            return match (current, expected) {
                (Some((actual,)), Some(expected)) => Err(RepositoryError::version_conflict(
                    aggregate_type,
                    key.as_str(),
                    expected,
                    to_version(actual)?,
                )),
                _ => Err(RepositoryError::not_found(aggregate_type, key.as_str())),
            };
        };

        upsert_fields(&mut tx, aggregate_type, key, changes).await?;
        tx.commit().await.map_err(query_error)?;
        to_version(version)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(
        &self,
        aggregate_type: &'static str,
        key: &AggregateKey,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "DELETE FROM aggregate_records WHERE aggregate_type = $1 AND aggregate_key = $2",
        )
        .bind(aggregate_type)
        .bind(key.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, aggregate_type: &'static str) -> RepositoryResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM aggregate_records WHERE aggregate_type = $1")
                .bind(aggregate_type)
                .fetch_one(&self.pool)
                .await
                .map_err(query_error)?;

        Ok(count as u64)
    }
}

async fn upsert_fields(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    aggregate_type: &'static str,
    key: &AggregateKey,
    values: FieldValues,
) -> RepositoryResult<()> {
    for (field_name, value) in values {
        sqlx::query(
            r#"
            INSERT INTO aggregate_fields (aggregate_type, aggregate_key, field_name, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (aggregate_type, aggregate_key, field_name)
            DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(aggregate_type)
        .bind(key.as_str())
        .bind(&field_name)
        .bind(&value)
        .execute(&mut **tx)
        .await
        .map_err(query_error)?;
    }
    Ok(())
}

/// Row of the fetch join; field columns are null when no field matched.
#[derive(Debug, sqlx::FromRow)]
struct FetchRow {
    version: i64,
    field_name: Option<String>,
    value: Option<serde_json::Value>,
}
