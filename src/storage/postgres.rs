use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{FileRecord, NewFileRecord};
use crate::storage::{MetadataStore, StorageResult};

const SELECT_FILE_RECORD: &str = r#"
    SELECT
        v.id AS view_id, s.id AS share_id, v.file_id, v.cid,
        v.hashed_passphrase, s.expiration, v.created_at
    FROM views v
    JOIN shares s ON s.view_id = v.id
"#;

#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database_name,
            "Connected to PostgreSQL"
        );

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, bringing its schema up to date.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    /// Shared with the job queue so both use one pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStorage {
    async fn create_file_record(&self, record: NewFileRecord) -> StorageResult<FileRecord> {
        let view_id = Uuid::new_v4();
        let share_id = Uuid::new_v4();
        let created_at = OffsetDateTime::now_utc();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO views (id, file_id, cid, hashed_passphrase, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(view_id)
        .bind(&record.file_id)
        .bind(&record.cid)
        .bind(&record.hashed_passphrase)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO shares (id, view_id, expiration) VALUES ($1, $2, $3)")
            .bind(share_id)
            .bind(view_id)
            .bind(record.expiration)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(FileRecord {
            view_id,
            share_id,
            file_id: record.file_id,
            cid: record.cid,
            hashed_passphrase: record.hashed_passphrase,
            expiration: record.expiration,
            created_at,
        })
    }

    async fn find_by_view(&self, view_id: &Uuid) -> StorageResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRecord>(&format!("{SELECT_FILE_RECORD} WHERE v.id = $1"))
            .bind(view_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn find_by_share(&self, share_id: &Uuid) -> StorageResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRecord>(&format!("{SELECT_FILE_RECORD} WHERE s.id = $1"))
            .bind(share_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn delete_file_record(&self, share_id: &Uuid) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let view_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM shares WHERE id = $1 RETURNING view_id")
                .bind(share_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(view_id) = view_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query("DELETE FROM views WHERE id = $1")
            .bind(view_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn tighten_expiration(
        &self,
        share_id: &Uuid,
        deadline: OffsetDateTime,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE shares SET expiration = LEAST(expiration, $2) WHERE id = $1")
            .bind(share_id)
            .bind(deadline)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_expired(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> StorageResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRecord>(&format!(
            "{SELECT_FILE_RECORD} WHERE s.expiration <= $1 ORDER BY s.expiration LIMIT $2"
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
