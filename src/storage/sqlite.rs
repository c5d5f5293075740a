//! SQLite RecordStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::record::{IssuerRevRegRecord, RecordState, SequenceId};
use crate::storage::schema::{
    RevocationRegistries, CREATE_REVOCATION_REGISTRIES_INDEXES,
    CREATE_REVOCATION_REGISTRIES_TABLE,
};
use crate::storage::{RecordStore, Result, StorageError};

/// SQLite implementation of RecordStore.
///
/// The full record is kept as a JSON body. The columns next to it mirror
/// the fields queries filter on and are rewritten on every update.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a new SQLite record store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_REVOCATION_REGISTRIES_TABLE)
            .execute(&self.pool)
            .await?;
        for statement in CREATE_REVOCATION_REGISTRIES_INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn select_records() -> SelectStatement {
        Query::select()
            .columns([RevocationRegistries::SequenceId, RevocationRegistries::RecordData])
            .from(RevocationRegistries::Table)
            .order_by(RevocationRegistries::SequenceId, Order::Asc)
            .to_owned()
    }

    async fn fetch_records(&self, sql: String) -> Result<Vec<IssuerRevRegRecord>> {
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &SqliteRow) -> Result<IssuerRevRegRecord> {
    let sequence_id: i64 = row.get("sequence_id");
    let record_data: String = row.get("record_data");
    let mut record: IssuerRevRegRecord = serde_json::from_str(&record_data)?;
    record.assign_sequence_id(SequenceId::new(sequence_id as u64))?;
    Ok(record)
}

/// Translate unique constraint violations into the matching storage error.
fn map_write_error(error: sqlx::Error, record: &IssuerRevRegRecord) -> StorageError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            let message = db_error.message();
            if message.contains("revoc_reg_id") {
                return StorageError::DuplicateRevocRegId(
                    record.revoc_reg_id().unwrap_or_default().to_string(),
                );
            }
            if message.contains("record_id") {
                return StorageError::AlreadyExists(record.record_id());
            }
        }
    }
    StorageError::Database(error)
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, mut record: IssuerRevRegRecord) -> Result<IssuerRevRegRecord> {
        let record_data = serde_json::to_string(&record)?;

        let query = Query::insert()
            .into_table(RevocationRegistries::Table)
            .columns([
                RevocationRegistries::RecordId,
                RevocationRegistries::RevocRegId,
                RevocationRegistries::CredDefId,
                RevocationRegistries::State,
                RevocationRegistries::HasPending,
                RevocationRegistries::RecordData,
                RevocationRegistries::CreatedAt,
                RevocationRegistries::UpdatedAt,
            ])
            .values_panic([
                record.record_id().to_string().into(),
                record.revoc_reg_id().map(str::to_string).into(),
                record.cred_def_id().map(str::to_string).into(),
                record.state().as_str().into(),
                record.has_pending().into(),
                record_data.into(),
                record.created_at().to_rfc3339().into(),
                record.updated_at().to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &record))?;

        let sequence_id = SequenceId::new(result.last_insert_rowid() as u64);
        record.assign_sequence_id(sequence_id)?;
        debug!(
            record_id = %record.record_id(),
            sequence_id = %sequence_id,
            "Inserted revocation registry record"
        );
        Ok(record)
    }

    async fn update(&self, record: &IssuerRevRegRecord) -> Result<()> {
        let record_data = serde_json::to_string(record)?;

        let query = Query::update()
            .table(RevocationRegistries::Table)
            .values([
                (
                    RevocationRegistries::RevocRegId,
                    record.revoc_reg_id().map(str::to_string).into(),
                ),
                (RevocationRegistries::State, record.state().as_str().into()),
                (RevocationRegistries::HasPending, record.has_pending().into()),
                (RevocationRegistries::RecordData, record_data.into()),
                (
                    RevocationRegistries::UpdatedAt,
                    record.updated_at().to_rfc3339().into(),
                ),
            ])
            .and_where(Expr::col(RevocationRegistries::RecordId).eq(record.record_id().to_string()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, record))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(record.record_id().to_string()));
        }
        Ok(())
    }

    async fn get(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let query = Self::select_records()
            .and_where(Expr::col(RevocationRegistries::RecordId).eq(record_id.to_string()))
            .to_string(SqliteQueryBuilder);

        self.fetch_records(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound(record_id.to_string()))
    }

    async fn find_by_revoc_reg_id(
        &self,
        revoc_reg_id: &str,
    ) -> Result<Option<IssuerRevRegRecord>> {
        let query = Self::select_records()
            .and_where(Expr::col(RevocationRegistries::RevocRegId).eq(revoc_reg_id))
            .to_string(SqliteQueryBuilder);

        Ok(self.fetch_records(query).await?.into_iter().next())
    }

    async fn find_by_cred_def(
        &self,
        cred_def_id: &str,
        state: Option<RecordState>,
    ) -> Result<Vec<IssuerRevRegRecord>> {
        let query = {
            let mut select = Self::select_records();
            select.and_where(Expr::col(RevocationRegistries::CredDefId).eq(cred_def_id));
            if let Some(state) = state {
                select.and_where(Expr::col(RevocationRegistries::State).eq(state.as_str()));
            }
            select.to_string(SqliteQueryBuilder)
        };

        self.fetch_records(query).await
    }

    async fn find_pending(&self) -> Result<Vec<IssuerRevRegRecord>> {
        let query = Self::select_records()
            .and_where(Expr::col(RevocationRegistries::HasPending).eq(true))
            .to_string(SqliteQueryBuilder);

        self.fetch_records(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sqlx::sqlite::SqlitePoolOptions;

    use crate::record::RegistryOptions;

    async fn create_store() -> Arc<SqliteRecordStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteRecordStore::new(pool);
        store.init().await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_queries_run_on_spawned_tasks() {
        let store = create_store().await;
        let mut record = IssuerRevRegRecord::new("did", "cd", RegistryOptions::default());
        record.mark_pending("1").unwrap();
        let record = store.insert(record).await.unwrap();
        let record_id = record.record_id();

        let task_store = store.clone();
        let (loaded, by_cred_def, pending) = tokio::spawn(async move {
            let loaded = task_store.get(record_id).await.unwrap();
            let by_cred_def = task_store
                .find_by_cred_def("cd", Some(RecordState::Init))
                .await
                .unwrap();
            let pending = task_store.find_pending().await.unwrap();
            (loaded, by_cred_def, pending)
        })
        .await
        .unwrap();

        assert_eq!(loaded, record);
        assert_eq!(by_cred_def, vec![record.clone()]);
        assert_eq!(pending, vec![record]);
    }

    #[tokio::test]
    async fn test_find_by_revoc_reg_id_unknown() {
        let store = create_store().await;
        let found = tokio::spawn(async move { store.find_by_revoc_reg_id("unknown").await })
            .await
            .unwrap()
            .unwrap();
        assert!(found.is_none());
    }
}
