//! Database schema definitions using sea-query.

use sea_query::Iden;

/// Revocation registry records table schema.
#[derive(Iden)]
pub enum RevocationRegistries {
    Table,
    #[iden = "sequence_id"]
    SequenceId,
    #[iden = "record_id"]
    RecordId,
    #[iden = "revoc_reg_id"]
    RevocRegId,
    #[iden = "cred_def_id"]
    CredDefId,
    #[iden = "state"]
    State,
    #[iden = "has_pending"]
    HasPending,
    #[iden = "record_data"]
    RecordData,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// SQL for creating the revocation registries table.
///
/// `sequence_id` is the rowid, so SQLite hands out the creation order and
/// never reuses a value.
pub const CREATE_REVOCATION_REGISTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS revocation_registries (
    sequence_id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL UNIQUE,
    revoc_reg_id TEXT UNIQUE,
    cred_def_id TEXT,
    state TEXT NOT NULL,
    has_pending INTEGER NOT NULL DEFAULT 0,
    record_data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// Secondary indexes for the lookups the query service performs.
pub const CREATE_REVOCATION_REGISTRIES_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_revocation_registries_cred_def \
     ON revocation_registries(cred_def_id, state)",
    "CREATE INDEX IF NOT EXISTS idx_revocation_registries_pending \
     ON revocation_registries(has_pending)",
];
