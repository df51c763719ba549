//! Table layout
//!
//! Table names come from configuration and are validated as plain
//! identifiers before they get here.

use crate::config::schema::FeedConfig;

/// SQLSTATE for an undefined table
pub const UNDEFINED_TABLE: &str = "42P01";

/// SQLSTATE for a database that does not exist
pub const INVALID_CATALOG_NAME: &str = "3D000";

/// Names of the tables Tidemark reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub events: String,
    pub resume_tokens: String,
    pub leases: String,
}

impl TableNames {
    pub fn from_config(feed: &FeedConfig) -> Self {
        Self {
            events: feed.events_table.clone(),
            resume_tokens: feed.resume_token_table.clone(),
            ..Self::default()
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            events: "change_events".to_string(),
            resume_tokens: "resume_tokens".to_string(),
            leases: "leader_leases".to_string(),
        }
    }
}

/// Idempotent DDL for every table
pub fn initial_schema(tables: &TableNames) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {events} (
    id              BIGSERIAL PRIMARY KEY,
    txid            BIGINT      NOT NULL DEFAULT (pg_current_xact_id()::text::bigint),
    collection_name TEXT        NOT NULL,
    operation       TEXT        NOT NULL,
    document_key    JSONB,
    payload         JSONB       NOT NULL DEFAULT '{{}}'::jsonb,
    cluster_time    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS {events}_collection_txid_id_idx
    ON {events} (collection_name, txid, id);

CREATE TABLE IF NOT EXISTS {resume_tokens} (
    collection_name TEXT PRIMARY KEY,
    token           JSONB       NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS {leases} (
    group_name TEXT PRIMARY KEY,
    holder_id  TEXT        NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
);
"#,
        events = tables.events,
        resume_tokens = tables.resume_tokens,
        leases = tables.leases,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_uses_configured_names() {
        let tables = TableNames {
            events: "outbox".to_string(),
            resume_tokens: "cursors".to_string(),
            leases: "leases".to_string(),
        };
        let sql = initial_schema(&tables);

        assert!(sql.contains("CREATE TABLE IF NOT EXISTS outbox ("));
        assert!(sql.contains("outbox_collection_txid_id_idx"));
        assert!(sql.contains("DEFAULT (pg_current_xact_id()::text::bigint)"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS cursors ("));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS leases ("));
        assert!(sql.contains("'{}'::jsonb"));
        assert!(!sql.contains("change_events"));
    }
}
