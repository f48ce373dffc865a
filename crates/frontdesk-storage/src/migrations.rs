//! Database schema migrations.
//!
//! Applies the initial schema: threads, messages, unresolved questions,
//! tenant profiles, quick answers and the knowledge full-text index.

use rusqlite::Connection;
use tracing::info;

use frontdesk_core::error::FrontdeskError;

/// Run all pending database migrations.
///
/// Future migrations are added by checking the current version and applying
/// incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), FrontdeskError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| FrontdeskError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            FrontdeskError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), FrontdeskError> {
    conn.execute_batch(
        "
        -- One row per conversation. (tenant_id, party_key) is the dedup key.
        CREATE TABLE IF NOT EXISTS threads (
            tenant_id       TEXT NOT NULL,
            id              TEXT NOT NULL,
            party_key       TEXT NOT NULL,
            channel         TEXT NOT NULL
                            CHECK (channel IN ('sms', 'voice', 'chat')),
            created_at      INTEGER NOT NULL,
            PRIMARY KEY (tenant_id, id),
            UNIQUE (tenant_id, party_key)
        );

        -- Append-only; seq preserves insertion order.
        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       TEXT NOT NULL,
            thread_id       TEXT NOT NULL,
            origin          TEXT NOT NULL,
            timestamp       INTEGER NOT NULL,
            text            TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (tenant_id, thread_id) REFERENCES threads(tenant_id, id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_thread
            ON messages (tenant_id, thread_id, seq ASC);

        CREATE TABLE IF NOT EXISTS unresolved_questions (
            id              TEXT PRIMARY KEY NOT NULL,
            tenant_id       TEXT NOT NULL,
            question        TEXT NOT NULL,
            call_id         TEXT,
            asked_by        TEXT,
            status          TEXT NOT NULL DEFAULT 'open'
                            CHECK (status IN ('open', 'resolved')),
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_questions_tenant_status
            ON unresolved_questions (tenant_id, status, created_at DESC);

        CREATE TABLE IF NOT EXISTS tenant_profiles (
            tenant_id       TEXT PRIMARY KEY NOT NULL,
            fields          TEXT NOT NULL DEFAULT '{}',
            updated_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quick_answers (
            tenant_id       TEXT NOT NULL,
            question_key    TEXT NOT NULL,
            question        TEXT NOT NULL,
            answer          TEXT NOT NULL,
            confidence      REAL NOT NULL
                            CHECK (confidence >= 0.0 AND confidence <= 1.0),
            question_type   TEXT,
            updated_at      INTEGER NOT NULL,
            PRIMARY KEY (tenant_id, question_key)
        );

        CREATE TABLE IF NOT EXISTS knowledge_chunks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       TEXT NOT NULL,
            content         TEXT NOT NULL,
            relevance_type  TEXT NOT NULL DEFAULT 'document',
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_knowledge_tenant
            ON knowledge_chunks (tenant_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_fts USING fts5(
            content,
            content='knowledge_chunks',
            content_rowid='id',
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS knowledge_ai AFTER INSERT ON knowledge_chunks BEGIN
            INSERT INTO knowledge_fts (rowid, content) VALUES (new.id, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS knowledge_ad AFTER DELETE ON knowledge_chunks BEGIN
            INSERT INTO knowledge_fts (knowledge_fts, rowid, content)
                VALUES ('delete', old.id, old.content);
        END;

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| FrontdeskError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
