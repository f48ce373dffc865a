//! Tenant-scoped knowledge search using SQLite FTS5.
//!
//! Indexes knowledge chunks per tenant and ranks matches with BM25. Scores are
//! squashed into 0.0..1.0 so they are comparable with quick-answer confidence.

use std::sync::Arc;

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::types::{SemanticHit, TenantId, Timestamp};

use crate::db::Database;

// Function words that would otherwise let any chunk match any question.
static STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "am", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "shall", "should",
    "may", "might", "must", "can", "could", "i", "me", "my", "we", "our", "us",
    "you", "your", "he", "she", "it", "they", "them", "his", "her", "its",
    "their", "what", "which", "who", "whom", "this", "that", "these", "those",
    "of", "in", "to", "for", "with", "on", "at", "from", "by", "about", "as",
    "into", "and", "but", "or", "not", "no", "so", "if", "then", "than", "too",
    "very", "just", "also", "any", "some", "how", "when", "where", "why", "there",
    "here", "please", "hi", "hello", "hey", "thanks", "get", "got", "need", "want",
];

/// Turn free text into an FTS5 query that cannot fail to parse.
///
/// Each content term is quoted and the terms are OR-ed, so user input like
/// `what's "open" on sunday?` never hits FTS5 syntax errors. Stop words and
/// single letters are dropped. Returns `None` when nothing searchable is left.
pub fn sanitize_fts5_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| is_content_term(t))
        .map(|t| format!("\"{}\"", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn is_content_term(term: &str) -> bool {
    let single_letter = term.chars().count() == 1 && !term.chars().all(|c| c.is_numeric());
    !term.is_empty() && !single_letter && !STOP_WORDS.contains(&term)
}

/// Full-text knowledge index backed by FTS5. Clones share the database.
#[derive(Clone)]
pub struct KnowledgeIndex {
    db: Arc<Database>,
}

impl KnowledgeIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Index one chunk of tenant knowledge. Returns the chunk id.
    pub fn add_chunk(
        &self,
        tenant: &TenantId,
        content: &str,
        relevance_type: &str,
    ) -> Result<i64, FrontdeskError> {
        if content.trim().is_empty() {
            return Err(FrontdeskError::Validation(
                "knowledge content must not be empty".to_string(),
            ));
        }

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO knowledge_chunks (tenant_id, content, relevance_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![tenant.as_str(), content, relevance_type, Timestamp::now().0],
            )
            .map_err(|e| FrontdeskError::Storage(format!("Failed to index chunk: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Remove one chunk from the index.
    pub fn remove_chunk(&self, tenant: &TenantId, id: i64) -> Result<bool, FrontdeskError> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM knowledge_chunks WHERE tenant_id = ?1 AND id = ?2",
                    rusqlite::params![tenant.as_str(), id],
                )
                .map_err(|e| FrontdeskError::Storage(format!("Failed to remove chunk: {}", e)))?;
            Ok(removed > 0)
        })
    }

    /// Return up to `k` of the tenant's chunks matching `query`, best first.
    pub fn search(
        &self,
        tenant: &TenantId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SemanticHit>, FrontdeskError> {
        let Some(fts_query) = sanitize_fts5_query(query) else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT c.content, c.relevance_type, bm25(knowledge_fts)
                     FROM knowledge_fts
                     JOIN knowledge_chunks c ON c.id = knowledge_fts.rowid
                     WHERE knowledge_fts MATCH ?1 AND c.tenant_id = ?2
                     ORDER BY bm25(knowledge_fts)
                     LIMIT ?3",
                )
                .map_err(|e| FrontdeskError::Search(format!("FTS5 query prepare failed: {}", e)))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![fts_query, tenant.as_str(), k as i64],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, f64>(2)?,
                        ))
                    },
                )
                .map_err(|e| FrontdeskError::Search(format!("FTS5 query failed: {}", e)))?;

            let mut hits = Vec::new();
            for row in rows {
                let (content, relevance_type, bm25) =
                    row.map_err(|e| FrontdeskError::Search(e.to_string()))?;
                // bm25() is negative; larger magnitude means more relevant.
                let relevance = (-bm25).max(0.0);
                hits.push(SemanticHit {
                    content,
                    score: relevance / (1.0 + relevance),
                    relevance_type,
                });
            }
            Ok(hits)
        })
    }

    /// Count a tenant's indexed chunks.
    pub fn count(&self, tenant: &TenantId) -> Result<u64, FrontdeskError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM knowledge_chunks WHERE tenant_id = ?1",
                    rusqlite::params![tenant.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| FrontdeskError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}
