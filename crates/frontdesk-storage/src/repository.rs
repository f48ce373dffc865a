//! Repository implementations for SQLite-backed persistence.
//!
//! Each repository owns one table family and operates on the shared
//! [`Database`] using raw SQL.

use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::types::{
    Channel, Message, Origin, PartyKey, QuestionStatus, QuickAnswer, TenantId, TenantProfile,
    Thread, ThreadId, Timestamp, UnresolvedQuestion,
};

use crate::db::Database;

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> FrontdeskError + '_ {
    move |e| FrontdeskError::Storage(format!("{}: {}", context, e))
}

// =============================================================================
// Threads
// =============================================================================

/// Repository for conversation threads and their messages.
pub struct ThreadRepository {
    db: Arc<Database>,
}

impl ThreadRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert `thread` unless one already exists for its `(tenant, party)` key.
    ///
    /// Returns the stored thread and whether this call created it. Insert and
    /// re-select run under the database lock, so concurrent callers for the
    /// same key all observe the first caller's row.
    pub fn insert_if_absent(&self, thread: &Thread) -> Result<(Thread, bool), FrontdeskError> {
        self.db.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO threads (tenant_id, id, party_key, channel, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT DO NOTHING",
                    rusqlite::params![
                        thread.tenant_id.as_str(),
                        thread.id.as_str(),
                        thread.with.as_str(),
                        thread.channel.as_str(),
                        thread.created_at.0,
                    ],
                )
                .map_err(storage_err("Failed to insert thread"))?;

            match load_thread_by_party(conn, &thread.tenant_id, &thread.with)? {
                Some(stored) => Ok((stored, inserted == 1)),
                None => Err(FrontdeskError::Storage(format!(
                    "thread id {} already used by another party of tenant {}",
                    thread.id, thread.tenant_id
                ))),
            }
        })
    }

    /// Append one message to an existing thread.
    pub fn append_message(
        &self,
        tenant: &TenantId,
        thread_id: &ThreadId,
        message: &Message,
    ) -> Result<(), FrontdeskError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (tenant_id, thread_id, origin, timestamp, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    tenant.as_str(),
                    thread_id.as_str(),
                    message.origin.as_str(),
                    message.timestamp.0,
                    message.text,
                ],
            )
            .map_err(storage_err("Failed to append message"))?;
            Ok(())
        })
    }

    /// Find a thread (with messages) by id.
    pub fn find(
        &self,
        tenant: &TenantId,
        thread_id: &ThreadId,
    ) -> Result<Option<Thread>, FrontdeskError> {
        self.db.with_conn(|conn| {
            let header = conn
                .query_row(
                    "SELECT tenant_id, id, party_key, channel, created_at
                     FROM threads WHERE tenant_id = ?1 AND id = ?2",
                    rusqlite::params![tenant.as_str(), thread_id.as_str()],
                    row_to_thread_header,
                )
                .optional()
                .map_err(storage_err("Failed to query thread"))?;

            match header {
                Some(header) => Ok(Some(with_messages(conn, header?)?)),
                None => Ok(None),
            }
        })
    }

    /// Find the thread a party key is attached to.
    pub fn find_by_party(
        &self,
        tenant: &TenantId,
        party: &PartyKey,
    ) -> Result<Option<Thread>, FrontdeskError> {
        self.db
            .with_conn(|conn| load_thread_by_party(conn, tenant, party))
    }

    /// Load every thread with its messages, ordered by creation time.
    pub fn load_all(&self) -> Result<Vec<Thread>, FrontdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT tenant_id, id, party_key, channel, created_at
                     FROM threads ORDER BY created_at ASC",
                )
                .map_err(storage_err("Failed to prepare thread scan"))?;

            let headers = stmt
                .query_map([], row_to_thread_header)
                .map_err(storage_err("Failed to scan threads"))?;

            let mut threads = Vec::new();
            for header in headers {
                let header = header.map_err(storage_err("Failed to read thread"))??;
                threads.push(with_messages(conn, header)?);
            }
            Ok(threads)
        })
    }

    /// Count threads for a tenant.
    pub fn count(&self, tenant: &TenantId) -> Result<u64, FrontdeskError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM threads WHERE tenant_id = ?1",
                    rusqlite::params![tenant.as_str()],
                    |row| row.get(0),
                )
                .map_err(storage_err("Failed to count threads"))?;
            Ok(count as u64)
        })
    }
}

fn load_thread_by_party(
    conn: &Connection,
    tenant: &TenantId,
    party: &PartyKey,
) -> Result<Option<Thread>, FrontdeskError> {
    let header = conn
        .query_row(
            "SELECT tenant_id, id, party_key, channel, created_at
             FROM threads WHERE tenant_id = ?1 AND party_key = ?2",
            rusqlite::params![tenant.as_str(), party.as_str()],
            row_to_thread_header,
        )
        .optional()
        .map_err(storage_err("Failed to query thread by party"))?;

    match header {
        Some(header) => Ok(Some(with_messages(conn, header?)?)),
        None => Ok(None),
    }
}

fn row_to_thread_header(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<Thread, FrontdeskError>> {
    let tenant: String = row.get(0)?;
    let id: String = row.get(1)?;
    let party: String = row.get(2)?;
    let channel: String = row.get(3)?;
    let created_at: i64 = row.get(4)?;

    Ok(build_thread_header(id, &tenant, &party, &channel, created_at))
}

fn build_thread_header(
    id: String,
    tenant: &str,
    party: &str,
    channel: &str,
    created_at: i64,
) -> Result<Thread, FrontdeskError> {
    Ok(Thread::new(
        ThreadId::from(id),
        TenantId::parse(tenant)?,
        PartyKey::parse(party)?,
        channel.parse::<Channel>()?,
        Timestamp(created_at),
    ))
}

fn with_messages(conn: &Connection, mut thread: Thread) -> Result<Thread, FrontdeskError> {
    let mut stmt = conn
        .prepare(
            "SELECT origin, timestamp, text FROM messages
             WHERE tenant_id = ?1 AND thread_id = ?2
             ORDER BY seq ASC",
        )
        .map_err(storage_err("Failed to prepare message query"))?;

    let rows = stmt
        .query_map(
            rusqlite::params![thread.tenant_id.as_str(), thread.id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .map_err(storage_err("Failed to query messages"))?;

    for row in rows {
        let (origin, timestamp, text) = row.map_err(storage_err("Failed to read message"))?;
        thread.messages.push(Message {
            origin: Origin::try_from(origin)?,
            timestamp: Timestamp(timestamp),
            text,
        });
    }
    Ok(thread)
}

// =============================================================================
// Unresolved questions
// =============================================================================

/// Repository for escalated questions awaiting review.
pub struct QuestionRepository {
    db: Arc<Database>,
}

impl QuestionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new question record.
    pub fn insert(&self, question: &UnresolvedQuestion) -> Result<(), FrontdeskError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO unresolved_questions
                     (id, tenant_id, question, call_id, asked_by, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    question.id.to_string(),
                    question.tenant_id.as_str(),
                    question.question,
                    question.call_id,
                    question.asked_by,
                    question.status.as_str(),
                    question.created_at.0,
                ],
            )
            .map_err(storage_err("Failed to save unresolved question"))?;
            Ok(())
        })
    }

    /// List a tenant's questions, newest first, optionally filtered by status.
    pub fn list(
        &self,
        tenant: &TenantId,
        status: Option<QuestionStatus>,
        limit: u64,
    ) -> Result<Vec<UnresolvedQuestion>, FrontdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, tenant_id, question, call_id, asked_by, status, created_at
                     FROM unresolved_questions
                     WHERE tenant_id = ?1 AND (?2 IS NULL OR status = ?2)
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?3",
                )
                .map_err(storage_err("Failed to prepare question query"))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![tenant.as_str(), status.map(|s| s.as_str()), limit],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, i64>(6)?,
                        ))
                    },
                )
                .map_err(storage_err("Failed to query questions"))?;

            let mut questions = Vec::new();
            for row in rows {
                let (id, tenant_id, question, call_id, asked_by, status, created_at) =
                    row.map_err(storage_err("Failed to read question"))?;
                questions.push(UnresolvedQuestion {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| FrontdeskError::Storage(format!("Invalid UUID: {}", e)))?,
                    tenant_id: TenantId::parse(&tenant_id)?,
                    question,
                    call_id,
                    asked_by,
                    status: status.parse()?,
                    created_at: Timestamp(created_at),
                });
            }
            Ok(questions)
        })
    }

    /// Count a tenant's questions.
    pub fn count(&self, tenant: &TenantId) -> Result<u64, FrontdeskError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM unresolved_questions WHERE tenant_id = ?1",
                    rusqlite::params![tenant.as_str()],
                    |row| row.get(0),
                )
                .map_err(storage_err("Failed to count questions"))?;
            Ok(count as u64)
        })
    }
}

// =============================================================================
// Tenant profiles
// =============================================================================

/// Repository for the one-per-tenant knowledge profile document.
pub struct ProfileRepository {
    db: Arc<Database>,
}

impl ProfileRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch a tenant's profile, if one was ever written.
    pub fn get(&self, tenant: &TenantId) -> Result<Option<TenantProfile>, FrontdeskError> {
        self.db.with_conn(|conn| load_profile(conn, tenant))
    }

    /// Shallow-merge `update` into the stored profile; last write wins per key.
    ///
    /// Read, merge and write happen under one lock so concurrent merges for
    /// the same tenant never drop each other's keys.
    pub fn merge(
        &self,
        tenant: &TenantId,
        update: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<TenantProfile, FrontdeskError> {
        self.db.with_conn(|conn| {
            let mut profile =
                load_profile(conn, tenant)?.unwrap_or_else(|| TenantProfile::empty(tenant.clone()));
            for (key, value) in update {
                profile.fields.insert(key.clone(), value.clone());
            }
            profile.updated_at = Timestamp::now();

            let fields = serde_json::to_string(&profile.fields)?;
            conn.execute(
                "INSERT INTO tenant_profiles (tenant_id, fields, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (tenant_id) DO UPDATE
                 SET fields = excluded.fields, updated_at = excluded.updated_at",
                rusqlite::params![tenant.as_str(), fields, profile.updated_at.0],
            )
            .map_err(storage_err("Failed to save profile"))?;
            Ok(profile)
        })
    }
}

fn load_profile(
    conn: &Connection,
    tenant: &TenantId,
) -> Result<Option<TenantProfile>, FrontdeskError> {
    let row = conn
        .query_row(
            "SELECT fields, updated_at FROM tenant_profiles WHERE tenant_id = ?1",
            rusqlite::params![tenant.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()
        .map_err(storage_err("Failed to query profile"))?;

    match row {
        Some((fields, updated_at)) => Ok(Some(TenantProfile {
            tenant_id: tenant.clone(),
            fields: serde_json::from_str(&fields)?,
            updated_at: Timestamp(updated_at),
        })),
        None => Ok(None),
    }
}

// =============================================================================
// Quick answers
// =============================================================================

/// Canonical lookup key for a question: lowercase, single spaces, no
/// trailing punctuation.
pub fn normalize_question(question: &str) -> String {
    let collapsed = question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['?', '.', '!'])
        .trim_end()
        .to_string()
}

/// Repository for tenant-curated cached answers.
#[derive(Clone)]
pub struct QuickAnswerRepository {
    db: Arc<Database>,
}

impl QuickAnswerRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace the curated answer for a question.
    pub fn upsert(
        &self,
        tenant: &TenantId,
        question: &str,
        answer: &QuickAnswer,
    ) -> Result<(), FrontdeskError> {
        let key = normalize_question(question);
        if key.is_empty() {
            return Err(FrontdeskError::Validation(
                "quick answer question must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&answer.confidence) {
            return Err(FrontdeskError::Validation(format!(
                "confidence must be within [0, 1], got {}",
                answer.confidence
            )));
        }

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO quick_answers
                     (tenant_id, question_key, question, answer, confidence, question_type, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (tenant_id, question_key) DO UPDATE
                 SET question = excluded.question,
                     answer = excluded.answer,
                     confidence = excluded.confidence,
                     question_type = excluded.question_type,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    tenant.as_str(),
                    key,
                    question.trim(),
                    answer.answer,
                    answer.confidence,
                    answer.question_type,
                    Timestamp::now().0,
                ],
            )
            .map_err(storage_err("Failed to save quick answer"))?;
            Ok(())
        })
    }

    /// Look up the curated answer for a query.
    pub fn lookup(
        &self,
        tenant: &TenantId,
        query: &str,
    ) -> Result<Option<QuickAnswer>, FrontdeskError> {
        let key = normalize_question(query);
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT answer, confidence, question_type FROM quick_answers
                 WHERE tenant_id = ?1 AND question_key = ?2",
                rusqlite::params![tenant.as_str(), key],
                |row| {
                    Ok(QuickAnswer {
                        answer: row.get(0)?,
                        confidence: row.get(1)?,
                        question_type: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(storage_err("Failed to query quick answer"))
        })
    }
}
