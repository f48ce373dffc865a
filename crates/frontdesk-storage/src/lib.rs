//! Frontdesk Storage crate - SQLite persistence for the routing engine.
//!
//! Provides a WAL-mode SQLite database with migrations, repositories for
//! threads, unresolved questions, tenant profiles and quick answers, and a
//! tenant-scoped FTS5 knowledge index used as the semantic search backend.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod search;

pub use db::Database;
pub use repository::{
    normalize_question, ProfileRepository, QuestionRepository, QuickAnswerRepository,
    ThreadRepository,
};
pub use search::{sanitize_fts5_query, KnowledgeIndex};
