mod memory;
mod postgres;

pub use memory::MemoryNoteRepository;
pub use postgres::PgNoteRepository;

use async_trait::async_trait;

use crate::models::{NewNote, Note, NoteChanges};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("failed to acquire database connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("failed to build connection pool: {0}")]
    PoolBuild(#[from] deadpool_postgres::BuildError),

    #[error("migration failed: {0}")]
    Migration(#[from] refinery::Error),
}

/// Persistence for notes.
///
/// Every call is self-contained: implementations acquire whatever session they
/// need for the duration of the call and release it before returning.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// All notes in insertion order. With `search`, only notes whose title or
    /// content contains it, ignoring case.
    async fn list_notes(&self, search: Option<&str>) -> Result<Vec<Note>, RepositoryError>;

    async fn get_note(&self, id: i64) -> Result<Option<Note>, RepositoryError>;

    async fn create_note(&self, note: NewNote) -> Result<Note, RepositoryError>;

    /// Returns `None` when no note has this id.
    async fn update_note(
        &self,
        id: i64,
        changes: NoteChanges,
    ) -> Result<Option<Note>, RepositoryError>;

    /// Removes the note and hands back the deleted row, `None` when it did not exist.
    async fn delete_note(&self, id: i64) -> Result<Option<Note>, RepositoryError>;
}
