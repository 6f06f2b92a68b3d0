use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{NoTls, Row};

use super::{NoteRepository, RepositoryError};
use crate::models::{NewNote, Note, NoteChanges, ReminderUpdate};

refinery::embed_migrations!("migrations");

/// Notes table accessed through a connection pool. Each call checks a client
/// out of the pool and returns it when the call ends, whatever the outcome.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool,
}

impl PgNoteRepository {
    pub fn connect(database_dsn: &str, pool_size: usize) -> Result<Self, RepositoryError> {
        let pg_config: tokio_postgres::Config = database_dsn.parse()?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager).max_size(pool_size).build()?;

        Ok(Self::new(pool))
    }

    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        let mut client = self.pool.get().await?;
        let migrations_report = migrations::runner().run_async(&mut **client).await?;

        for migration in migrations_report.applied_migrations() {
            tracing::info!(
                "Migration Applied -  Name: {}, Version: {}",
                migration.name(),
                migration.version()
            );
        }

        tracing::info!("DB migrations finished!");

        Ok(())
    }
}

fn note_from_row(row: &Row) -> Note {
    Note {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        file_url: row.get("file_url"),
        reminder_at: row.get("reminder_at"),
    }
}

/// Makes `q` match literally inside an `ILIKE '%..%'` pattern.
fn like_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn list_notes(&self, search: Option<&str>) -> Result<Vec<Note>, RepositoryError> {
        let client = self.pool.get().await?;

        let rows = match search {
            Some(q) => {
                client
                    .query(
                        "SELECT id, title, content, created_at, file_url, reminder_at FROM notes \
                         WHERE title ILIKE $1 OR content ILIKE $1 ORDER BY id",
                        &[&like_pattern(q)],
                    )
                    .await?
            }
            None => {
                client
                    .query(
                        "SELECT id, title, content, created_at, file_url, reminder_at FROM notes \
                         ORDER BY id",
                        &[],
                    )
                    .await?
            }
        };

        Ok(rows.iter().map(note_from_row).collect())
    }

    async fn get_note(&self, id: i64) -> Result<Option<Note>, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, title, content, created_at, file_url, reminder_at FROM notes \
                 WHERE id = $1",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(note_from_row))
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO notes (title, content, file_url, reminder_at) VALUES ($1, $2, $3, $4) \
                 RETURNING id, title, content, created_at, file_url, reminder_at",
                &[&note.title, &note.content, &note.file_url, &note.reminder_at],
            )
            .await?;

        Ok(note_from_row(&row))
    }

    async fn update_note(
        &self,
        id: i64,
        changes: NoteChanges,
    ) -> Result<Option<Note>, RepositoryError> {
        let (touch_reminder, reminder_at) = match changes.reminder {
            ReminderUpdate::Keep => (false, None),
            ReminderUpdate::Clear => (true, None),
            ReminderUpdate::Set(at) => (true, Some(at)),
        };

        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "UPDATE notes SET title = $2, content = $3, \
                 file_url = COALESCE($4::varchar, file_url), \
                 reminder_at = CASE WHEN $5::boolean THEN $6::timestamp ELSE reminder_at END \
                 WHERE id = $1 RETURNING id, title, content, created_at, file_url, reminder_at",
                &[
                    &id,
                    &changes.title,
                    &changes.content,
                    &changes.file_url,
                    &touch_reminder,
                    &reminder_at,
                ],
            )
            .await?;

        Ok(row.as_ref().map(note_from_row))
    }

    async fn delete_note(&self, id: i64) -> Result<Option<Note>, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "DELETE FROM notes WHERE id = $1 \
                 RETURNING id, title, content, created_at, file_url, reminder_at",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(note_from_row))
    }
}
