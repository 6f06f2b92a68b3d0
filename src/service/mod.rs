use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use std::sync::Arc;

use crate::{
    blob::{Attachment, BlobError, BlobStore},
    dto::NoteResponse,
    models::{NewNote, NoteChanges, ReminderUpdate},
    repository::{NoteRepository, RepositoryError},
};

#[derive(Debug, thiserror::Error)]
pub enum NoteServiceError {
    #[error("note {0} not found")]
    NotFound(i64),

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(#[from] RepositoryError),

    #[error("attachment failure: {0}")]
    Blob(#[from] BlobError),
}

/// Raw create/update input as it came off the wire. `None` means the field
/// was not sent at all.
#[derive(Debug, Clone, Default)]
pub struct NoteSubmission {
    pub title: Option<String>,
    pub content: Option<String>,
    pub file: Option<Attachment>,
    pub reminder_at: Option<String>,
}

struct ValidSubmission {
    title: String,
    content: String,
    file: Option<Attachment>,
    reminder: ReminderUpdate,
}

impl NoteSubmission {
    fn validate(self) -> Result<ValidSubmission, NoteServiceError> {
        let title = self.title.ok_or_else(|| missing("title"))?;
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(NoteServiceError::Validation(format!(
                "field 'title' must be at most {MAX_TITLE_CHARS} characters"
            )));
        }
        let content = self.content.ok_or_else(|| missing("content"))?;
        let reminder = match self.reminder_at.as_deref() {
            None => ReminderUpdate::Keep,
            Some("") => ReminderUpdate::Clear,
            Some(raw) => ReminderUpdate::Set(parse_reminder(raw)?),
        };

        Ok(ValidSubmission {
            title,
            content,
            file: self.file,
            reminder,
        })
    }
}

/// Width of the `title` column.
const MAX_TITLE_CHARS: usize = 255;

fn missing(field: &str) -> NoteServiceError {
    NoteServiceError::Validation(format!("field '{field}' is required"))
}

const REMINDER_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO-8601 reminder such as `2025-08-11T14:30` (what a browser
/// `datetime-local` input sends). Values carrying an offset are converted to
/// UTC wall time rather than keeping their local clock reading.
pub fn parse_reminder(raw: &str) -> Result<NaiveDateTime, NoteServiceError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.naive_utc());
    }

    for format in REMINDER_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(at);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| NoteServiceError::Validation(format!("invalid reminder_at value: '{raw}'")))
}

pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
    blobs: BlobStore,
}

impl NoteService {
    pub const fn new(repo: Arc<dyn NoteRepository>, blobs: BlobStore) -> Self {
        Self { repo, blobs }
    }

    pub async fn list_notes(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<NoteResponse>, NoteServiceError> {
        let search = search.filter(|q| !q.is_empty());
        let notes = self.repo.list_notes(search).await?;

        Ok(notes.into_iter().map(NoteResponse::from).collect())
    }

    pub async fn get_note(&self, id: i64) -> Result<NoteResponse, NoteServiceError> {
        self.repo
            .get_note(id)
            .await?
            .map(NoteResponse::from)
            .ok_or(NoteServiceError::NotFound(id))
    }

    /// Inserts the row first so the attachment can be keyed by the new id.
    /// If storing the attachment fails, the row is removed again.
    pub async fn create_note(
        &self,
        submission: NoteSubmission,
    ) -> Result<NoteResponse, NoteServiceError> {
        let input = submission.validate()?;

        let note = self
            .repo
            .create_note(NewNote {
                title: input.title,
                content: input.content,
                file_url: None,
                reminder_at: input.reminder.apply(None),
            })
            .await?;

        let Some(file) = input.file else {
            return Ok(note.into());
        };

        let url = match self.blobs.put(note.id, &file).await {
            Ok(url) => url,
            Err(e) => {
                self.discard_note(note.id).await;
                return Err(e.into());
            }
        };

        let changes = NoteChanges {
            title: note.title,
            content: note.content,
            file_url: Some(url.clone()),
            reminder: ReminderUpdate::Keep,
        };

        match self.repo.update_note(note.id, changes).await {
            Ok(Some(note)) => Ok(note.into()),
            Ok(None) => {
                self.blobs.discard(&url).await;
                Err(NoteServiceError::NotFound(note.id))
            }
            Err(e) => {
                self.blobs.discard(&url).await;
                self.discard_note(note.id).await;
                Err(e.into())
            }
        }
    }

    pub async fn update_note(
        &self,
        id: i64,
        submission: NoteSubmission,
    ) -> Result<NoteResponse, NoteServiceError> {
        let input = submission.validate()?;

        let Some(current) = self.repo.get_note(id).await? else {
            return Err(NoteServiceError::NotFound(id));
        };

        let new_url = match &input.file {
            Some(file) => Some(self.blobs.put(id, file).await?),
            None => None,
        };

        let changes = NoteChanges {
            title: input.title,
            content: input.content,
            file_url: new_url.clone(),
            reminder: input.reminder,
        };

        match self.repo.update_note(id, changes).await {
            Ok(Some(note)) => {
                if let (Some(old), Some(new)) = (&current.file_url, &new_url)
                    && old != new
                {
                    self.blobs.discard(old).await;
                }
                Ok(note.into())
            }
            Ok(None) => {
                if let Some(new) = &new_url {
                    self.blobs.discard(new).await;
                }
                Err(NoteServiceError::NotFound(id))
            }
            Err(e) => {
                if let Some(new) = &new_url
                    && current.file_url.as_ref() != Some(new)
                {
                    self.blobs.discard(new).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn delete_note(&self, id: i64) -> Result<(), NoteServiceError> {
        let note = self
            .repo
            .delete_note(id)
            .await?
            .ok_or(NoteServiceError::NotFound(id))?;

        if let Some(url) = &note.file_url {
            self.blobs.discard(url).await;
        }

        Ok(())
    }

    async fn discard_note(&self, id: i64) {
        if let Err(e) = self.repo.delete_note(id).await {
            tracing::warn!("failed to roll back note {id}: {e}");
        }
    }
}
