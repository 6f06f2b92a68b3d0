use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::Note;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    /// Note ID
    pub id: i64,
    /// Note title
    pub title: String,
    /// Note content
    pub content: String,
    /// Creation time (UTC)
    pub created_at: DateTime<Utc>,
    /// Public path of the attachment, if any
    pub file_url: Option<String>,
    /// Reminder time, local wall clock
    #[schema(value_type = Option<String>, example = "2025-08-11T14:30:00")]
    pub reminder_at: Option<NaiveDateTime>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            created_at: note.created_at,
            file_url: note.file_url,
            reminder_at: note.reminder_at,
        }
    }
}

/// Multipart body accepted by create and update.
#[allow(dead_code)]
#[derive(Debug, ToSchema)]
pub struct NoteForm {
    /// Note title
    pub title: String,
    /// Note content
    pub content: String,
    /// Optional attachment
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
    /// Optional reminder, e.g. `2025-08-11T14:30`. On update an empty value clears it.
    pub reminder_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive phrase matched against title and content
    pub q: Option<String>,
}
