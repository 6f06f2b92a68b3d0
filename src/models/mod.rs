use chrono::{DateTime, NaiveDateTime, Utc};

/// A stored note row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub file_url: Option<String>,
    pub reminder_at: Option<NaiveDateTime>,
}

/// Fields supplied when a note is inserted. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub file_url: Option<String>,
    pub reminder_at: Option<NaiveDateTime>,
}

/// How an update treats the stored reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderUpdate {
    /// Field omitted from the request.
    #[default]
    Keep,
    /// Field sent empty.
    Clear,
    Set(NaiveDateTime),
}

impl ReminderUpdate {
    pub const fn apply(self, current: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
        match self {
            Self::Keep => current,
            Self::Clear => None,
            Self::Set(at) => Some(at),
        }
    }
}

/// Changes applied by an update. Title and content are always overwritten,
/// `file_url` only when a new attachment was stored.
#[derive(Debug, Clone)]
pub struct NoteChanges {
    pub title: String,
    pub content: String,
    pub file_url: Option<String>,
    pub reminder: ReminderUpdate,
}

impl NoteChanges {
    pub fn apply_to(&self, note: &mut Note) {
        note.title.clone_from(&self.title);
        note.content.clone_from(&self.content);
        if let Some(url) = &self.file_url {
            note.file_url = Some(url.clone());
        }
        note.reminder_at = self.reminder.apply(note.reminder_at);
    }
}
