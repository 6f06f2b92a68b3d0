use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use std::collections::BTreeMap;

use super::{NoteRepository, RepositoryError};
use crate::models::{NewNote, Note, NoteChanges};

#[derive(Debug, Default)]
struct State {
    last_id: i64,
    notes: BTreeMap<i64, Note>,
}

/// In-process note store for local development and tests. Ids are never reused.
#[derive(Debug, Default)]
pub struct MemoryNoteRepository {
    state: Mutex<State>,
}

impl MemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle) || note.content.to_lowercase().contains(needle)
}

#[async_trait]
impl NoteRepository for MemoryNoteRepository {
    async fn list_notes(&self, search: Option<&str>) -> Result<Vec<Note>, RepositoryError> {
        let state = self.state.lock().await;
        let notes = match search {
            Some(q) => {
                let needle = q.to_lowercase();
                state
                    .notes
                    .values()
                    .filter(|note| matches(note, &needle))
                    .cloned()
                    .collect()
            }
            None => state.notes.values().cloned().collect(),
        };

        Ok(notes)
    }

    async fn get_note(&self, id: i64) -> Result<Option<Note>, RepositoryError> {
        Ok(self.state.lock().await.notes.get(&id).cloned())
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, RepositoryError> {
        let mut state = self.state.lock().await;
        state.last_id += 1;

        let note = Note {
            id: state.last_id,
            title: note.title,
            content: note.content,
            created_at: Utc::now(),
            file_url: note.file_url,
            reminder_at: note.reminder_at,
        };
        state.notes.insert(note.id, note.clone());

        Ok(note)
    }

    async fn update_note(
        &self,
        id: i64,
        changes: NoteChanges,
    ) -> Result<Option<Note>, RepositoryError> {
        let mut state = self.state.lock().await;

        Ok(state.notes.get_mut(&id).map(|note| {
            changes.apply_to(note);
            note.clone()
        }))
    }

    async fn delete_note(&self, id: i64) -> Result<Option<Note>, RepositoryError> {
        Ok(self.state.lock().await.notes.remove(&id))
    }
}
