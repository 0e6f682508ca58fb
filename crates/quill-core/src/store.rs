//! In-memory reference implementation of the [`Store`] port.
//!
//! One `RwLock` guards notes and draft fragments together, which is what
//! makes `submit_draft` transactional: compose, insert and clear happen under
//! a single write lock, so a concurrent append can never land in both the
//! submitted note and the next draft.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    domain::{Fragment, MessageId, Note, NoteId},
    ports::Store,
    Result,
};

pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    notes: Vec<Note>,
    next_id: u64,
    /// Draft fragments keyed (and ordered) by the message id that produced
    /// them, so out-of-order edits still land in the right place.
    fragments: BTreeMap<MessageId, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn compose_draft(&self) -> String {
        self.fragments
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Notes most recently updated first.
    fn recent(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.iter().collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }
}

fn matches_keywords(note: &Note, keywords: &[String]) -> bool {
    let title = note.title.to_lowercase();
    let content = note.content.to_lowercase();
    keywords
        .iter()
        .all(|kw| title.contains(kw.as_str()) || content.contains(kw.as_str()))
}

fn page<'a>(notes: Vec<&'a Note>, offset: usize, limit: usize) -> (Vec<Note>, usize) {
    let total = notes.len();
    let page = notes
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();
    (page, total)
}

#[async_trait]
impl Store for MemoryStore {
    async fn note(&self, id: NoteId) -> Result<Option<Note>> {
        let state = self.state.read().await;
        Ok(state.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn recent_notes(&self, offset: usize, limit: usize) -> Result<(Vec<Note>, usize)> {
        let state = self.state.read().await;
        Ok(page(state.recent(), offset, limit))
    }

    async fn search_notes(
        &self,
        keywords: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Note>, usize)> {
        let keywords: Vec<String> = keywords
            .split_whitespace()
            .map(|kw| kw.to_lowercase())
            .collect();
        if keywords.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let state = self.state.read().await;
        let hits = state
            .recent()
            .into_iter()
            .filter(|n| matches_keywords(n, &keywords))
            .collect();
        Ok(page(hits, offset, limit))
    }

    async fn delete_note(&self, id: NoteId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.notes.len();
        state.notes.retain(|n| n.id != id);
        Ok(state.notes.len() < before)
    }

    async fn note_count(&self) -> Result<usize> {
        Ok(self.state.read().await.notes.len())
    }

    async fn notes_since(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .notes
            .iter()
            .filter(|n| n.created_at > cutoff)
            .count())
    }

    async fn append_fragment(&self, fragment: Fragment) -> Result<()> {
        let mut state = self.state.write().await;
        state.fragments.insert(fragment.message_id, fragment.text);
        Ok(())
    }

    async fn rewrite_fragment(&self, message_id: MessageId, text: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.fragments.get_mut(&message_id) {
            Some(existing) => {
                *existing = text.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_draft(&self) -> Result<()> {
        self.state.write().await.fragments.clear();
        Ok(())
    }

    async fn draft_text(&self) -> Result<String> {
        Ok(self.state.read().await.compose_draft())
    }

    async fn fragment_count(&self) -> Result<usize> {
        Ok(self.state.read().await.fragments.len())
    }

    async fn submit_draft(&self) -> Result<Option<Note>> {
        let mut state = self.state.write().await;
        let text = state.compose_draft();
        if text.trim().is_empty() {
            return Ok(None);
        }

        let id = NoteId(state.next_id);
        state.next_id += 1;
        let note = Note::from_text(id, &text, Utc::now());
        state.notes.push(note.clone());
        state.fragments.clear();
        Ok(Some(note))
    }
}
