use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{Fragment, MessageId, Note, NoteId},
    reply::Reply,
    update::{Attachment, Update},
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the first implementation; the shape is designed so another
/// bot platform can sit behind the same interface.
#[async_trait]
pub trait BotTransport: Send + Sync {
    /// Long-poll for updates with ids at or above `offset`.
    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>>;

    /// Perform one outbound action.
    async fn deliver(&self, reply: Reply) -> Result<()>;

    /// Pull an attachment into local storage; returns the stored filename.
    async fn save_attachment(&self, attachment: &Attachment) -> Result<String>;

    /// Currently registered webhook URL, empty when none is set.
    async fn webhook_url(&self) -> Result<String>;

    async fn set_webhook(&self, url: &str) -> Result<()>;
}

/// Note and draft storage.
///
/// `submit_draft` is the one compound operation: composing the note and
/// clearing the draft must happen atomically so a concurrent append can
/// never land in both the note and the next draft.
#[async_trait]
pub trait Store: Send + Sync {
    async fn note(&self, id: NoteId) -> Result<Option<Note>>;

    /// Page of notes, most recently updated first, plus the total count.
    async fn recent_notes(&self, offset: usize, limit: usize) -> Result<(Vec<Note>, usize)>;

    /// Page of notes matching every whitespace-separated keyword, plus the
    /// total number of matches.
    async fn search_notes(
        &self,
        keywords: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Note>, usize)>;

    /// Returns false when no such note existed.
    async fn delete_note(&self, id: NoteId) -> Result<bool>;

    async fn note_count(&self) -> Result<usize>;

    /// Notes created strictly after `cutoff`.
    async fn notes_since(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn append_fragment(&self, fragment: Fragment) -> Result<()>;

    /// Replace the text of the fragment keyed by `message_id`; false when
    /// the draft holds no such fragment.
    async fn rewrite_fragment(&self, message_id: MessageId, text: &str) -> Result<bool>;

    async fn clear_draft(&self) -> Result<()>;

    /// Fragments in message-id order, joined with newlines.
    async fn draft_text(&self) -> Result<String>;

    async fn fragment_count(&self) -> Result<usize>;

    /// Compose a note from the draft and clear it, atomically.
    /// `None` when the draft is empty.
    async fn submit_draft(&self) -> Result<Option<Note>>;
}

/// Markdown to display HTML, for the web preview.
pub trait Renderer: Send + Sync {
    /// Must not fail; implementations return an empty string on internal
    /// errors rather than surfacing them to the access layer.
    fn markdown_to_safe_html(&self, markdown: &str) -> String;
}

/// Free text to a keyword string for the store's search.
pub trait Segmenter: Send + Sync {
    fn tokenize(&self, text: &str) -> String;
}
