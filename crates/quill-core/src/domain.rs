use chrono::{DateTime, Utc};

/// Messenger user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Messenger chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Messenger message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i64);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Note id. Zero is never assigned; in tokens it addresses the draft buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoteId(pub u64);

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Notes per page in lists, search results and inline answers.
pub const PAGE_SIZE: usize = 15;

const UNTITLED: &str = "Untitled";
const SUMMARY_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Build a note from submitted draft text.
    ///
    /// Title rule: the first line becomes the title when the text has more
    /// than one line and that line is at most 32 characters; otherwise the
    /// note is untitled and keeps the full text as content.
    pub fn from_text(id: NoteId, text: &str, now: DateTime<Utc>) -> Self {
        let mut title = UNTITLED.to_string();
        let mut content = text.to_string();

        if let Some((first, rest)) = text.split_once('\n') {
            if first.chars().count() <= 32 {
                title = first.to_string();
                content = rest.to_string();
            }
        }

        Self {
            id,
            title,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Short form of the content for inline answers.
    pub fn summary(&self) -> String {
        if self.content.chars().count() <= SUMMARY_LEN {
            return self.content.clone();
        }
        let cut: String = self.content.chars().take(SUMMARY_LEN).collect();
        format!("{cut}...")
    }
}

/// One unit of draft input, keyed by the message that produced it.
///
/// Fragments are ordered by message id when the draft is read or submitted,
/// so edits arriving out of order still land in the right place.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub message_id: MessageId,
    pub text: String,
}

/// Number of pages needed for `total` entries.
pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE)
}
