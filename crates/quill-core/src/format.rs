//! MarkdownV2 escaping and the bot's reply texts.
//!
//! Everything user-derived that lands in a MarkdownV2 message goes through
//! [`escape_markdown_v2`]; the builders here own that discipline so handlers
//! never interpolate raw text.

use chrono::{DateTime, Utc};

use crate::domain::Note;

pub const MSG_DRAFT_EMPTY: &str = "The draft is still empty.";
pub const MSG_DRAFT_CLEARED: &str = "Draft cleared.";
pub const MSG_SUBMIT_FAILED: &str = "Something went wrong, nothing was submitted.";
pub const MSG_DELETE_FAILED: &str = "No such note.";
pub const MSG_DELETED: &str = "Deleted.";
pub const MSG_SEARCH_TEXT_ONLY: &str = "Search works on text only.";
pub const MSG_KEY_ROTATED: &str = "Access key rotated, old links are dead.";
pub const MSG_COMMANDS_SYNCED: &str = "Commands synced, give it a minute.";

const MDV2_SPECIALS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];

/// Escape text for interpolation into a MarkdownV2 message body.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if MDV2_SPECIALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape text for interpolation inside a MarkdownV2 code span.
fn escape_code(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`")
}

/// Common message header: `📝 *Quill* \#Tag`.
pub fn header(tag: &str) -> String {
    format!("📝 *Quill* \\#{}\n", escape_markdown_v2(tag))
}

pub fn pagination(page: usize, pages: usize, total: usize) -> String {
    format!("\nPage: {page}/{pages}  Count: {total}")
}

/// One list entry: id, creation time, linked title.
pub fn note_line(note: &Note, view_url: &str) -> String {
    format!(
        "{} \\| `{}` \\| [{}]({})\n",
        note.id,
        format_time(note.created_at),
        escape_markdown_v2(&note.title),
        view_url,
    )
}

pub fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

pub fn start_text(total: usize, last_week: usize, fragments: usize) -> String {
    format!(
        "{}\nNotes so far: `{total}`, added in the last week: `{last_week}`\\.\n\
         The draft holds `{fragments}` fragments\\.",
        header("Start"),
    )
}

pub fn preview_text(fragments: usize) -> String {
    format!("{}\nThe draft holds `{fragments}` fragments\\.", header("Preview"))
}

pub fn submitted_text(note: &Note) -> String {
    format!("Submitted as note {}.", note.id)
}

pub fn mode_switched(mode_name: &str) -> String {
    format!("Mode switched to: {mode_name}")
}

pub fn search_header(query: &str) -> String {
    format!("{} `{}`\n\n", header("Search").trim_end(), escape_code(query))
}

pub fn list_header() -> String {
    format!("{}\n", header("List"))
}
