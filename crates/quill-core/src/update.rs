//! Transport-neutral inbound events.
//!
//! Carries only what routing and the handlers need; wire-format details stay
//! in the adapter crates.

use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// One inbound event with the source's monotonically increasing id.
#[derive(Clone, Debug)]
pub struct Update {
    pub id: i64,
    pub kind: UpdateKind,
}

#[derive(Clone, Debug)]
pub enum UpdateKind {
    Message(IncomingMessage),
    EditedMessage(IncomingMessage),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    CallbackQuery(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub from: UserId,
    /// Message text, or the media caption; empty when there is neither.
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Debug)]
pub struct Attachment {
    pub file_id: String,
    pub kind: AttachmentKind,
    /// Original filename when the source supplies one.
    pub name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Document,
    Video,
    Animation,
    Audio,
    Voice,
    VideoNote,
}

#[derive(Clone, Debug)]
pub struct InlineQuery {
    pub id: String,
    pub from: UserId,
    pub query: String,
    /// Result offset as handed back by the source; empty on the first page.
    pub offset: String,
}

#[derive(Clone, Debug)]
pub struct ChosenInlineResult {
    pub from: UserId,
    pub result_id: String,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub id: String,
    pub from: UserId,
    pub data: String,
    /// Message the pressed keyboard was attached to, when still available.
    pub origin: Option<MessageRef>,
}

impl Update {
    pub fn message(&self) -> Option<&IncomingMessage> {
        match &self.kind {
            UpdateKind::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn edited_message(&self) -> Option<&IncomingMessage> {
        match &self.kind {
            UpdateKind::EditedMessage(m) => Some(m),
            _ => None,
        }
    }

    pub fn inline_query(&self) -> Option<&InlineQuery> {
        match &self.kind {
            UpdateKind::InlineQuery(q) => Some(q),
            _ => None,
        }
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.kind {
            UpdateKind::CallbackQuery(c) => Some(c),
            _ => None,
        }
    }

    /// Sender of the event, whatever its kind.
    pub fn from(&self) -> UserId {
        match &self.kind {
            UpdateKind::Message(m) | UpdateKind::EditedMessage(m) => m.from,
            UpdateKind::InlineQuery(q) => q.from,
            UpdateKind::ChosenInlineResult(r) => r.from,
            UpdateKind::CallbackQuery(c) => c.from,
        }
    }

    /// Chat the event can be answered in, when it has one.
    pub fn chat_id(&self) -> Option<ChatId> {
        match &self.kind {
            UpdateKind::Message(m) | UpdateKind::EditedMessage(m) => Some(m.chat_id),
            UpdateKind::CallbackQuery(c) => c.origin.map(|m| m.chat_id),
            _ => None,
        }
    }
}

impl IncomingMessage {
    pub fn is_command(&self) -> bool {
        self.command().is_some()
    }

    /// Leading `/command` name, with any `@botname` suffix stripped.
    pub fn command(&self) -> Option<&str> {
        let rest = self.text.strip_prefix('/')?;
        let word = rest.split_whitespace().next()?;
        if word.is_empty() {
            return None;
        }
        Some(word.split('@').next().unwrap_or(word))
    }

    /// Everything after the command name.
    pub fn command_args(&self) -> &str {
        match self.text.split_once(char::is_whitespace) {
            Some((_, args)) => args.trim(),
            None => "",
        }
    }
}
