//! Transport-neutral outbound actions, mapped to wire calls by the adapter.

use crate::domain::{ChatId, MessageId, MessageRef};

#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Message {
        chat_id: ChatId,
        text: String,
        /// Render as MarkdownV2; callers own the escaping.
        markdown: bool,
        reply_to: Option<MessageId>,
        keyboard: Option<Keyboard>,
    },
    EditMessage {
        target: MessageRef,
        text: String,
        markdown: bool,
        keyboard: Option<Keyboard>,
    },
    CallbackAnswer {
        callback_id: String,
        text: Option<String>,
    },
    InlineAnswer {
        inline_query_id: String,
        articles: Vec<InlineArticle>,
        next_offset: Option<String>,
        personal: bool,
    },
    SyncCommands {
        commands: Vec<CommandSpec>,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn single_row(buttons: Vec<Button>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Button {
    Url { label: String, url: String },
    Callback { label: String, data: String },
}

impl Button {
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Url {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Callback {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// One entry in an inline-query answer.
#[derive(Clone, Debug, PartialEq)]
pub struct InlineArticle {
    pub id: String,
    pub title: String,
    /// Message content sent when the entry is picked.
    pub text: String,
    pub description: String,
    pub button: Option<Button>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandSpec {
    pub command: String,
    pub description: String,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}
