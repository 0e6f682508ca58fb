//! Hand-rolled fakes shared by the unit tests. No mock frameworks.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    ports::BotTransport,
    reply::Reply,
    update::{
        Attachment, CallbackQuery, IncomingMessage, InlineQuery, Update, UpdateKind,
    },
    Result,
};

/// Records everything delivered and serves scripted update batches.
///
/// When the batch script runs out, `fetch_updates` parks forever so a polling
/// loop under test sits idle until its cancellation token fires.
#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<Reply>>,
    batches: Mutex<VecDeque<Result<Vec<Update>>>>,
    fetch_offsets: Mutex<Vec<i64>>,
}

impl FakeTransport {
    pub fn push_batch(&self, batch: Result<Vec<Update>>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn sent(&self) -> Vec<Reply> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fetch_offsets(&self) -> Vec<i64> {
        self.fetch_offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotTransport for FakeTransport {
    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.fetch_offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => futures::future::pending().await,
        }
    }

    async fn deliver(&self, reply: Reply) -> Result<()> {
        self.sent.lock().unwrap().push(reply);
        Ok(())
    }

    async fn save_attachment(&self, attachment: &Attachment) -> Result<String> {
        Ok(attachment
            .name
            .clone()
            .unwrap_or_else(|| format!("{}.bin", attachment.file_id)))
    }

    async fn webhook_url(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn set_webhook(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

pub fn message_update(id: i64, chat_id: i64, text: &str) -> Update {
    message_update_from(id, chat_id, 1, text)
}

pub fn message_update_from(id: i64, chat_id: i64, from: i64, text: &str) -> Update {
    Update {
        id,
        kind: UpdateKind::Message(IncomingMessage {
            chat_id: ChatId(chat_id),
            message_id: MessageId(id),
            from: UserId(from),
            text: text.to_string(),
            attachments: Vec::new(),
        }),
    }
}

pub fn edited_update(id: i64, chat_id: i64, message_id: i64, text: &str) -> Update {
    Update {
        id,
        kind: UpdateKind::EditedMessage(IncomingMessage {
            chat_id: ChatId(chat_id),
            message_id: MessageId(message_id),
            from: UserId(1),
            text: text.to_string(),
            attachments: Vec::new(),
        }),
    }
}

pub fn inline_update(id: i64, query: &str, offset: &str) -> Update {
    Update {
        id,
        kind: UpdateKind::InlineQuery(InlineQuery {
            id: format!("iq{id}"),
            from: UserId(1),
            query: query.to_string(),
            offset: offset.to_string(),
        }),
    }
}

pub fn callback_update(id: i64, chat_id: i64, data: &str) -> Update {
    Update {
        id,
        kind: UpdateKind::CallbackQuery(CallbackQuery {
            id: format!("cb{id}"),
            from: UserId(1),
            data: data.to_string(),
            origin: Some(MessageRef {
                chat_id: ChatId(chat_id),
                message_id: MessageId(900),
            }),
        }),
    }
}
