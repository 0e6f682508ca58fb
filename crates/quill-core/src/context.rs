//! Per-dispatch context and its reuse pool.
//!
//! A context couples one inbound update with the transport handle handlers
//! reply through. Contexts are recycled through a bounded free list; checkout
//! reinitializes every field, so pooling is purely an allocation optimization
//! and a reused context can never leak the previous update.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use crate::{
    domain::{ChatId, MessageId, UserId},
    ports::BotTransport,
    reply::{Keyboard, Reply},
    update::{Update, UpdateKind},
    Result,
};

pub const DEFAULT_POOL_CAP: usize = 64;

pub struct Context {
    transport: Arc<dyn BotTransport>,
    update: Update,
}

impl Context {
    fn new(transport: Arc<dyn BotTransport>, update: Update) -> Self {
        Self { transport, update }
    }

    /// Reinitialize for a fresh dispatch. Assigns every field.
    fn reset(&mut self, update: Update) {
        self.update = update;
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn transport(&self) -> &dyn BotTransport {
        self.transport.as_ref()
    }

    pub async fn send(&self, reply: Reply) -> Result<()> {
        self.transport.deliver(reply).await
    }

    /// Plain-text message to the update's chat.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let Some(chat_id) = self.update.chat_id() else {
            return Ok(());
        };
        self.send(plain_message(chat_id, text, None)).await
    }

    /// Plain-text reply to the update's own message.
    pub async fn reply_text(&self, text: &str) -> Result<()> {
        let Some(msg) = self.update.message() else {
            return self.send_text(text).await;
        };
        self.send(plain_message(msg.chat_id, text, Some(msg.message_id)))
            .await
    }

    /// MarkdownV2 message with an optional keyboard to the update's chat.
    pub async fn send_markdown(&self, text: String, keyboard: Option<Keyboard>) -> Result<()> {
        let Some(chat_id) = self.update.chat_id() else {
            return Ok(());
        };
        self.send(Reply::Message {
            chat_id,
            text,
            markdown: true,
            reply_to: None,
            keyboard,
        })
        .await
    }

    pub fn sender(&self) -> UserId {
        self.update.from()
    }
}

fn plain_message(chat_id: ChatId, text: &str, reply_to: Option<MessageId>) -> Reply {
    Reply::Message {
        chat_id,
        text: text.to_string(),
        markdown: false,
        reply_to,
        keyboard: None,
    }
}

/// Bounded free list of contexts sharing one transport handle.
pub struct ContextPool {
    transport: Arc<dyn BotTransport>,
    free: Mutex<Vec<Context>>,
    cap: usize,
}

impl ContextPool {
    pub fn new(transport: Arc<dyn BotTransport>, cap: usize) -> Self {
        Self {
            transport,
            free: Mutex::new(Vec::new()),
            cap,
        }
    }

    /// Take a context (reused or fresh) initialized with `update`.
    pub fn checkout(self: &Arc<Self>, update: Update) -> ContextGuard {
        let reused = self.free.lock().unwrap_or_else(|e| e.into_inner()).pop();
        let ctx = match reused {
            Some(mut ctx) => {
                ctx.reset(update);
                ctx
            }
            None => Context::new(self.transport.clone(), update),
        };
        ContextGuard {
            pool: self.clone(),
            ctx: Some(ctx),
        }
    }

    fn recycle(&self, ctx: Context) {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < self.cap {
            free.push(ctx);
        }
        // beyond the cap the context is simply dropped
    }

    #[cfg(test)]
    fn free_len(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Returns its context to the pool on drop, so handler errors and panics in
/// the dispatch task still recycle it.
pub struct ContextGuard {
    pool: Arc<ContextPool>,
    ctx: Option<Context>,
}

impl Deref for ContextGuard {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx.as_ref().expect("context taken only on drop")
    }
}

impl DerefMut for ContextGuard {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx.as_mut().expect("context taken only on drop")
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.recycle(ctx);
        }
    }
}
