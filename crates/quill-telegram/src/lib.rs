//! Telegram adapter (teloxide).
//!
//! Implements the `quill-core` BotTransport port over the Telegram Bot API:
//! long polling, outbound replies, attachment downloads into the local file
//! store, and webhook management. Wire-format knowledge stays here; the core
//! only ever sees its own `Update` and `Reply` types.

use std::path::PathBuf;

use async_trait::async_trait;
use teloxide::{
    net::Download,
    prelude::*,
    types::{
        BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, InlineQueryResult,
        InlineQueryResultArticle, InputMessageContent, InputMessageContentText, ParseMode,
        ReplyMarkup,
    },
};
use tokio::time::sleep;
use url::Url;

use quill_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    ports::BotTransport,
    reply::{Button, Keyboard, Reply},
    update::{
        Attachment, AttachmentKind, CallbackQuery, ChosenInlineResult, IncomingMessage,
        InlineQuery, Update, UpdateKind,
    },
    Error, Result,
};

/// Long-poll timeout handed to getUpdates, seconds.
const POLL_TIMEOUT_SECS: u32 = 25;

pub struct TelegramTransport {
    bot: Bot,
    files_dir: PathBuf,
}

impl TelegramTransport {
    pub fn new(token: &str, files_dir: PathBuf) -> Self {
        Self {
            bot: Bot::new(token),
            files_dir,
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    /// Retry once on flood control, per Telegram's RetryAfter hint.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl BotTransport for TelegramTransport {
    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let updates = self
            .with_retry(|| {
                self.bot
                    .get_updates()
                    .offset(offset as i32)
                    .timeout(POLL_TIMEOUT_SECS)
            })
            .await?;
        Ok(updates.into_iter().filter_map(map_update).collect())
    }

    async fn deliver(&self, reply: Reply) -> Result<()> {
        match reply {
            Reply::Message {
                chat_id,
                text,
                markdown,
                reply_to,
                keyboard,
            } => {
                let markup = keyboard.as_ref().map(map_keyboard).transpose()?;
                self.with_retry(|| {
                    let mut req = self.bot.send_message(tg_chat(chat_id), text.clone());
                    if markdown {
                        req = req.parse_mode(ParseMode::MarkdownV2);
                    }
                    if let Some(m) = reply_to {
                        req = req.reply_to_message_id(tg_msg_id(m));
                    }
                    if let Some(markup) = markup.clone() {
                        req = req.reply_markup(ReplyMarkup::InlineKeyboard(markup));
                    }
                    req
                })
                .await?;
            }
            Reply::EditMessage {
                target,
                text,
                markdown,
                keyboard,
            } => {
                let markup = keyboard.as_ref().map(map_keyboard).transpose()?;
                self.with_retry(|| {
                    let mut req = self.bot.edit_message_text(
                        tg_chat(target.chat_id),
                        tg_msg_id(target.message_id),
                        text.clone(),
                    );
                    if markdown {
                        req = req.parse_mode(ParseMode::MarkdownV2);
                    }
                    if let Some(markup) = markup.clone() {
                        req = req.reply_markup(markup);
                    }
                    req
                })
                .await?;
            }
            Reply::CallbackAnswer { callback_id, text } => {
                self.with_retry(|| {
                    let mut req = self.bot.answer_callback_query(callback_id.clone());
                    if let Some(text) = text.clone() {
                        req = req.text(text);
                    }
                    req
                })
                .await?;
            }
            Reply::InlineAnswer {
                inline_query_id,
                articles,
                next_offset,
                personal,
            } => {
                let results: Vec<InlineQueryResult> = articles
                    .iter()
                    .map(map_article)
                    .collect::<Result<_>>()?;
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .answer_inline_query(inline_query_id.clone(), results.clone())
                        .is_personal(personal);
                    if let Some(next) = next_offset.clone() {
                        req = req.next_offset(next);
                    }
                    req
                })
                .await?;
            }
            Reply::SyncCommands { commands } => {
                let commands: Vec<BotCommand> = commands
                    .iter()
                    .map(|c| BotCommand::new(c.command.clone(), c.description.clone()))
                    .collect();
                self.with_retry(|| self.bot.set_my_commands(commands.clone()))
                    .await?;
            }
        }
        Ok(())
    }

    async fn save_attachment(&self, attachment: &Attachment) -> Result<String> {
        let file = self
            .with_retry(|| self.bot.get_file(attachment.file_id.clone()))
            .await?;

        let filename = attachment
            .name
            .as_deref()
            .map(sanitize_filename)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback_filename(&attachment.file_id, &file.path));

        tokio::fs::create_dir_all(&self.files_dir).await?;
        let mut dst = tokio::fs::File::create(self.files_dir.join(&filename)).await?;
        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .map_err(|e| Error::Transport(format!("download failed: {e}")))?;

        Ok(filename)
    }

    async fn webhook_url(&self) -> Result<String> {
        let info = self.with_retry(|| self.bot.get_webhook_info()).await?;
        Ok(info.url.map(|u| u.to_string()).unwrap_or_default())
    }

    /// An empty URL clears the registration, switching Telegram back to
    /// serving getUpdates.
    async fn set_webhook(&self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            self.with_retry(|| self.bot.delete_webhook()).await?;
            return Ok(());
        }
        let url =
            Url::parse(url).map_err(|e| Error::Config(format!("bad webhook url {url}: {e}")))?;
        self.with_retry(|| self.bot.set_webhook(url.clone())).await?;
        Ok(())
    }
}

/// Parse one webhook request body into exactly one Update.
pub fn parse_webhook_body(body: &[u8]) -> Result<Update> {
    let update: teloxide::types::Update = serde_json::from_slice(body)
        .map_err(|e| Error::Transport(format!("webhook body: {e}")))?;
    map_update(update).ok_or_else(|| Error::Transport("unsupported update kind".to_string()))
}

fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
    teloxide::types::MessageId(message_id.0 as i32)
}

/// Map a wire update into the core model. Kinds the core does not route
/// (polls, chat membership, channel posts) are skipped here with a debug
/// log; they never reach the engine.
fn map_update(update: teloxide::types::Update) -> Option<Update> {
    use teloxide::types::UpdateKind as Tg;

    let id = i64::from(update.id);
    let kind = match update.kind {
        Tg::Message(m) => UpdateKind::Message(map_message(&m)?),
        Tg::EditedMessage(m) => UpdateKind::EditedMessage(map_message(&m)?),
        Tg::InlineQuery(q) => UpdateKind::InlineQuery(InlineQuery {
            id: q.id,
            from: UserId(q.from.id.0 as i64),
            query: q.query,
            offset: q.offset,
        }),
        Tg::ChosenInlineResult(r) => UpdateKind::ChosenInlineResult(ChosenInlineResult {
            from: UserId(r.from.id.0 as i64),
            result_id: r.result_id,
        }),
        Tg::CallbackQuery(cb) => UpdateKind::CallbackQuery(CallbackQuery {
            id: cb.id,
            from: UserId(cb.from.id.0 as i64),
            data: cb.data.unwrap_or_default(),
            origin: cb.message.map(|m| MessageRef {
                chat_id: ChatId(m.chat.id.0),
                message_id: MessageId(i64::from(m.id.0)),
            }),
        }),
        other => {
            tracing::debug!(update_id = id, kind = ?other, "skipping unsupported update kind");
            return None;
        }
    };
    Some(Update { id, kind })
}

fn map_message(msg: &teloxide::types::Message) -> Option<IncomingMessage> {
    let from = msg.from()?;
    Some(IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(i64::from(msg.id.0)),
        from: UserId(from.id.0 as i64),
        text: msg
            .text()
            .or_else(|| msg.caption())
            .unwrap_or_default()
            .to_string(),
        attachments: map_attachments(msg),
    })
}

fn map_attachments(msg: &teloxide::types::Message) -> Vec<Attachment> {
    let mut out = Vec::new();

    // Telegram sends several sizes of one photo; keep the largest.
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        out.push(attachment(&photo.file.id, AttachmentKind::Photo, None));
    }
    if let Some(doc) = msg.document() {
        out.push(attachment(
            &doc.file.id,
            AttachmentKind::Document,
            doc.file_name.clone(),
        ));
    }
    if let Some(video) = msg.video() {
        out.push(attachment(
            &video.file.id,
            AttachmentKind::Video,
            video.file_name.clone(),
        ));
    }
    if let Some(animation) = msg.animation() {
        out.push(attachment(
            &animation.file.id,
            AttachmentKind::Animation,
            animation.file_name.clone(),
        ));
    }
    if let Some(audio) = msg.audio() {
        out.push(attachment(
            &audio.file.id,
            AttachmentKind::Audio,
            audio.file_name.clone(),
        ));
    }
    if let Some(voice) = msg.voice() {
        out.push(attachment(&voice.file.id, AttachmentKind::Voice, None));
    }
    if let Some(note) = msg.video_note() {
        out.push(attachment(&note.file.id, AttachmentKind::VideoNote, None));
    }

    out
}

fn attachment(file_id: &str, kind: AttachmentKind, name: Option<String>) -> Attachment {
    Attachment {
        file_id: file_id.to_string(),
        kind,
        name,
    }
}

fn map_keyboard(keyboard: &Keyboard) -> Result<InlineKeyboardMarkup> {
    let mut rows = Vec::new();
    for row in &keyboard.rows {
        if row.is_empty() {
            continue;
        }
        let mut buttons = Vec::new();
        for button in row {
            buttons.push(match button {
                Button::Url { label, url } => InlineKeyboardButton::url(
                    label.clone(),
                    Url::parse(url)
                        .map_err(|e| Error::Transport(format!("bad button url {url}: {e}")))?,
                ),
                Button::Callback { label, data } => {
                    InlineKeyboardButton::callback(label.clone(), data.clone())
                }
            });
        }
        rows.push(buttons);
    }
    Ok(InlineKeyboardMarkup::new(rows))
}

fn map_article(article: &quill_core::reply::InlineArticle) -> Result<InlineQueryResult> {
    let content = InputMessageContent::Text(
        InputMessageContentText::new(article.text.clone()).disable_web_page_preview(true),
    );
    let mut result =
        InlineQueryResultArticle::new(article.id.clone(), article.title.clone(), content)
            .description(article.description.clone());
    if let Some(button) = &article.button {
        result = result.reply_markup(map_keyboard(&Keyboard::single_row(vec![button.clone()]))?);
    }
    Ok(InlineQueryResult::Article(result))
}

/// Attachment names come from the sender; keep only a safe subset so they
/// can be used as filenames under the file store.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn fallback_filename(file_id: &str, remote_path: &str) -> String {
    let base = remote_path.rsplit('/').next().unwrap_or_default();
    let base = sanitize_filename(base);
    if base.is_empty() {
        sanitize_filename(file_id)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook_message(text: &str) -> String {
        format!(
            r#"{{
                "update_id": 42,
                "message": {{
                    "message_id": 10,
                    "date": 1700000000,
                    "chat": {{"id": 5, "type": "private", "first_name": "A"}},
                    "from": {{"id": 7, "is_bot": false, "first_name": "A"}},
                    "text": "{text}"
                }}
            }}"#
        )
    }

    #[test]
    fn webhook_message_maps_to_a_core_update() {
        let update = parse_webhook_body(webhook_message("/list").as_bytes()).unwrap();
        assert_eq!(update.id, 42);
        let msg = update.message().expect("a message update");
        assert_eq!(msg.chat_id.0, 5);
        assert_eq!(msg.from.0, 7);
        assert_eq!(msg.command(), Some("list"));
    }

    #[test]
    fn malformed_webhook_bodies_fail_as_transport_errors() {
        assert!(matches!(
            parse_webhook_body(b"not json"),
            Err(Error::Transport(_))
        ));
    }

    #[test]
    fn callback_updates_carry_data_and_origin() {
        let body = r#"{
            "update_id": 43,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 7, "is_bot": false, "first_name": "A"},
                "chat_instance": "ci",
                "data": "{\"t\":2,\"p\":[\"2\"]}",
                "message": {
                    "message_id": 11,
                    "date": 1700000000,
                    "chat": {"id": 5, "type": "private", "first_name": "A"},
                    "from": {"id": 99, "is_bot": true, "first_name": "bot"},
                    "text": "list"
                }
            }
        }"#;
        let update = parse_webhook_body(body.as_bytes()).unwrap();
        let cb = update.callback_query().expect("a callback update");
        assert_eq!(cb.data, r#"{"t":2,"p":["2"]}"#);
        let origin = cb.origin.expect("origin message kept");
        assert_eq!(origin.chat_id.0, 5);
        assert_eq!(origin.message_id.0, 11);
    }

    #[test]
    fn inline_query_updates_map_query_and_offset() {
        let body = r#"{
            "update_id": 44,
            "inline_query": {
                "id": "iq1",
                "from": {"id": 7, "is_bot": false, "first_name": "A"},
                "query": "rust",
                "offset": "15"
            }
        }"#;
        let update = parse_webhook_body(body.as_bytes()).unwrap();
        let q = update.inline_query().expect("an inline query");
        assert_eq!(q.query, "rust");
        assert_eq!(q.offset, "15");
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("photo (1).jpg"), "photo__1_.jpg");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }

    #[test]
    fn fallback_filename_prefers_the_remote_basename() {
        assert_eq!(fallback_filename("abc", "photos/file_1.jpg"), "file_1.jpg");
        assert_eq!(fallback_filename("abc", ""), "abc");
    }

    #[test]
    fn empty_keyboard_rows_are_dropped() {
        let kb = Keyboard { rows: vec![vec![]] };
        let markup = map_keyboard(&kb).unwrap();
        assert!(markup.inline_keyboard.is_empty());
    }
}
