//! Free-text and edited-message adapters.
//!
//! Free text is interpreted by the current mode: input mode collects it (and
//! any attachments) into a draft fragment keyed by message id; search mode
//! runs it through the segmenter and the store's search.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    adapter::Adapter,
    context::Context,
    domain::Fragment,
    format,
    update::IncomingMessage,
    Result,
};

use super::{pages, HandlerDeps};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Input,
    Search,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Input => "input",
            Mode::Search => "search",
        }
    }
}

/// Shared free-text mode flag. Starts in input mode.
#[derive(Default)]
pub struct ModeSwitch {
    search: AtomicBool,
}

impl ModeSwitch {
    pub fn current(&self) -> Mode {
        if self.search.load(Ordering::Relaxed) {
            Mode::Search
        } else {
            Mode::Input
        }
    }

    /// Toggle and return the new mode.
    pub fn flip(&self) -> Mode {
        let was_search = self.search.fetch_xor(true, Ordering::Relaxed);
        if was_search {
            Mode::Input
        } else {
            Mode::Search
        }
    }
}

pub struct FreeText(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for FreeText {
    fn matches(&self, ctx: &Context) -> bool {
        ctx.update().message().is_some_and(|m| !m.is_command())
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let Some(msg) = ctx.update().message().cloned() else {
            return Ok(true);
        };
        match self.0.mode.current() {
            Mode::Input => self.collect(ctx, &msg).await?,
            Mode::Search => self.search(ctx, &msg).await?,
        }
        Ok(true)
    }
}

impl FreeText {
    async fn collect(&self, ctx: &Context, msg: &IncomingMessage) -> Result<()> {
        let mut buf = String::new();
        if !msg.text.is_empty() {
            buf.push_str(&msg.text);
            buf.push('\n');
        }
        for attachment in &msg.attachments {
            match ctx.transport().save_attachment(attachment).await {
                Ok(filename) => {
                    buf.push_str(&file_link_markdown(&filename));
                    buf.push('\n');
                }
                Err(e) => {
                    tracing::warn!(file_id = %attachment.file_id, error = %e, "attachment skipped");
                }
            }
        }

        let text = buf.trim_end().to_string();
        if text.is_empty() {
            return Ok(());
        }
        self.0
            .store
            .append_fragment(Fragment {
                message_id: msg.message_id,
                text,
            })
            .await
    }

    async fn search(&self, ctx: &Context, msg: &IncomingMessage) -> Result<()> {
        if msg.text.is_empty() {
            return ctx.send_text(format::MSG_SEARCH_TEXT_ONLY).await;
        }
        let (text, keyboard) = pages::search_page(&self.0, &msg.text, 1).await?;
        ctx.send_markdown(text, Some(keyboard)).await
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

/// Markdown link into the local file store; images embed, everything else
/// links by name.
fn file_link_markdown(filename: &str) -> String {
    let is_image = filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
    if is_image {
        format!("![](/file/{filename})")
    } else {
        format!("[{filename}](/file/{filename})")
    }
}

/// Edits to a message whose text is still sitting in the draft rewrite that
/// fragment in place. Edits to anything else are ignored.
pub struct EditedText(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for EditedText {
    fn matches(&self, ctx: &Context) -> bool {
        ctx.update()
            .edited_message()
            .is_some_and(|m| !m.text.is_empty())
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let Some(msg) = ctx.update().edited_message().cloned() else {
            return Ok(true);
        };
        let rewritten = self
            .0
            .store
            .rewrite_fragment(msg.message_id, &msg.text)
            .await?;
        if !rewritten {
            tracing::debug!(message_id = msg.message_id.0, "edit for a non-draft message");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId, UserId};
    use crate::handlers::treetest::harness;
    use crate::ports::Store;
    use crate::reply::Reply;
    use crate::testutil::{edited_update, message_update};
    use crate::update::{Attachment, AttachmentKind, Update, UpdateKind};

    #[test]
    fn mode_flips_back_and_forth() {
        let mode = ModeSwitch::default();
        assert_eq!(mode.current(), Mode::Input);
        assert_eq!(mode.flip(), Mode::Search);
        assert_eq!(mode.flip(), Mode::Input);
    }

    #[test]
    fn image_attachments_embed_and_documents_link() {
        assert_eq!(file_link_markdown("cat.PNG"), "![](/file/cat.PNG)");
        assert_eq!(
            file_link_markdown("notes.pdf"),
            "[notes.pdf](/file/notes.pdf)"
        );
        assert_eq!(
            file_link_markdown("no_extension"),
            "[no_extension](/file/no_extension)"
        );
    }

    #[tokio::test]
    async fn input_mode_collects_text_into_a_fragment() {
        let h = harness();
        h.run(message_update(7, 10, "remember this")).await.unwrap();
        assert_eq!(h.store.draft_text().await.unwrap(), "remember this");
    }

    #[tokio::test]
    async fn attachments_append_markdown_links() {
        let h = harness();
        let update = Update {
            id: 7,
            kind: UpdateKind::Message(IncomingMessage {
                chat_id: ChatId(10),
                message_id: MessageId(7),
                from: UserId(1),
                text: "caption".to_string(),
                attachments: vec![Attachment {
                    file_id: "f1".to_string(),
                    kind: AttachmentKind::Photo,
                    name: Some("pic.jpg".to_string()),
                }],
            }),
        };
        h.run(update).await.unwrap();
        assert_eq!(
            h.store.draft_text().await.unwrap(),
            "caption\n![](/file/pic.jpg)"
        );
    }

    #[tokio::test]
    async fn empty_messages_leave_no_fragment() {
        let h = harness();
        h.run(message_update(7, 10, "")).await.unwrap();
        assert_eq!(h.store.fragment_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_mode_replies_with_matches() {
        let h = harness();
        h.run(message_update(1, 10, "rust notes")).await.unwrap();
        h.run(message_update(2, 10, "/submit")).await.unwrap();
        h.run(message_update(3, 10, "/mode")).await.unwrap();

        h.run(message_update(4, 10, "Rust")).await.unwrap();
        match h.transport.sent().last().cloned().unwrap() {
            Reply::Message { text, markdown, .. } => {
                assert!(markdown);
                assert!(text.contains("Search"));
                assert!(text.contains("Count: 1"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        // Search mode never touches the draft.
        assert_eq!(h.store.fragment_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn edits_rewrite_the_matching_fragment() {
        let h = harness();
        h.run(message_update(7, 10, "first dratf")).await.unwrap();
        h.run(edited_update(8, 10, 7, "first draft")).await.unwrap();
        assert_eq!(h.store.draft_text().await.unwrap(), "first draft");
    }

    #[tokio::test]
    async fn edits_for_unknown_messages_are_ignored() {
        let h = harness();
        h.run(edited_update(8, 10, 99, "ghost")).await.unwrap();
        assert_eq!(h.store.fragment_count().await.unwrap(), 0);
    }
}
