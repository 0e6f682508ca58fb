//! The command router and its leaves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::{
    adapter::Adapter,
    context::Context,
    domain::NoteId,
    format,
    reply::{Button, CommandSpec, Keyboard},
    token::TokenKind,
    Result,
};

use super::callback::CallbackData;
use super::{pages, HandlerDeps};

/// Gate for messages carrying a leading `/command`; routing happens in the
/// children, so the action is a pass-through.
pub struct CommandRouter;

#[async_trait]
impl Adapter for CommandRouter {
    fn matches(&self, ctx: &Context) -> bool {
        ctx.update().message().is_some_and(|m| m.is_command())
    }

    async fn handle(&self, _ctx: &mut Context) -> Result<bool> {
        Ok(false)
    }
}

fn command_is(ctx: &Context, name: &str) -> bool {
    ctx.update()
        .message()
        .is_some_and(|m| m.command() == Some(name))
}

/// The command menu pushed by the sync-commands callback.
pub fn command_menu() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("start", "Greeting and counts"),
        CommandSpec::new("list", "Recent notes"),
        CommandSpec::new("mode", "Flip input/search mode"),
        CommandSpec::new("preview", "Preview the draft"),
        CommandSpec::new("submit", "Turn the draft into a note"),
        CommandSpec::new("clear", "Empty the draft"),
        CommandSpec::new("delete", "Delete a note by id"),
    ]
}

pub struct StartCommand(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for StartCommand {
    fn matches(&self, ctx: &Context) -> bool {
        command_is(ctx, "start")
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let deps = &self.0;
        let total = deps.store.note_count().await?;
        let week = deps
            .store
            .notes_since(Utc::now() - Duration::days(7))
            .await?;
        let fragments = deps.store.fragment_count().await?;

        let keyboard = Keyboard::single_row(vec![
            Button::callback("Rotate key", CallbackData::rotate_key().encode()),
            Button::callback("Sync commands", CallbackData::sync_commands().encode()),
        ]);
        ctx.send_markdown(format::start_text(total, week, fragments), Some(keyboard))
            .await?;
        Ok(true)
    }
}

pub struct ListCommand(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for ListCommand {
    fn matches(&self, ctx: &Context) -> bool {
        command_is(ctx, "list")
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let (text, keyboard) = pages::list_page(&self.0, 1).await?;
        ctx.send_markdown(text, Some(keyboard)).await?;
        Ok(true)
    }
}

pub struct ModeCommand(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for ModeCommand {
    fn matches(&self, ctx: &Context) -> bool {
        command_is(ctx, "mode")
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let mode = self.0.mode.flip();
        ctx.reply_text(&format::mode_switched(mode.name())).await?;
        Ok(true)
    }
}

pub struct PreviewCommand(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for PreviewCommand {
    fn matches(&self, ctx: &Context) -> bool {
        command_is(ctx, "preview")
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let deps = &self.0;
        let url = deps.preview_url(TokenKind::Preview, 0);
        let fragments = deps.store.fragment_count().await?;
        let keyboard = Keyboard::single_row(vec![Button::url("Open preview", url)]);
        ctx.send_markdown(format::preview_text(fragments), Some(keyboard))
            .await?;
        Ok(true)
    }
}

pub struct SubmitCommand(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for SubmitCommand {
    fn matches(&self, ctx: &Context) -> bool {
        command_is(ctx, "submit")
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let deps = &self.0;
        if deps.store.fragment_count().await? == 0 {
            ctx.reply_text(format::MSG_DRAFT_EMPTY).await?;
            return Ok(true);
        }
        match deps.store.submit_draft().await {
            Ok(Some(note)) => ctx.reply_text(&format::submitted_text(&note)).await?,
            Ok(None) => ctx.reply_text(format::MSG_DRAFT_EMPTY).await?,
            Err(e) => {
                tracing::warn!(error = %e, "submit failed");
                ctx.reply_text(format::MSG_SUBMIT_FAILED).await?;
            }
        }
        Ok(true)
    }
}

pub struct ClearCommand(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for ClearCommand {
    fn matches(&self, ctx: &Context) -> bool {
        command_is(ctx, "clear")
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        self.0.store.clear_draft().await?;
        ctx.reply_text(format::MSG_DRAFT_CLEARED).await?;
        Ok(true)
    }
}

pub struct DeleteCommand(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for DeleteCommand {
    fn matches(&self, ctx: &Context) -> bool {
        command_is(ctx, "delete")
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let args = ctx
            .update()
            .message()
            .map(|m| m.command_args().to_string())
            .unwrap_or_default();

        let Ok(id) = args.parse::<u64>() else {
            ctx.reply_text(format::MSG_DELETE_FAILED).await?;
            return Ok(true);
        };
        let deleted = self.0.store.delete_note(NoteId(id)).await?;
        ctx.reply_text(if deleted {
            format::MSG_DELETED
        } else {
            format::MSG_DELETE_FAILED
        })
        .await?;
        Ok(true)
    }
}
