//! Callback-query router and leaves. Callback data travels as compact JSON,
//! `{"t":<type>,"p":[...]}`; unknown or unparsable data never enters the
//! router.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    adapter::Adapter,
    context::Context,
    format,
    reply::{Keyboard, Reply},
    update::CallbackQuery,
    Result,
};

use super::{commands, pages, HandlerDeps};

pub const CB_NONE: u8 = 0;
pub const CB_SEARCH: u8 = 1;
pub const CB_LIST: u8 = 2;
pub const CB_ROTATE_KEY: u8 = 3;
pub const CB_SYNC_COMMANDS: u8 = 4;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackData {
    #[serde(rename = "t")]
    pub kind: u8,
    #[serde(rename = "p", default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
}

impl CallbackData {
    pub fn list(page: usize) -> Self {
        Self {
            kind: CB_LIST,
            params: vec![page.to_string()],
        }
    }

    /// Search navigation carries the query along with the page, so a later
    /// press can re-run the search without any server-side state.
    pub fn search(query: &str, page: usize) -> Self {
        Self {
            kind: CB_SEARCH,
            params: vec![query.to_string(), page.to_string()],
        }
    }

    pub fn rotate_key() -> Self {
        Self {
            kind: CB_ROTATE_KEY,
            params: Vec::new(),
        }
    }

    pub fn sync_commands() -> Self {
        Self {
            kind: CB_SYNC_COMMANDS,
            params: Vec::new(),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Unparsable data comes back as the `CB_NONE` sentinel.
    pub fn parse(s: &str) -> Self {
        serde_json::from_str(s).unwrap_or_default()
    }
}

fn callback_of(ctx: &Context, kind: u8) -> Option<&CallbackQuery> {
    let cb = ctx.update().callback_query()?;
    (CallbackData::parse(&cb.data).kind == kind).then_some(cb)
}

pub struct CallbackRouter;

#[async_trait]
impl Adapter for CallbackRouter {
    fn matches(&self, ctx: &Context) -> bool {
        ctx.update()
            .callback_query()
            .is_some_and(|cb| CallbackData::parse(&cb.data).kind != CB_NONE)
    }

    async fn handle(&self, _ctx: &mut Context) -> Result<bool> {
        Ok(false)
    }
}

/// Edits the originating list message to the requested page.
pub struct ListPageCallback(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for ListPageCallback {
    fn matches(&self, ctx: &Context) -> bool {
        callback_of(ctx, CB_LIST).is_some()
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let Some(cb) = callback_of(ctx, CB_LIST).cloned() else {
            return Ok(true);
        };
        let data = CallbackData::parse(&cb.data);
        let [page] = data.params.as_slice() else {
            return Ok(true);
        };
        let Ok(page @ 1..) = page.parse::<usize>() else {
            return Ok(true);
        };

        let (text, keyboard) = pages::list_page(&self.0, page).await?;
        edit_origin(ctx, &cb, text, keyboard).await?;
        Ok(true)
    }
}

pub struct SearchPageCallback(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for SearchPageCallback {
    fn matches(&self, ctx: &Context) -> bool {
        callback_of(ctx, CB_SEARCH).is_some()
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let Some(cb) = callback_of(ctx, CB_SEARCH).cloned() else {
            return Ok(true);
        };
        let data = CallbackData::parse(&cb.data);
        let [query, page] = data.params.as_slice() else {
            return Ok(true);
        };
        let Ok(page @ 1..) = page.parse::<usize>() else {
            return Ok(true);
        };
        if query.is_empty() {
            return Ok(true);
        }

        let (text, keyboard) = pages::search_page(&self.0, query, page).await?;
        edit_origin(ctx, &cb, text, keyboard).await?;
        Ok(true)
    }
}

async fn edit_origin(
    ctx: &Context,
    cb: &CallbackQuery,
    text: String,
    keyboard: Keyboard,
) -> Result<()> {
    let Some(target) = cb.origin else {
        // Keyboard on a message too old to edit; just stop the spinner.
        return ctx
            .send(Reply::CallbackAnswer {
                callback_id: cb.id.clone(),
                text: None,
            })
            .await;
    };
    ctx.send(Reply::EditMessage {
        target,
        text,
        markdown: true,
        keyboard: Some(keyboard),
    })
    .await
}

/// Rotates the access key, revoking every link issued so far.
pub struct RotateKeyCallback(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for RotateKeyCallback {
    fn matches(&self, ctx: &Context) -> bool {
        callback_of(ctx, CB_ROTATE_KEY).is_some()
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let Some(cb) = callback_of(ctx, CB_ROTATE_KEY).cloned() else {
            return Ok(true);
        };
        self.0.keys.rotate();
        tracing::info!("access key rotated by request");
        ctx.send(Reply::CallbackAnswer {
            callback_id: cb.id,
            text: Some(format::MSG_KEY_ROTATED.to_string()),
        })
        .await?;
        Ok(true)
    }
}

/// Pushes the bot command menu to the transport.
pub struct SyncCommandsCallback(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for SyncCommandsCallback {
    fn matches(&self, ctx: &Context) -> bool {
        callback_of(ctx, CB_SYNC_COMMANDS).is_some()
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let Some(cb) = callback_of(ctx, CB_SYNC_COMMANDS).cloned() else {
            return Ok(true);
        };
        ctx.send(Reply::SyncCommands {
            commands: commands::command_menu(),
        })
        .await?;
        ctx.send(Reply::CallbackAnswer {
            callback_id: cb.id,
            text: Some(format::MSG_COMMANDS_SYNCED.to_string()),
        })
        .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fragment, MessageId, PAGE_SIZE};
    use crate::handlers::treetest::harness;
    use crate::ports::Store;
    use crate::testutil::{callback_update, message_update};

    #[test]
    fn callback_data_round_trips() {
        let data = CallbackData::search("needle", 3);
        let parsed = CallbackData::parse(&data.encode());
        assert_eq!(parsed, data);
        assert_eq!(data.encode(), r#"{"t":1,"p":["needle","3"]}"#);
    }

    #[test]
    fn garbage_data_parses_to_the_none_sentinel() {
        assert_eq!(CallbackData::parse("not json").kind, CB_NONE);
        assert_eq!(CallbackData::parse("").kind, CB_NONE);
    }

    async fn seed_notes(h: &crate::handlers::treetest::Harness, n: usize) {
        for i in 0..n {
            h.store
                .append_fragment(Fragment {
                    message_id: MessageId(1),
                    text: format!("rust note {i}"),
                })
                .await
                .unwrap();
            h.store.submit_draft().await.unwrap();
        }
    }

    #[tokio::test]
    async fn list_navigation_edits_the_origin_message() {
        let h = harness();
        seed_notes(&h, PAGE_SIZE + 1).await;

        h.run(callback_update(1, 10, &CallbackData::list(2).encode()))
            .await
            .unwrap();

        match h.transport.sent().last().cloned().unwrap() {
            Reply::EditMessage { text, keyboard, .. } => {
                assert!(text.contains("Page: 2/2"));
                // Page 2 of 2: only a Prev button.
                let rows = keyboard.unwrap().rows;
                assert_eq!(rows[0].len(), 1);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_navigation_reruns_the_carried_query() {
        let h = harness();
        seed_notes(&h, PAGE_SIZE + 1).await;

        h.run(callback_update(
            1,
            10,
            &CallbackData::search("rust", 2).encode(),
        ))
        .await
        .unwrap();

        match h.transport.sent().last().cloned().unwrap() {
            Reply::EditMessage { text, .. } => {
                assert!(text.contains("`rust`"));
                assert!(text.contains("Page: 2/2"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_page_params_are_swallowed() {
        let h = harness();
        h.run(callback_update(1, 10, r#"{"t":2,"p":["zero"]}"#))
            .await
            .unwrap();
        h.run(callback_update(2, 10, r#"{"t":2,"p":["0"]}"#))
            .await
            .unwrap();
        h.run(callback_update(3, 10, r#"{"t":2}"#)).await.unwrap();
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn rotate_key_replaces_the_key_and_answers() {
        let h = harness();
        let before = h.deps.keys.snapshot();
        h.run(callback_update(
            1,
            10,
            &CallbackData::rotate_key().encode(),
        ))
        .await
        .unwrap();

        assert_ne!(h.deps.keys.snapshot(), before);
        match h.transport.sent().last().cloned().unwrap() {
            Reply::CallbackAnswer { text, .. } => {
                assert!(text.unwrap().contains("rotated"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sync_commands_pushes_the_menu_then_answers() {
        let h = harness();
        h.run(callback_update(
            1,
            10,
            &CallbackData::sync_commands().encode(),
        ))
        .await
        .unwrap();

        let sent = h.transport.sent();
        assert!(matches!(&sent[0], Reply::SyncCommands { commands } if commands.len() == 7));
        assert!(matches!(&sent[1], Reply::CallbackAnswer { .. }));
    }

    #[tokio::test]
    async fn unknown_callback_data_falls_through_the_router() {
        let h = harness();
        h.run(callback_update(1, 10, "free-form")).await.unwrap();
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn callbacks_do_not_collide_with_message_routing() {
        let h = harness();
        h.run(message_update(1, 10, "note text")).await.unwrap();
        h.run(callback_update(2, 10, &CallbackData::list(1).encode()))
            .await
            .unwrap();
        assert_eq!(h.store.fragment_count().await.unwrap(), 1);
    }
}
