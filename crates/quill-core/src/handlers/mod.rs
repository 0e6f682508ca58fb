//! The bot's adapter tree.
//!
//! Root: an owner gate that silently drops anything from another user.
//! Children, in declaration order (order is load-bearing — the command
//! router must sit before the free-text adapter):
//! 1. command router → list / clear / submit / mode / preview / start / delete
//! 2. free text (input or search mode)
//! 3. edited message (draft fragment rewrite)
//! 4. inline query (search as articles)
//! 5. callback router → list nav / search nav / rotate key / sync commands

use std::sync::Arc;

use chrono::Utc;

use crate::{
    adapter::{AdapterTree, Node},
    domain::UserId,
    keyring::KeyRing,
    ports::{Segmenter, Store},
    token::{self, TokenKind},
};

pub mod auth;
pub mod callback;
pub mod commands;
pub mod inline;
pub mod input;
mod pages;

pub use input::{Mode, ModeSwitch};

/// Everything the handlers share, wired once at startup.
pub struct HandlerDeps {
    pub owner: UserId,
    /// Public origin for preview links, no trailing slash.
    pub base_url: String,
    pub keys: Arc<KeyRing>,
    pub store: Arc<dyn Store>,
    pub segmenter: Arc<dyn Segmenter>,
    pub mode: ModeSwitch,
}

impl HandlerDeps {
    /// Mint a token under the current key and wrap it into a preview URL.
    pub fn preview_url(&self, kind: TokenKind, resource_id: u64) -> String {
        let key = self.keys.snapshot();
        format!(
            "{}/preview/{}",
            self.base_url,
            token::issue(&key, kind, resource_id, Utc::now())
        )
    }
}

pub fn build_tree(deps: Arc<HandlerDeps>) -> AdapterTree {
    AdapterTree::new(vec![Node::with_children(
        auth::OwnerGate::new(deps.owner),
        vec![
            Node::with_children(
                commands::CommandRouter,
                vec![
                    Node::leaf(commands::ListCommand(deps.clone())),
                    Node::leaf(commands::ClearCommand(deps.clone())),
                    Node::leaf(commands::SubmitCommand(deps.clone())),
                    Node::leaf(commands::ModeCommand(deps.clone())),
                    Node::leaf(commands::PreviewCommand(deps.clone())),
                    Node::leaf(commands::StartCommand(deps.clone())),
                    Node::leaf(commands::DeleteCommand(deps.clone())),
                ],
            ),
            Node::leaf(input::FreeText(deps.clone())),
            Node::leaf(input::EditedText(deps.clone())),
            Node::leaf(inline::InlineSearch(deps.clone())),
            Node::with_children(
                callback::CallbackRouter,
                vec![
                    Node::leaf(callback::ListPageCallback(deps.clone())),
                    Node::leaf(callback::SearchPageCallback(deps.clone())),
                    Node::leaf(callback::RotateKeyCallback(deps.clone())),
                    Node::leaf(callback::SyncCommandsCallback(deps)),
                ],
            ),
        ],
    )])
}
