//! The adapter tree: predicate + action nodes routing one update to at most
//! one terminal handler chain.
//!
//! The tree is built once at startup and never mutated; concurrent dispatches
//! share it read-only. At every level only the first node whose predicate
//! matches runs, so sibling declaration order is a hard contract: the owner
//! gate sits before everything, the command router before free text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{context::Context, Result};

/// One routing node. `matches` must be cheap and side-effect free; `handle`
/// returns `Ok(true)` to terminate the walk here or `Ok(false)` to delegate
/// to the node's children.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn matches(&self, ctx: &Context) -> bool;

    async fn handle(&self, ctx: &mut Context) -> Result<bool>;
}

/// An adapter plus its ordered children.
pub struct Node {
    adapter: Arc<dyn Adapter>,
    children: Vec<Node>,
}

impl Node {
    pub fn leaf(adapter: impl Adapter + 'static) -> Self {
        Self {
            adapter: Arc::new(adapter),
            children: Vec::new(),
        }
    }

    pub fn with_children(adapter: impl Adapter + 'static, children: Vec<Node>) -> Self {
        Self {
            adapter: Arc::new(adapter),
            children,
        }
    }
}

/// The read-only routing tree.
pub struct AdapterTree {
    roots: Vec<Node>,
}

impl AdapterTree {
    pub fn new(roots: Vec<Node>) -> Self {
        Self { roots }
    }

    /// Walk the tree against `ctx`, first match wins, depth first.
    ///
    /// An empty level accepts vacuously and returns `Ok(true)`; a terminal
    /// handler and an unmatched level both end the walk with `Ok(false)`.
    /// The recursion of the node contract is flattened into a loop: at each
    /// level the first matching node runs, and either terminates the walk or
    /// replaces the level with its children.
    pub async fn run(&self, ctx: &mut Context) -> Result<bool> {
        let mut nodes: &[Node] = &self.roots;
        loop {
            if nodes.is_empty() {
                return Ok(true);
            }
            let Some(node) = nodes.iter().find(|n| n.adapter.matches(ctx)) else {
                return Ok(false);
            };
            if node.adapter.handle(ctx).await? {
                return Ok(false);
            }
            nodes = &node.children;
        }
    }
}
