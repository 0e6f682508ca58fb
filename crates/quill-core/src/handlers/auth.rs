//! The owner gate. Single-user service: everything not from the configured
//! owner terminates here, silently.

use async_trait::async_trait;

use crate::{
    adapter::Adapter,
    context::Context,
    domain::UserId,
    Result,
};

pub struct OwnerGate {
    owner: UserId,
}

impl OwnerGate {
    pub fn new(owner: UserId) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl Adapter for OwnerGate {
    fn matches(&self, _ctx: &Context) -> bool {
        true
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        if ctx.sender() != self.owner {
            tracing::debug!(sender = ctx.sender().0, "dropping update from non-owner");
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::treetest::harness;
    use crate::ports::Store;
    use crate::testutil::message_update_from;

    #[tokio::test]
    async fn non_owner_updates_are_dropped_without_a_reply() {
        let h = harness();
        h.run(message_update_from(1, 10, 999, "/list")).await.unwrap();
        assert!(h.transport.sent().is_empty());

        h.run(message_update_from(2, 10, 999, "some draft text"))
            .await
            .unwrap();
        assert_eq!(h.store.fragment_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn owner_updates_pass_through_the_gate() {
        let h = harness();
        h.run(message_update_from(1, 10, 1, "/list")).await.unwrap();
        assert_eq!(h.transport.sent().len(), 1);
    }
}
