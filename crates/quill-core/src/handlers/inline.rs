//! Inline-query adapter: search results as shareable articles.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    adapter::Adapter,
    context::Context,
    domain::{Note, PAGE_SIZE},
    reply::{Button, InlineArticle, Reply},
    token::TokenKind,
    Result,
};

use super::HandlerDeps;

const NO_MORE_CONTENT: &str = "No more content";

pub struct InlineSearch(pub Arc<HandlerDeps>);

#[async_trait]
impl Adapter for InlineSearch {
    fn matches(&self, ctx: &Context) -> bool {
        ctx.update().inline_query().is_some()
    }

    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        let Some(query) = ctx.update().inline_query().cloned() else {
            return Ok(true);
        };
        let deps = &self.0;
        let offset: usize = query.offset.parse().unwrap_or(0);

        let (notes, total) = if query.query.is_empty() {
            (Vec::new(), 0)
        } else {
            let keywords = deps.segmenter.tokenize(&query.query);
            deps.store.search_notes(&keywords, offset, PAGE_SIZE).await?
        };

        let mut articles: Vec<InlineArticle> =
            notes.iter().map(|n| self.article(n)).collect();
        if articles.is_empty() {
            articles.push(InlineArticle {
                id: "no-more-content".to_string(),
                title: NO_MORE_CONTENT.to_string(),
                text: NO_MORE_CONTENT.to_string(),
                description: String::new(),
                button: None,
            });
        }

        let next_offset = (offset + notes.len() < total).then(|| (offset + PAGE_SIZE).to_string());

        ctx.send(Reply::InlineAnswer {
            inline_query_id: query.id,
            articles,
            next_offset,
            personal: true,
        })
        .await?;
        Ok(true)
    }
}

impl InlineSearch {
    fn article(&self, note: &Note) -> InlineArticle {
        let summary = note.summary();
        InlineArticle {
            id: note.id.to_string(),
            title: note.title.clone(),
            text: summary.clone(),
            description: summary,
            button: Some(Button::url(
                "View note",
                self.0.preview_url(TokenKind::Share, note.id.0),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::treetest::harness;
    use crate::reply::{Button, Reply};
    use crate::testutil::{inline_update, message_update};

    async fn last_answer(h: &crate::handlers::treetest::Harness) -> Reply {
        h.transport.sent().last().cloned().expect("an answer was sent")
    }

    #[tokio::test]
    async fn empty_query_answers_with_the_placeholder() {
        let h = harness();
        h.run(inline_update(1, "", "")).await.unwrap();
        match last_answer(&h).await {
            Reply::InlineAnswer {
                articles,
                next_offset,
                personal,
                ..
            } => {
                assert_eq!(articles.len(), 1);
                assert_eq!(articles[0].title, "No more content");
                assert!(next_offset.is_none());
                assert!(personal);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn matches_become_articles_with_share_links() {
        let h = harness();
        h.run(message_update(1, 10, "rust tricks\nborrowing"))
            .await
            .unwrap();
        h.run(message_update(2, 10, "/submit")).await.unwrap();

        h.run(inline_update(3, "rust", "")).await.unwrap();
        match last_answer(&h).await {
            Reply::InlineAnswer { articles, next_offset, .. } => {
                assert_eq!(articles.len(), 1);
                assert_eq!(articles[0].title, "rust tricks");
                match articles[0].button.as_ref().unwrap() {
                    Button::Url { url, .. } => {
                        assert!(url.starts_with("https://q.example/preview/"));
                    }
                    other => panic!("unexpected button: {other:?}"),
                }
                // Single page of results, nothing more to fetch.
                assert!(next_offset.is_none());
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
