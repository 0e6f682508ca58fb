//! The web access layer: token string in, rendered page out.
//!
//! Every failure on this path — bad base64, wrong key, unknown kind, expired
//! window, missing note, wrong kind for the draft — collapses into the one
//! [`Error::Token`] outcome, which the web layer surfaces as 404. A caller
//! probing tokens learns nothing about which check tripped.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    domain::NoteId,
    format::format_time,
    keyring::KeyRing,
    ports::{Renderer, Store},
    render::escape_html,
    token::{self, Token, TokenKind, Ttls},
    Error, Result,
};

pub struct Access {
    keys: Arc<KeyRing>,
    ttls: Ttls,
    store: Arc<dyn Store>,
    renderer: Arc<dyn Renderer>,
}

impl Access {
    pub fn new(
        keys: Arc<KeyRing>,
        ttls: Ttls,
        store: Arc<dyn Store>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            keys,
            ttls,
            store,
            renderer,
        }
    }

    /// Decode and validate without fetching anything. Used to re-authorize
    /// requests that carry only the mirrored cookie.
    pub fn authorize(&self, token_str: &str, now: DateTime<Utc>) -> Result<Token> {
        let key = self.keys.snapshot();
        let token = token::decode(&key, token_str)?;
        if !token.is_valid(&self.ttls, now) {
            return Err(Error::Token);
        }
        Ok(token)
    }

    /// Full page body for a valid token: the draft buffer for a Preview
    /// token with resource 0, a stored note otherwise.
    pub async fn page(&self, token_str: &str, now: DateTime<Utc>) -> Result<String> {
        let token = self.authorize(token_str, now)?;

        if token.resource_id == 0 {
            if token.kind != TokenKind::Preview {
                return Err(Error::Token);
            }
            let draft = self.store.draft_text().await.map_err(|_| Error::Token)?;
            return Ok(self.renderer.markdown_to_safe_html(&draft));
        }

        let note = self
            .store
            .note(NoteId(token.resource_id))
            .await
            .map_err(|_| Error::Token)?
            .ok_or(Error::Token)?;

        Ok(format!(
            "<h1>{}</h1>\n{}\n<hr />\n<p>{}</p>",
            escape_html(&note.title),
            self.renderer.markdown_to_safe_html(&note.content),
            format_time(note.created_at),
        ))
    }
}
