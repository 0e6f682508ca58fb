//! Ephemeral web front: preview pages, the attachment file store and the
//! optional Telegram webhook endpoint.
//!
//! Everything here answers 404 on any access failure. Preview links carry
//! their token in the path; the first successful view mirrors it into a
//! strict cookie so relative `/file/` references inside the page can be
//! authorized too.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use quill_core::{access::Access, engine::Engine, update::Update, Result};

/// Cookie the preview page mirrors its token into.
const TOKEN_COOKIE: &str = "token";

/// Webhook bodies are parsed by the transport crate; the web layer only
/// holds a boxed parser so it never depends on a wire format.
pub type UpdateParser = Box<dyn Fn(&[u8]) -> Result<Update> + Send + Sync>;

pub struct WebState {
    pub access: Access,
    pub files_dir: PathBuf,
    pub webhook: Option<Webhook>,
}

pub struct Webhook {
    pub engine: Engine,
    pub parse: UpdateParser,
}

/// Build the router. The webhook route is only mounted when a path is
/// configured; polling deployments expose no ingestion endpoint at all.
pub fn router(state: Arc<WebState>, webhook_path: Option<&str>) -> Router {
    let mut router = Router::new()
        .route("/preview/:token", get(preview))
        .route("/file/:name", get(file))
        .route("/robots.txt", get(robots));
    if let Some(path) = webhook_path {
        router = router.route(path, post(webhook));
    }
    router.with_state(state)
}

/// Bind and serve until cancelled. In-flight requests finish.
pub async fn serve(addr: &str, router: Router, cancel: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "web server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    tracing::info!("web server stopped");
    Ok(())
}

async fn preview(State(state): State<Arc<WebState>>, Path(token): Path<String>) -> Response {
    match state.access.page(&token, Utc::now()).await {
        Ok(body) => {
            let cookie = format!(
                "{TOKEN_COOKIE}={token}; Path=/; Secure; HttpOnly; SameSite=Strict"
            );
            (
                [
                    (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                    (header::SET_COOKIE, cookie),
                ],
                page_html(&body),
            )
                .into_response()
        }
        Err(_) => not_found(),
    }
}

/// Attachments referenced from a preview page. Authorized by the mirrored
/// cookie only; there is no per-file token.
async fn file(
    State(state): State<Arc<WebState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = cookie_value(&headers, TOKEN_COOKIE) else {
        return not_found();
    };
    if state.access.authorize(&token, Utc::now()).is_err() {
        return not_found();
    }
    if !safe_filename(&name) {
        return not_found();
    }

    match tokio::fs::read(state.files_dir.join(&name)).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, content_type(&name))],
            bytes,
        )
            .into_response(),
        Err(_) => not_found(),
    }
}

async fn robots() -> &'static str {
    "User-agent: *\nDisallow: /\n"
}

/// Each webhook request carries exactly one update; it is dispatched like
/// a polled one and the response does not wait for the handlers.
async fn webhook(State(state): State<Arc<WebState>>, body: Bytes) -> StatusCode {
    let Some(hook) = &state.webhook else {
        return StatusCode::NOT_FOUND;
    };
    match (hook.parse)(&body) {
        Ok(update) => {
            hook.engine.dispatch(update);
            StatusCode::OK
        }
        Err(e) => {
            tracing::warn!(error = %e, "webhook body rejected");
            StatusCode::BAD_REQUEST
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

fn page_html(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n\
         <meta name=\"robots\" content=\"noindex, nofollow\" />\n\
         <title>Quill</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// The saver only writes names made of alphanumerics, `.`, `-` and `_`
/// that do not start with a dot; serve nothing outside that set.
fn safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") | Some("md") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::HeaderValue;

    use quill_core::{
        adapter::AdapterTree,
        domain::{ChatId, Fragment, MessageId, UserId},
        keyring::KeyRing,
        ports::{BotTransport, Store},
        render::MarkdownRenderer,
        reply::Reply,
        store::MemoryStore,
        token::{self, TokenKind, Ttls},
        update::{Attachment, IncomingMessage, UpdateKind},
        Error,
    };

    use super::*;

    struct NullTransport;

    #[async_trait]
    impl BotTransport for NullTransport {
        async fn fetch_updates(&self, _offset: i64) -> Result<Vec<Update>> {
            Ok(Vec::new())
        }
        async fn deliver(&self, _reply: Reply) -> Result<()> {
            Ok(())
        }
        async fn save_attachment(&self, _attachment: &Attachment) -> Result<String> {
            Ok(String::new())
        }
        async fn webhook_url(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn set_webhook(&self, _url: &str) -> Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        state: Arc<WebState>,
        keys: Arc<KeyRing>,
    }

    fn fixture(store: Arc<MemoryStore>, files_dir: PathBuf, webhook: Option<Webhook>) -> Fixture {
        let keys = Arc::new(KeyRing::generate());
        let access = Access::new(
            keys.clone(),
            Ttls::default(),
            store,
            Arc::new(MarkdownRenderer::new()),
        );
        Fixture {
            state: Arc::new(WebState {
                access,
                files_dir,
                webhook,
            }),
            keys,
        }
    }

    fn preview_token(keys: &KeyRing) -> String {
        token::issue(&keys.snapshot(), TokenKind::Preview, 0, Utc::now())
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("other=1; token={token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn valid_preview_token_renders_and_sets_the_cookie() {
        let store = Arc::new(MemoryStore::new());
        store
            .append_fragment(Fragment {
                message_id: MessageId(1),
                text: "# draft heading".into(),
            })
            .await
            .unwrap();
        let f = fixture(store, PathBuf::from("/nonexistent"), None);

        let token = preview_token(&f.keys);
        let resp = preview(State(f.state), Path(token.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers().get(header::SET_COOKIE).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(&format!("token={token}")));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn bad_tokens_answer_not_found() {
        let f = fixture(
            Arc::new(MemoryStore::new()),
            PathBuf::from("/nonexistent"),
            None,
        );
        let resp = preview(State(f.state), Path("garbage".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn files_require_a_valid_cookie() {
        let dir = std::env::temp_dir().join("quill-web-test-files");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("pic.png"), b"png bytes")
            .await
            .unwrap();
        let f = fixture(Arc::new(MemoryStore::new()), dir, None);

        // No cookie at all.
        let resp = file(
            State(f.state.clone()),
            Path("pic.png".to_string()),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Stale cookie from before a rotation.
        let stale = preview_token(&f.keys);
        f.keys.rotate();
        let resp = file(
            State(f.state.clone()),
            Path("pic.png".to_string()),
            cookie_headers(&stale),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Fresh cookie.
        let token = preview_token(&f.keys);
        let resp = file(
            State(f.state),
            Path("pic.png".to_string()),
            cookie_headers(&token),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
    }

    #[tokio::test]
    async fn traversal_shaped_names_are_rejected() {
        let f = fixture(
            Arc::new(MemoryStore::new()),
            PathBuf::from("/nonexistent"),
            None,
        );
        let token = preview_token(&f.keys);
        for name in ["..", ".hidden", "a/b", ""] {
            let resp = file(
                State(f.state.clone()),
                Path(name.to_string()),
                cookie_headers(&token),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "name {name:?}");
        }
    }

    #[tokio::test]
    async fn webhook_dispatches_parsed_updates_and_rejects_garbage() {
        let engine = Engine::new(
            Arc::new(NullTransport),
            AdapterTree::new(Vec::new()),
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        let parse: UpdateParser = Box::new(|body| {
            if body == b"ok" {
                Ok(Update {
                    id: 1,
                    kind: UpdateKind::Message(IncomingMessage {
                        chat_id: ChatId(1),
                        message_id: MessageId(1),
                        from: UserId(1),
                        text: "hello".to_string(),
                        attachments: Vec::new(),
                    }),
                })
            } else {
                Err(Error::Transport("bad body".into()))
            }
        });
        let f = fixture(
            Arc::new(MemoryStore::new()),
            PathBuf::from("/nonexistent"),
            Some(Webhook { engine, parse }),
        );

        let status = webhook(State(f.state.clone()), Bytes::from_static(b"ok")).await;
        assert_eq!(status, StatusCode::OK);

        let status = webhook(State(f.state), Bytes::from_static(b"nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cookie_parsing_picks_the_named_pair() {
        let headers = cookie_headers("abc123");
        assert_eq!(cookie_value(&headers, "token").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
        assert_eq!(cookie_value(&HeaderMap::new(), "token"), None);
    }
}
