//! Service entrypoint: wires the Telegram transport, the handler tree, the
//! in-memory store and the web front together, then runs until SIGINT.

use std::sync::Arc;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use quill_core::{
    access::Access,
    config::Config,
    domain::UserId,
    engine::Engine,
    handlers::{self, HandlerDeps, ModeSwitch},
    keyring::KeyRing,
    logging,
    ports::BotTransport,
    render::{MarkdownRenderer, WhitespaceSegmenter},
    store::MemoryStore,
};
use quill_telegram::{parse_webhook_body, TelegramTransport};
use quill_web::{UpdateParser, WebState, Webhook};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    logging::init("quill").context("initializing logging")?;

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    let keys = Arc::new(KeyRing::generate());
    if let Some(every) = config.key_rotate_every {
        tracing::info!(?every, "periodic key rotation enabled");
        tasks.push(keys.clone().spawn_rotation(every, cancel.clone()));
    }

    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(TelegramTransport::new(
        &config.telegram_bot_token,
        config.files_dir(),
    ));

    let deps = Arc::new(HandlerDeps {
        owner: UserId(config.telegram_owner_id),
        base_url: config.public_base_url.clone(),
        keys: keys.clone(),
        store: store.clone(),
        segmenter: Arc::new(WhitespaceSegmenter),
        mode: ModeSwitch::default(),
    });
    let engine = Engine::new(
        transport.clone(),
        handlers::build_tree(deps),
        config.poll_backoff,
        cancel.clone(),
    );

    converge_webhook(transport.as_ref(), &config)
        .await
        .context("converging webhook registration")?;

    let access = Access::new(
        keys,
        config.token_ttls,
        store,
        Arc::new(MarkdownRenderer::new()),
    );
    let webhook = config.telegram_webhook_path.as_ref().map(|_| Webhook {
        engine: engine.clone(),
        parse: Box::new(parse_webhook_body) as UpdateParser,
    });
    let state = Arc::new(WebState {
        access,
        files_dir: config.files_dir(),
        webhook,
    });
    let app = quill_web::router(state, config.telegram_webhook_path.as_deref());

    let listen_addr = config.listen_addr.clone();
    let web_cancel = cancel.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = quill_web::serve(&listen_addr, app, web_cancel).await {
            tracing::error!(error = %e, "web server failed");
        }
    }));

    if config.telegram_webhook_path.is_none() {
        tracing::info!("update acquisition: long polling");
        let poller = engine.clone();
        tasks.push(tokio::spawn(async move { poller.run_polling().await }));
    } else {
        tracing::info!("update acquisition: webhook");
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutting down");
    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}

/// Make Telegram's webhook registration match the configuration: register
/// the configured URL if it differs, clear a stale one when running on
/// long polling.
async fn converge_webhook(transport: &TelegramTransport, config: &Config) -> anyhow::Result<()> {
    let desired = config
        .telegram_webhook_path
        .as_ref()
        .map(|path| format!("{}{}", config.public_base_url, path));
    let current = transport.webhook_url().await?;

    match desired {
        Some(url) if url != current => {
            transport.set_webhook(&url).await?;
            tracing::info!(%url, "webhook registered");
        }
        Some(url) => {
            tracing::info!(%url, "webhook already registered");
        }
        None if !current.is_empty() => {
            transport.set_webhook("").await?;
            tracing::info!(stale = %current, "stale webhook cleared");
        }
        None => {}
    }
    Ok(())
}
