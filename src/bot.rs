use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use futures::StreamExt;
use teloxide::prelude::*;
use teloxide::update_listeners::{self, AsUpdateStream};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::server::{self, UpdateQueue};

/// How many long-poll updates may be handled at once.
const POLL_CONCURRENCY: usize = 16;

/// One serving run: bind the HTTP surface, then pump updates until
/// shutdown. The supervisor in `main` calls this again after a crash.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let bot = Bot::new(&config.bot_token);
    let dispatcher = Arc::new(Dispatcher::new(bot.clone(), config.clone()));

    let queue: UpdateQueue = Arc::new(OnceLock::new());
    let app = server::router(queue.clone(), config.webhook_url.is_some());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind liveness endpoint on {addr}"))?;
    info!(%addr, "liveness endpoint listening");

    let mut http = tokio::spawn(async move { axum::serve(listener, app).await });

    let serve = async {
        match config.webhook_url.clone() {
            Some(url) => run_webhook(bot, dispatcher, queue, url).await,
            None => run_polling(bot, dispatcher).await,
        }
    };

    let result = tokio::select! {
        result = serve => result,
        result = &mut http => match result {
            Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server exited unexpectedly")),
            Ok(Err(e)) => Err(e).context("HTTP server failed"),
            Err(e) => Err(e).context("HTTP server task panicked"),
        },
    };

    // Release the port so a supervised restart can bind it again.
    http.abort();
    result
}

async fn run_polling(bot: Bot, dispatcher: Arc<Dispatcher>) -> Result<()> {
    info!("starting long-poll update loop");
    // The default listener clears any stale webhook before the first fetch.
    let mut listener = update_listeners::polling_default(bot).await;
    let dispatch_loop = listener
        .as_stream()
        .for_each_concurrent(POLL_CONCURRENCY, |next| {
            let dispatcher = dispatcher.clone();
            async move {
                match next {
                    Ok(update) => dispatcher.dispatch(update).await,
                    Err(e) => warn!("transport error while fetching updates: {e}"),
                }
            }
        });

    tokio::select! {
        _ = dispatch_loop => anyhow::bail!("update stream ended unexpectedly"),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    }
}

async fn run_webhook(
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    queue: UpdateQueue,
    url: Url,
) -> Result<()> {
    // Idempotent delete-then-set so a crashed previous run cannot leave a
    // stale registration behind.
    bot.delete_webhook()
        .drop_pending_updates(true)
        .await
        .context("failed to clear existing webhook")?;
    bot.set_webhook(url.clone())
        .await
        .context("failed to register webhook")?;
    info!(%url, "webhook registered");

    // Wiring the sender flips the webhook route from 503 to accepting.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _ = queue.set(tx);

    let dispatch_loop = async {
        while let Some(update) = rx.recv().await {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(update).await });
        }
    };

    tokio::select! {
        _ = dispatch_loop => anyhow::bail!("webhook queue closed unexpectedly"),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, removing webhook");
            if let Err(e) = bot.delete_webhook().await {
                warn!("failed to delete webhook during shutdown: {e}");
            }
            Ok(())
        }
    }
}
