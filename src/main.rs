mod bot;
mod config;
mod dispatch;
mod keepalive;
mod relay;
mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

const MAX_RESTARTS: u32 = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Delay before the nth consecutive restart: 1s, 2s, 4s, ... capped at 60s.
fn restart_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    BACKOFF_BASE.saturating_mul(1u32 << exp).min(BACKOFF_CAP)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bookrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);
    info!("Configuration loaded successfully");
    info!("  Source channel: {}", config.private_channel_id);
    info!("  Public channel: {}", config.public_channel);
    info!(
        "  Mode: {}",
        if config.webhook_url.is_some() {
            "webhook"
        } else {
            "polling"
        }
    );
    info!("  Port: {}", config.port);

    if let Some(base) = config.keep_alive_url.clone() {
        tokio::spawn(keepalive::run(base));
    }

    // Bounded restart supervisor around the serving loop. A crash loop
    // exits non-zero after the ceiling instead of spinning forever.
    let mut crashes = 0u32;
    loop {
        match bot::run(config.clone()).await {
            Ok(()) => {
                info!("bot stopped cleanly");
                return Ok(());
            }
            Err(e) => {
                crashes += 1;
                if crashes > MAX_RESTARTS {
                    error!("giving up after {MAX_RESTARTS} consecutive crashes");
                    return Err(e);
                }
                let delay = restart_delay(crashes);
                error!(
                    "serving loop crashed (attempt {crashes}/{MAX_RESTARTS}): {e:#}; \
                     restarting in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_delay_doubles_then_caps() {
        assert_eq!(restart_delay(1), Duration::from_secs(1));
        assert_eq!(restart_delay(2), Duration::from_secs(2));
        assert_eq!(restart_delay(3), Duration::from_secs(4));
        assert_eq!(restart_delay(7), Duration::from_secs(60));
        assert_eq!(restart_delay(u32::MAX), Duration::from_secs(60));
    }
}
