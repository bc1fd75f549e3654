use std::time::Duration;

use tracing::{info, warn};
use url::Url;

const ROUND_INTERVAL: Duration = Duration::from_secs(240);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BETWEEN_TARGETS: Duration = Duration::from_secs(10);

/// URLs hit on each keep-alive round: the base URL itself plus its /ping
/// route.
fn ping_targets(base: &Url) -> Vec<Url> {
    let mut targets = vec![base.clone()];
    if let Ok(ping) = base.join("ping") {
        targets.push(ping);
    }
    targets
}

/// Periodically pings our own public URL so the hosting platform's idle
/// shutdown never fires. Pure background noise: failures are logged and
/// the next round proceeds regardless.
pub async fn run(base: Url) {
    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("keep-alive disabled, could not build HTTP client: {e}");
            return;
        }
    };

    let targets = ping_targets(&base);
    info!(%base, "keep-alive pinger started");

    let mut round = tokio::time::interval(ROUND_INTERVAL);
    loop {
        round.tick().await;
        for target in &targets {
            match client.get(target.clone()).send().await {
                Ok(response) => info!(url = %target, status = %response.status(), "pinged"),
                Err(e) => warn!(url = %target, "ping failed: {e}"),
            }
            tokio::time::sleep(BETWEEN_TARGETS).await;
        }
    }
}
