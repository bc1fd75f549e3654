use anyhow::{bail, Context, Result};
use teloxide::types::ChatId;
use url::Url;

/// Process-wide configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot access token.
    pub bot_token: String,
    /// Private channel the relay forwards messages out of.
    pub private_channel_id: ChatId,
    /// Public channel shown to users and linked from the welcome keyboard.
    pub public_channel: Url,
    /// Externally reachable callback URL; presence selects webhook mode.
    pub webhook_url: Option<Url>,
    /// Base URL the keep-alive pinger hits to defeat idle shutdown.
    pub keep_alive_url: Option<Url>,
    /// HTTP listen port for the liveness/webhook server.
    pub port: u16,
}

const DEFAULT_PORT: u16 = 8000;

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup. Factored out so
    /// tests never have to mutate the real process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing: Vec<&str> = Vec::new();
        let mut require = |name: &'static str| -> Option<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Some(value),
                // Present-but-empty counts as missing.
                _ => {
                    missing.push(name);
                    None
                }
            }
        };

        let bot_token = require("BOT_TOKEN");
        let private_channel_id = require("PRIVATE_CHANNEL_ID");
        let public_channel = require("PUBLIC_CHANNEL");

        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        let private_channel_id = private_channel_id
            .unwrap()
            .trim()
            .parse::<i64>()
            .map(ChatId)
            .context("PRIVATE_CHANNEL_ID must be a numeric chat identifier")?;

        let public_channel = Url::parse(public_channel.unwrap().trim())
            .context("PUBLIC_CHANNEL must be a valid URL")?;

        let webhook_url = match lookup("WEBHOOK_URL") {
            Some(raw) if !raw.trim().is_empty() => {
                Some(Url::parse(raw.trim()).context("WEBHOOK_URL must be a valid URL")?)
            }
            _ => None,
        };

        let keep_alive_url = match lookup("KEEP_ALIVE_URL") {
            Some(raw) if !raw.trim().is_empty() => {
                Some(Url::parse(raw.trim()).context("KEEP_ALIVE_URL must be a valid URL")?)
            }
            _ => None,
        };

        let port = match lookup("PORT") {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<u16>()
                .context("PORT must be a TCP port number")?,
            _ => DEFAULT_PORT,
        };

        Ok(Config {
            bot_token: bot_token.unwrap(),
            private_channel_id,
            public_channel,
            webhook_url,
            keep_alive_url,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config> {
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    fn minimal() -> HashMap<String, String> {
        env(&[
            ("BOT_TOKEN", "123456:test-token"),
            ("PRIVATE_CHANNEL_ID", "-1001234567890"),
            ("PUBLIC_CHANNEL", "https://t.me/mychannel"),
        ])
    }

    #[test]
    fn loads_minimal_polling_config() {
        let config = load(&minimal()).unwrap();
        assert_eq!(config.bot_token, "123456:test-token");
        assert_eq!(config.private_channel_id, ChatId(-1001234567890));
        assert_eq!(config.public_channel.as_str(), "https://t.me/mychannel");
        assert!(config.webhook_url.is_none());
        assert!(config.keep_alive_url.is_none());
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn lists_every_missing_variable_in_one_error() {
        let err = load(&env(&[])).unwrap_err().to_string();
        assert!(err.contains("BOT_TOKEN"));
        assert!(err.contains("PRIVATE_CHANNEL_ID"));
        assert!(err.contains("PUBLIC_CHANNEL"));
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let mut vars = minimal();
        vars.insert("BOT_TOKEN".into(), "   ".into());
        let err = load(&vars).unwrap_err().to_string();
        assert!(err.contains("BOT_TOKEN"));
        assert!(!err.contains("PRIVATE_CHANNEL_ID"));
    }

    #[test]
    fn rejects_non_numeric_channel_id() {
        let mut vars = minimal();
        vars.insert("PRIVATE_CHANNEL_ID".into(), "@mychannel".into());
        let err = load(&vars).unwrap_err().to_string();
        assert!(err.contains("PRIVATE_CHANNEL_ID"));
    }

    #[test]
    fn parses_optional_webhook_and_port() {
        let mut vars = minimal();
        vars.insert(
            "WEBHOOK_URL".into(),
            "https://bot.example.com/webhook".into(),
        );
        vars.insert("PORT".into(), "9090".into());
        let config = load(&vars).unwrap();
        assert_eq!(
            config.webhook_url.unwrap().as_str(),
            "https://bot.example.com/webhook"
        );
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn rejects_invalid_public_channel_url() {
        let mut vars = minimal();
        vars.insert("PUBLIC_CHANNEL".into(), "not a url".into());
        assert!(load(&vars).is_err());
    }
}
