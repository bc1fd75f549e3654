use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MaybeInaccessibleMessage, Message, ParseMode,
    Update, UpdateKind,
};
use tracing::{debug, error};

use crate::config::Config;
use crate::relay::{self, LookupRequest};

pub const TOKEN_GET_STARTED: &str = "get_started";
pub const TOKEN_HELP: &str = "help";

/// What a piece of free text asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextIntent {
    Start,
    Lookup(LookupRequest),
    Fallback,
}

/// Classify message text. Digit-only text is a lookup; everything else
/// that isn't the start command gets the canned help reply.
pub fn classify_text(text: &str) -> TextIntent {
    let trimmed = text.trim();
    if trimmed == "/start" || trimmed.starts_with("/start@") {
        return TextIntent::Start;
    }
    match LookupRequest::parse(trimmed) {
        Some(request) => TextIntent::Lookup(request),
        None => TextIntent::Fallback,
    }
}

/// Body a button press edits its message into. Unknown tokens fall back to
/// the help body, and repeated presses are idempotent.
pub fn button_body(token: &str, public_channel: &str) -> String {
    if token == TOKEN_GET_STARTED {
        format!(
            "📖 How to download:\n\n1. Find book IDs in:\n{public_channel}\n\n2. Send the ID like: <code>123</code>"
        )
    } else {
        format!("ℹ️ Help:\n• Send book ID to download\n• Find IDs in: {public_channel}")
    }
}

/// Routes each inbound update to the matching handler. Constructed once at
/// startup and shared by reference; holds no mutable state.
pub struct Dispatcher {
    bot: Bot,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(bot: Bot, config: Arc<Config>) -> Self {
        Self { bot, config }
    }

    /// Handle one update. Never returns an error to the caller: every
    /// failure is logged here and, where a relay was attempted, already
    /// converted into a user-facing reply further down.
    pub async fn dispatch(&self, update: Update) {
        let update_id = update.id;
        let result = match update.kind {
            UpdateKind::Message(message) => self.handle_message(message).await,
            UpdateKind::CallbackQuery(query) => self.handle_callback(query).await,
            other => {
                debug!(?update_id, "ignoring unsupported update kind: {other:?}");
                Ok(())
            }
        };
        if let Err(e) = result {
            error!(?update_id, "update handler failed: {e:#}");
        }
    }

    async fn handle_message(&self, message: Message) -> Result<()> {
        let chat_id = message.chat.id;
        let Some(text) = message.text() else {
            // Stickers, photos and the like carry no text, so they can
            // never be a valid identifier.
            return self.send_fallback(chat_id).await;
        };

        match classify_text(text) {
            TextIntent::Start => self.send_welcome(chat_id).await,
            TextIntent::Lookup(request) => self.relay_lookup(request, chat_id).await,
            TextIntent::Fallback => self.send_fallback(chat_id).await,
        }
    }

    async fn relay_lookup(&self, request: LookupRequest, chat_id: ChatId) -> Result<()> {
        match relay::relay(
            &self.bot,
            self.config.private_channel_id,
            &request,
            chat_id,
        )
        .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                // Full cause stays server-side; the user only learns where
                // to find a valid identifier.
                error!(id = request.as_str(), chat = chat_id.0, "relay failed: {e}");
                self.bot
                    .send_message(
                        chat_id,
                        format!("❌ Error. Check ID at {}", self.config.public_channel),
                    )
                    .await?;
                Ok(())
            }
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) -> Result<()> {
        self.bot.answer_callback_query(query.id.clone()).await?;

        let Some(MaybeInaccessibleMessage::Regular(message)) = query.message else {
            debug!("callback without an editable message");
            return Ok(());
        };

        let token = query.data.as_deref().unwrap_or_default();
        let body = button_body(token, self.config.public_channel.as_str());
        self.bot
            .edit_message_text(message.chat.id, message.id, body)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn send_welcome(&self, chat_id: ChatId) -> Result<()> {
        let keyboard = InlineKeyboardMarkup::new(vec![
            vec![InlineKeyboardButton::callback(
                "📚 Get Started",
                TOKEN_GET_STARTED,
            )],
            vec![InlineKeyboardButton::callback("ℹ️ Help", TOKEN_HELP)],
            vec![InlineKeyboardButton::url(
                "Join Channel",
                self.config.public_channel.clone(),
            )],
        ]);

        self.bot
            .send_message(
                chat_id,
                format!(
                    "📚 Welcome to Book Bot!\n\nJoin our channel:\n{}\n\nSend a book ID to download.\nExample: 123",
                    self.config.public_channel
                ),
            )
            .reply_markup(keyboard)
            .await?;
        Ok(())
    }

    async fn send_fallback(&self, chat_id: ChatId) -> Result<()> {
        self.bot
            .send_message(
                chat_id,
                format!(
                    "📚 Send a valid book ID\nFind IDs at: {}\nExample: <code>123</code>",
                    self.config.public_channel
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_command_is_recognized() {
        assert_eq!(classify_text("/start"), TextIntent::Start);
        assert_eq!(classify_text(" /start "), TextIntent::Start);
        assert_eq!(classify_text("/start@BookRelayBot"), TextIntent::Start);
    }

    #[test]
    fn digit_only_text_routes_to_lookup() {
        let TextIntent::Lookup(request) = classify_text("123") else {
            panic!("expected a lookup");
        };
        assert_eq!(request.as_str(), "123");
    }

    #[test]
    fn everything_else_routes_to_fallback() {
        assert_eq!(classify_text(""), TextIntent::Fallback);
        assert_eq!(classify_text("12a"), TextIntent::Fallback);
        assert_eq!(classify_text("hello"), TextIntent::Fallback);
        assert_eq!(classify_text("!?#"), TextIntent::Fallback);
        assert_eq!(classify_text("/startle"), TextIntent::Fallback);
    }

    #[test]
    fn get_started_token_selects_onboarding_body() {
        let body = button_body(TOKEN_GET_STARTED, "https://t.me/books");
        assert!(body.contains("How to download"));
        assert!(body.contains("https://t.me/books"));
    }

    #[test]
    fn other_tokens_select_help_body() {
        for token in [TOKEN_HELP, "unknown", ""] {
            let body = button_body(token, "https://t.me/books");
            assert!(body.contains("Help"), "token {token:?}");
        }
    }

    #[test]
    fn repeated_presses_are_idempotent() {
        let first = button_body(TOKEN_GET_STARTED, "https://t.me/books");
        let second = button_body(TOKEN_GET_STARTED, "https://t.me/books");
        assert_eq!(first, second);
    }
}
