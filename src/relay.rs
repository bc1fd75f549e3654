use teloxide::prelude::*;
use teloxide::types::MessageId;
use thiserror::Error;
use tracing::info;

/// A candidate message identifier extracted from free-text input.
///
/// Only non-empty, all-ASCII-digit text qualifies; everything else is the
/// dispatcher's fallback path, not a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    raw: String,
}

impl LookupRequest {
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(LookupRequest {
            raw: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Telegram message ids are 32-bit; digit strings past that range can
    /// never name a real message.
    fn message_id(&self) -> Result<MessageId, RelayError> {
        self.raw
            .parse::<i32>()
            .map(MessageId)
            .map_err(|_| RelayError::IdOutOfRange(self.raw.clone()))
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("identifier {0} is out of message-id range")]
    IdOutOfRange(String),
    #[error("forward request failed: {0}")]
    Transport(#[from] teloxide::RequestError),
}

const CONFIRMATION: &str = "✅ Book sent!";

/// Forward the identified message from the private source channel to the
/// requesting chat, then confirm. The caller owns the failure reply.
pub async fn relay(
    bot: &Bot,
    source_channel: ChatId,
    request: &LookupRequest,
    destination: ChatId,
) -> Result<(), RelayError> {
    let message_id = request.message_id()?;
    bot.forward_message(destination, source_channel, message_id)
        .await?;
    info!(id = request.as_str(), chat = destination.0, "forwarded message");
    bot.send_message(destination, CONFIRMATION).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_digit_only_text() {
        let req = LookupRequest::parse("123").unwrap();
        assert_eq!(req.as_str(), "123");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let req = LookupRequest::parse("  42\n").unwrap();
        assert_eq!(req.as_str(), "42");
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert!(LookupRequest::parse("").is_none());
        assert!(LookupRequest::parse("   ").is_none());
        assert!(LookupRequest::parse("12a").is_none());
        assert!(LookupRequest::parse("abc").is_none());
        assert!(LookupRequest::parse("-5").is_none());
        assert!(LookupRequest::parse("12.3").is_none());
        // Non-ASCII digits do not qualify.
        assert!(LookupRequest::parse("１２３").is_none());
    }

    #[test]
    fn in_range_identifier_parses() {
        let req = LookupRequest::parse("2147483647").unwrap();
        assert_eq!(req.message_id().unwrap(), MessageId(2147483647));
    }

    #[test]
    fn oversized_identifier_is_out_of_range() {
        let req = LookupRequest::parse("99999999999999999999").unwrap();
        assert!(matches!(
            req.message_id(),
            Err(RelayError::IdOutOfRange(_))
        ));
    }
}
