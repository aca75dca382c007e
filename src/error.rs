//! Error taxonomy shared by the resolvers and the playback engine.
//!
//! Every variant here is recoverable from the engine's point of view: it is
//! turned into a single status message and playback moves on. Application
//! plumbing (startup, Discord API calls) keeps using `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Catalog credential exchange failed or no credentials are configured
    #[error("Spotify authentication failed: {0}")]
    Auth(String),

    /// Catalog entity missing, empty, or nothing playable found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request understood but refused by policy
    #[error("{0}")]
    Unsupported(String),

    /// Stream resolution exceeded the ceiling
    #[error("Timed out after {0}s while resolving the stream")]
    Timeout(u64),

    /// The resolver produced a webpage or otherwise unplayable locator
    #[error("Invalid stream: {0}")]
    InvalidStream(String),

    #[error("Bot not connected to a voice channel")]
    TransportNotConnected,

    /// yt-dlp failed or produced output we could not read
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The voice driver refused an operation
    #[error("Voice transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Player for this guild is no longer running")]
    PlayerUnavailable,
}

impl PlaybackError {
    /// Errors caused by a single bad queue entry, as opposed to the session.
    pub fn is_item_failure(&self) -> bool {
        !matches!(
            self,
            PlaybackError::TransportNotConnected | PlaybackError::PlayerUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_failures() {
        assert!(PlaybackError::Timeout(30).is_item_failure());
        assert!(PlaybackError::InvalidStream("page".into()).is_item_failure());
        assert!(!PlaybackError::TransportNotConnected.is_item_failure());
        assert!(!PlaybackError::PlayerUnavailable.is_item_failure());
    }

    #[test]
    fn test_timeout_message_mentions_ceiling() {
        assert_eq!(
            PlaybackError::Timeout(30).to_string(),
            "Timed out after 30s while resolving the stream"
        );
    }
}
