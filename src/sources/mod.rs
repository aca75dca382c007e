//! # Sources Module
//!
//! Everything that turns what a user typed into something the voice driver
//! can stream:
//!
//! - [`links`] recognises YouTube and Spotify links in free text
//! - [`spotify`] converts Spotify tracks/albums into search terms
//! - [`ytdlp`] asks yt-dlp for a direct media URL (or playlist entries)
//! - [`resolver`] bounds and times out resolutions

pub mod links;
pub mod resolver;
pub mod spotify;
pub mod spotify_api;
pub mod ytdlp;

use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

use crate::{audio::queue::QueueItem, error::PlaybackError};

pub use resolver::ResolverPool;
pub use spotify::SpotifyResolver;
pub use ytdlp::YtDlpResolver;

/// Hosts that serve provider web pages, never media bytes.
const WEBPAGE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
    "soundcloud.com",
    "www.soundcloud.com",
    "open.spotify.com",
];

/// A playable stream produced by a resolver, used once per play attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    /// Direct media locator (CDN), never a web page
    pub stream_url: String,
    pub title: String,
    /// Page the stream was extracted from, kept for diagnostics
    pub source_url: String,
    /// Headers the transport must send when fetching `stream_url`
    pub transport_headers: HashMap<String, String>,
}

/// A multi-entry result: the first playable entry plus the rest to enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntries {
    pub title: Option<String>,
    pub first: ResolvedStream,
    pub remainder: Vec<QueueItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Stream(ResolvedStream),
    Playlist(PlaylistEntries),
}

impl Resolution {
    pub fn stream(&self) -> &ResolvedStream {
        match self {
            Resolution::Stream(stream) => stream,
            Resolution::Playlist(entries) => &entries.first,
        }
    }
}

/// Turns a URL or search term into a playable stream.
///
/// Implementations may block on network or subprocess work; callers are
/// expected to run them through a [`ResolverPool`].
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, reference: &str, is_search: bool) -> Result<Resolution, PlaybackError>;
}

/// Rejects locators that point at a provider web page instead of media.
pub fn validate_stream(stream: &ResolvedStream) -> Result<(), PlaybackError> {
    if !stream.stream_url.starts_with("http") {
        return Err(PlaybackError::InvalidStream(format!(
            "not an HTTP locator: {}",
            truncate(&stream.stream_url, 80)
        )));
    }

    let parsed = Url::parse(&stream.stream_url)
        .map_err(|e| PlaybackError::InvalidStream(format!("unparseable stream URL: {}", e)))?;
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();

    if WEBPAGE_HOSTS.contains(&host.as_str()) || parsed.path().starts_with("/watch") {
        return Err(PlaybackError::InvalidStream(
            "got webpage URL instead of direct stream".to_string(),
        ));
    }

    Ok(())
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(url: &str) -> ResolvedStream {
        ResolvedStream {
            stream_url: url.to_string(),
            title: "Song".to_string(),
            source_url: "https://www.youtube.com/watch?v=abc".to_string(),
            transport_headers: HashMap::new(),
        }
    }

    #[test]
    fn test_accepts_cdn_locator() {
        let cdn = stream("https://rr3---sn-abc.googlevideo.com/videoplayback?expire=1&itag=251");
        assert!(validate_stream(&cdn).is_ok());
    }

    #[test]
    fn test_rejects_watch_page() {
        let page = stream("https://www.youtube.com/watch?v=abc");
        assert!(matches!(
            validate_stream(&page),
            Err(PlaybackError::InvalidStream(_))
        ));
    }

    #[test]
    fn test_rejects_short_link_page() {
        let page = stream("https://youtu.be/abc");
        assert!(matches!(
            validate_stream(&page),
            Err(PlaybackError::InvalidStream(_))
        ));
    }

    #[test]
    fn test_rejects_non_http() {
        assert!(matches!(
            validate_stream(&stream("rtmp://example.com/live")),
            Err(PlaybackError::InvalidStream(_))
        ));
        assert!(matches!(
            validate_stream(&stream("")),
            Err(PlaybackError::InvalidStream(_))
        ));
    }

    #[test]
    fn test_accepts_direct_file_on_same_host() {
        let mut direct = stream("https://files.example.com/song.mp3");
        direct.source_url = direct.stream_url.clone();
        assert!(validate_stream(&direct).is_ok());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("canción", 6), "canció");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
