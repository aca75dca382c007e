//! Plain-text status lines posted to the text channel.

use crate::{audio::queue::QueueItem, error::PlaybackError};

pub fn now_playing(title: &str) -> String {
    format!("🎵 Now playing: **{}**", title)
}

pub fn queue_drained(prefix: &str) -> String {
    format!("✅ Queue is empty! Use `{}play <song>` to add music", prefix)
}

pub fn playlist_added(title: Option<&str>, songs: usize) -> String {
    format!(
        "📝 Adding playlist: **{}** ({} songs)",
        title.unwrap_or("Playlist"),
        songs
    )
}

/// One notice per failed queue entry.
pub fn playback_failed(error: &PlaybackError) -> String {
    match error {
        PlaybackError::InvalidStream(_) => {
            "❌ Error: got webpage URL instead of direct stream".to_string()
        }
        PlaybackError::TransportNotConnected => not_connected_to_voice().to_string(),
        other => format!("❌ Playback error: {}", other),
    }
}

pub fn track_errored(reason: &str) -> String {
    format!("❌ Playback error: {}", reason)
}

pub fn not_connected_to_voice() -> &'static str {
    "❌ Bot not connected to voice channel!"
}

pub fn not_connected() -> &'static str {
    "❌ Bot not connected!"
}

pub fn join_voice_first() -> &'static str {
    "❌ Join a voice channel first!"
}

pub fn join_voice_to_play() -> &'static str {
    "❌ Join a voice channel to play music!"
}

pub fn nothing_playing() -> &'static str {
    "❌ Nothing is playing!"
}

pub fn not_paused() -> &'static str {
    "❌ Playback not paused!"
}

pub fn paused() -> &'static str {
    "⏸️ Paused"
}

pub fn resumed() -> &'static str {
    "▶️ Resumed"
}

pub fn skipped() -> &'static str {
    "⏭️ Skipped!"
}

pub fn stopped() -> &'static str {
    "⏹️ Stopped and queue cleared!"
}

pub fn disconnected() -> &'static str {
    "👋 Disconnected"
}

pub fn loop_toggled(enabled: bool) -> &'static str {
    if enabled {
        "🔁 Loop enabled!"
    } else {
        "➡️ Loop disabled!"
    }
}

pub fn searching(query: &str) -> String {
    format!("🔍 Searching: **{}**...", query)
}

pub fn catalog_track_detected() -> &'static str {
    "🎧 Spotify link detected, converting to YouTube..."
}

pub fn catalog_album_detected() -> &'static str {
    "💿 Spotify album detected, loading tracks..."
}

pub fn catalog_playlist_detected() -> &'static str {
    "📜 Spotify playlist detected, loading tracks..."
}

/// Reply to a successful enqueue.
///
/// Nothing is said about position when the item starts right away; the
/// engine announces it once it is playing.
pub fn added(items: &[QueueItem], pending: usize, started: bool) -> String {
    match items {
        [single] if started => format!("✅ Added to queue: **{}**", single),
        [single] => format!("✅ Added to queue: **{}** (position {})", single, pending),
        many => format!("✅ Added **{}** tracks to queue!", many.len()),
    }
}

pub fn catalog_failed(error: &PlaybackError) -> String {
    match error {
        PlaybackError::Unsupported(reason) => format!(
            "⚠️ **{}.**\n\n💡 But you can:\n• Use Spotify **albums** (they work!)\n• Add individual **tracks** from Spotify\n• Use YouTube playlists",
            reason
        ),
        PlaybackError::NotFound(_) => "❌ Failed to get info from Spotify!".to_string(),
        other => format!("❌ Error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failure_notices() {
        assert_eq!(
            playback_failed(&PlaybackError::Timeout(30)),
            "❌ Playback error: Timed out after 30s while resolving the stream"
        );
        assert_eq!(
            playback_failed(&PlaybackError::InvalidStream("watch page".into())),
            "❌ Error: got webpage URL instead of direct stream"
        );
    }

    #[test]
    fn test_added_wording() {
        let one = vec![QueueItem::Search("daft punk".to_string())];
        assert_eq!(added(&one, 0, true), "✅ Added to queue: **daft punk**");
        assert_eq!(added(&one, 3, false), "✅ Added to queue: **daft punk** (position 3)");

        let many = vec![one[0].clone(), one[0].clone()];
        assert_eq!(added(&many, 2, false), "✅ Added **2** tracks to queue!");
    }

    #[test]
    fn test_unsupported_catalog_link_explains_alternatives() {
        let message = catalog_failed(&PlaybackError::Unsupported(
            "Spotify playlists are not supported due to API limitations".to_string(),
        ));
        assert!(message.starts_with("⚠️ **Spotify playlists are not supported"));
        assert!(message.contains("albums"));
    }

    #[test]
    fn test_drained_mentions_prefix() {
        assert_eq!(
            queue_drained("?"),
            "✅ Queue is empty! Use `?play <song>` to add music"
        );
    }
}
