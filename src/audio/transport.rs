use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use serenity::all::{ChannelId, GuildId};
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    audio::player::{CompletionHandle, TrackOutcome},
    error::PlaybackError,
    sources::ResolvedStream,
};

/// Voice connection of one guild.
///
/// Only the guild's playback engine starts, stops or pauses tracks; the
/// command layer uses it to join, move and leave.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, channel: ChannelId) -> Result<(), PlaybackError>;

    async fn move_to(&self, channel: ChannelId) -> Result<(), PlaybackError>;

    async fn current_channel(&self) -> Option<ChannelId>;

    /// Starts `stream`, replacing any track that is still active. The
    /// completion handle fires exactly once when the track ends or fails.
    async fn play(&self, stream: &ResolvedStream, completion: CompletionHandle) -> Result<(), PlaybackError>;

    async fn pause(&self) -> Result<(), PlaybackError>;

    async fn resume(&self) -> Result<(), PlaybackError>;

    /// Stops the active track, firing its completion.
    async fn stop(&self);

    async fn disconnect(&self) -> Result<(), PlaybackError>;

    async fn is_connected(&self) -> bool;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;
}

/// [`VoiceTransport`] over a songbird call.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, http: reqwest::Client) -> Self {
        Self {
            manager,
            guild_id,
            http,
            current: Mutex::new(None),
        }
    }

    fn call(&self) -> Option<Arc<tokio::sync::Mutex<Call>>> {
        self.manager.get(self.guild_id)
    }

    fn track(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.track()?;
        track.get_info().await.ok().map(|state| state.playing)
    }

    async fn join(&self, channel: ChannelId) -> Result<(), PlaybackError> {
        self.manager
            .join(self.guild_id, channel)
            .await
            .map_err(|e| PlaybackError::Transport(format!("could not join voice channel: {}", e)))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel, self.guild_id);
        Ok(())
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, channel: ChannelId) -> Result<(), PlaybackError> {
        self.join(channel).await
    }

    async fn move_to(&self, channel: ChannelId) -> Result<(), PlaybackError> {
        // Joining again on an existing call moves it
        self.join(channel).await
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        let call = self.call()?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }

    async fn play(&self, stream: &ResolvedStream, completion: CompletionHandle) -> Result<(), PlaybackError> {
        let call = self.call().ok_or(PlaybackError::TransportNotConnected)?;

        let input = HttpRequest::new_with_headers(
            self.http.clone(),
            stream.stream_url.clone(),
            request_headers(stream),
        );

        let track = {
            let mut call = call.lock().await;
            if call.current_connection().is_none() {
                return Err(PlaybackError::TransportNotConnected);
            }
            // One track per guild
            call.stop();
            call.play_input(input.into())
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(
                    Event::Track(event),
                    TrackCompletion {
                        completion: completion.clone(),
                    },
                )
                .map_err(|e| PlaybackError::Transport(format!("could not watch track: {}", e)))?;
        }

        debug!(
            "▶️ Track iniciado en guild {} (gen {})",
            self.guild_id,
            completion.generation()
        );
        *self.current.lock() = Some(track);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        let track = self.track().ok_or(PlaybackError::TransportNotConnected)?;
        track
            .pause()
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;
        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        let track = self.track().ok_or(PlaybackError::TransportNotConnected)?;
        track
            .play()
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;
        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    async fn stop(&self) {
        let track = self.current.lock().take();
        if let Some(track) = track {
            // The track may already be gone; its completion has fired then
            let _ = track.stop();
        }
    }

    async fn disconnect(&self) -> Result<(), PlaybackError> {
        self.stop().await;
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match self.call() {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }
}

/// Headers for fetching a resolved stream.
///
/// CDNs behind the big providers refuse requests without a page referer, so
/// one derived from the source page is added when the extractor gave none.
fn request_headers(stream: &ResolvedStream) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in &stream.transport_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("⚠️ Header ignorado: {}", name),
        }
    }

    if !headers.contains_key(REFERER) {
        let origin = Url::parse(&stream.source_url)
            .ok()
            .and_then(|url| url.host_str().map(|host| format!("{}://{}/", url.scheme(), host)));
        if let Some(value) = origin.and_then(|origin| HeaderValue::from_str(&origin).ok()) {
            headers.insert(REFERER, value);
        }
    }

    headers
}

/// Forwards the end of a track to the guild's engine.
struct TrackCompletion {
    completion: CompletionHandle,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletion {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(TrackOutcome::Failed(format!("{:?}", e))),
                    _ => None,
                })
                .unwrap_or(TrackOutcome::Finished),
            _ => TrackOutcome::Finished,
        };

        debug!("🏁 Track terminado ({:?})", outcome);
        self.completion.finished(outcome);

        Some(Event::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn stream(headers: &[(&str, &str)]) -> ResolvedStream {
        ResolvedStream {
            stream_url: "https://rr1---sn-x.googlevideo.com/videoplayback".to_string(),
            title: "Song".to_string(),
            source_url: "https://www.youtube.com/watch?v=abc".to_string(),
            transport_headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_referer_derived_from_source_page() {
        let headers = request_headers(&stream(&[("User-Agent", "Mozilla/5.0")]));
        assert_eq!(headers.get(REFERER).unwrap(), "https://www.youtube.com/");
        assert_eq!(headers.get("user-agent").unwrap(), "Mozilla/5.0");
    }

    #[test]
    fn test_extractor_referer_is_kept() {
        let headers = request_headers(&stream(&[("Referer", "https://music.example/")]));
        assert_eq!(headers.get(REFERER).unwrap(), "https://music.example/");
    }

    #[test]
    fn test_invalid_headers_are_skipped() {
        let headers = request_headers(&stream(&[("Bad Header", "x"), ("Accept", "*/*")]));
        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key("accept"));
    }
}
