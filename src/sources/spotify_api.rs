use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64_ENGINE, Engine};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::PlaybackError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
const OEMBED_URL: &str = "https://open.spotify.com/oembed";

/// Bearer token as issued by the accounts service.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogArtist {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackPage {
    #[serde(default)]
    pub items: Vec<CatalogTrack>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogAlbum {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
    #[serde(default)]
    pub tracks: TrackPage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<CatalogTrack>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedPlaylist {
    #[serde(default)]
    tracks: PlaylistPage,
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    #[serde(default)]
    title: String,
}

/// HTTP surface of the music catalog.
///
/// Kept behind a trait so the resolver logic can be exercised without the
/// network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Client-credentials exchange.
    async fn request_token(&self) -> Result<IssuedToken, PlaybackError>;

    async fn track(&self, token: &str, id: &str) -> Result<CatalogTrack, PlaybackError>;

    /// Album with the first page of its tracks embedded.
    async fn album(&self, token: &str, id: &str) -> Result<CatalogAlbum, PlaybackError>;

    /// One page of playlist tracks. A missing playlist is `NotFound`.
    async fn playlist_page(
        &self,
        token: &str,
        id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<PlaylistPage, PlaybackError>;

    /// Playlist tracks through the embedded-fields query.
    async fn playlist_embedded(&self, token: &str, id: &str) -> Result<PlaylistPage, PlaybackError>;

    /// Unauthenticated title lookup for a track page URL.
    async fn oembed_title(&self, track_url: &str) -> Result<Option<String>, PlaybackError>;

    /// Follows a short link and returns the final URL.
    async fn expand_short_link(&self, url: &str) -> Result<String, PlaybackError>;
}

/// [`CatalogApi`] over the public Spotify endpoints.
pub struct HttpCatalogApi {
    client: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl HttpCatalogApi {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Result<Self, PlaybackError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            client,
            client_id,
            client_secret,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        token: &str,
        what: &str,
    ) -> Result<T, PlaybackError> {
        debug!("🌐 GET {}", url);
        let response = self.client.get(url).bearer_auth(token).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(PlaybackError::NotFound(what.to_string()));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(PlaybackError::Auth(format!("{} rejected the token", what)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("❌ Spotify API devolvió {}: {}", status, crate::sources::truncate(&body, 200));
            return Err(PlaybackError::NotFound(format!("{} (HTTP {})", what, status)));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogApi {
    async fn request_token(&self) -> Result<IssuedToken, PlaybackError> {
        let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) else {
            return Err(PlaybackError::Auth("Spotify API credentials not configured".to_string()));
        };

        let credentials = B64_ENGINE.encode(format!("{}:{}", id, secret));
        let response = self
            .client
            .post(TOKEN_URL)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaybackError::Auth(format!("token endpoint returned {}", status)));
        }

        Ok(response.json::<IssuedToken>().await?)
    }

    async fn track(&self, token: &str, id: &str) -> Result<CatalogTrack, PlaybackError> {
        self.get_json(&format!("{}/tracks/{}", API_BASE, id), token, "track")
            .await
    }

    async fn album(&self, token: &str, id: &str) -> Result<CatalogAlbum, PlaybackError> {
        self.get_json(&format!("{}/albums/{}", API_BASE, id), token, "album")
            .await
    }

    async fn playlist_page(
        &self,
        token: &str,
        id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<PlaylistPage, PlaybackError> {
        let url = format!(
            "{}/playlists/{}/tracks?offset={}&limit={}",
            API_BASE, id, offset, limit
        );
        self.get_json(&url, token, "playlist").await
    }

    async fn playlist_embedded(&self, token: &str, id: &str) -> Result<PlaylistPage, PlaybackError> {
        let url = format!(
            "{}/playlists/{}?fields={}",
            API_BASE,
            id,
            urlencoding::encode("tracks.items(track(name,artists(name)))")
        );
        let embedded: EmbeddedPlaylist = self.get_json(&url, token, "playlist").await?;
        Ok(embedded.tracks)
    }

    async fn oembed_title(&self, track_url: &str) -> Result<Option<String>, PlaybackError> {
        let url = format!("{}?url={}", OEMBED_URL, urlencoding::encode(track_url));
        debug!("🌐 Solicitando oembed: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let oembed = response.json::<OEmbed>().await?;
        Ok(Some(oembed.title).filter(|title| !title.trim().is_empty()))
    }

    async fn expand_short_link(&self, url: &str) -> Result<String, PlaybackError> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        Ok(response.url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_defaults_ttl() {
        let token: IssuedToken = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn test_album_parses_embedded_tracks() {
        let json = r#"{
            "name": "Discovery",
            "artists": [{"name": "Daft Punk"}],
            "tracks": {"items": [
                {"name": "One More Time", "artists": [{"name": "Daft Punk"}]},
                {"name": "Aerodynamic"}
            ]}
        }"#;
        let album: CatalogAlbum = serde_json::from_str(json).unwrap();
        assert_eq!(album.tracks.items.len(), 2);
        assert!(album.tracks.items[1].artists.is_empty());
    }

    #[test]
    fn test_playlist_page_tolerates_null_tracks() {
        let json = r#"{"items": [{"track": null}, {"track": {"name": "A", "artists": []}}]}"#;
        let page: PlaylistPage = serde_json::from_str(json).unwrap();
        assert!(page.items[0].track.is_none());
        assert_eq!(page.items[1].track.as_ref().unwrap().name, "A");
    }

    #[tokio::test]
    async fn test_token_request_without_credentials_is_auth_error() {
        let api = HttpCatalogApi::new(None, None).unwrap();
        assert!(matches!(
            api.request_token().await,
            Err(PlaybackError::Auth(_))
        ));
    }
}
