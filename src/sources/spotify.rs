//! Spotify catalog resolver.
//!
//! Spotify never streams audio for us: tracks and albums are converted into
//! `"artist1, artist2 - title"` search terms that the search provider can
//! find. Playlists are refused unless explicitly enabled, because the
//! client-credentials tier cannot read most of them.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    links::{classify, LinkKind, MusicLink},
    spotify_api::{CatalogApi, CatalogArtist, CatalogTrack, IssuedToken, PlaylistPage},
};
use crate::error::PlaybackError;

/// Seconds shaved off the advertised token lifetime.
const EXPIRY_MARGIN_SECS: i64 = 60;
const PLAYLIST_PAGE_SIZE: usize = 100;

pub const PLAYLIST_UNSUPPORTED: &str = "Spotify playlists are not supported due to API limitations";

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Single process-wide credential slot.
///
/// The lock is only held to read or replace the slot, never across a network
/// call, so concurrent refreshes simply race and the last writer wins.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.slot
            .lock()
            .as_ref()
            .filter(|cached| now < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    pub fn store(&self, issued: &IssuedToken, now: DateTime<Utc>) -> DateTime<Utc> {
        let expires_at = now + ChronoDuration::seconds(issued.expires_in - EXPIRY_MARGIN_SECS);
        *self.slot.lock() = Some(CachedToken {
            token: issued.access_token.clone(),
            expires_at,
        });
        expires_at
    }
}

pub struct SpotifyResolver {
    api: Arc<dyn CatalogApi>,
    tokens: TokenCache,
    has_credentials: bool,
    playlists_enabled: bool,
}

impl SpotifyResolver {
    pub fn new(api: Arc<dyn CatalogApi>, has_credentials: bool, playlists_enabled: bool) -> Self {
        if !has_credentials {
            warn!("⚠️ Spotify API credentials not configured, usando solo oembed");
        }

        Self {
            api,
            tokens: TokenCache::new(),
            has_credentials,
            playlists_enabled,
        }
    }

    /// Returns the cached token, exchanging credentials when it is missing or expired.
    pub async fn access_token(&self) -> Result<String, PlaybackError> {
        if let Some(token) = self.tokens.valid_at(Utc::now()) {
            return Ok(token);
        }

        if !self.has_credentials {
            return Err(PlaybackError::Auth("Spotify API credentials not configured".to_string()));
        }

        let issued = self.api.request_token().await?;
        self.tokens.store(&issued, Utc::now());
        info!("✅ Token de Spotify obtenido (válido por {} segundos)", issued.expires_in);

        Ok(issued.access_token)
    }

    /// Resolves any catalog link into search terms.
    pub async fn resolve_link(&self, link: &MusicLink) -> Result<Vec<String>, PlaybackError> {
        let link = match (&link.kind, &link.id) {
            (LinkKind::CatalogTrack, None) => self.expand(link).await?,
            _ => link.clone(),
        };

        let id = link
            .id
            .as_deref()
            .ok_or_else(|| PlaybackError::NotFound("could not extract a Spotify ID".to_string()))?;

        match link.kind {
            LinkKind::CatalogTrack => Ok(vec![self.resolve_track(id).await?]),
            LinkKind::CatalogAlbum => self.resolve_album(id).await,
            LinkKind::CatalogPlaylist => self.resolve_playlist(id).await,
            LinkKind::DirectMediaLink => Err(PlaybackError::Unsupported(
                "not a Spotify link".to_string(),
            )),
        }
    }

    async fn expand(&self, link: &MusicLink) -> Result<MusicLink, PlaybackError> {
        let expanded = self.api.expand_short_link(&link.url).await?;
        info!("🔗 Enlace corto expandido: {} -> {}", link.url, expanded);

        classify(&expanded)
            .filter(|resolved| resolved.kind != LinkKind::DirectMediaLink && resolved.id.is_some())
            .ok_or_else(|| PlaybackError::NotFound(format!("short link {} led nowhere", link.url)))
    }

    /// Converts one track into a search term, falling back to oEmbed.
    pub async fn resolve_track(&self, track_id: &str) -> Result<String, PlaybackError> {
        if self.has_credentials {
            match self.track_via_api(track_id).await {
                Ok(term) => {
                    info!("✅ Spotify API: {}", term);
                    return Ok(term);
                }
                Err(e) => warn!("⚠️ Spotify API falló ({}), intentando oembed...", e),
            }
        }

        let track_url = format!("https://open.spotify.com/track/{}", track_id);
        match self.api.oembed_title(&track_url).await {
            Ok(Some(title)) => {
                info!("✅ Spotify (oembed): {}", title);
                Ok(title)
            }
            Ok(None) => Err(PlaybackError::NotFound(format!("Spotify track {}", track_id))),
            Err(e) => {
                warn!("❌ Error de oembed: {}", e);
                Err(PlaybackError::NotFound(format!("Spotify track {}", track_id)))
            }
        }
    }

    async fn track_via_api(&self, track_id: &str) -> Result<String, PlaybackError> {
        let token = self.access_token().await?;
        let track = self.api.track(&token, track_id).await?;

        search_term(&track, &[])
            .or_else(|| Some(track.name.trim().to_string()).filter(|name| !name.is_empty()))
            .ok_or_else(|| PlaybackError::NotFound(format!("Spotify track {}", track_id)))
    }

    /// Converts an album into one search term per usable track.
    pub async fn resolve_album(&self, album_id: &str) -> Result<Vec<String>, PlaybackError> {
        let token = self.access_token().await?;
        let album = self.api.album(&token, album_id).await?;

        let terms: Vec<String> = album
            .tracks
            .items
            .iter()
            .filter_map(|track| search_term(track, &album.artists))
            .collect();

        info!("📝 {} canciones del álbum \"{}\"", terms.len(), album.name);

        if terms.is_empty() {
            return Err(PlaybackError::NotFound(format!("no playable tracks in album {}", album_id)));
        }
        Ok(terms)
    }

    /// Playlists are refused unless the operator enabled them.
    pub async fn resolve_playlist(&self, playlist_id: &str) -> Result<Vec<String>, PlaybackError> {
        if !self.playlists_enabled {
            return Err(PlaybackError::Unsupported(PLAYLIST_UNSUPPORTED.to_string()));
        }

        let token = self.access_token().await?;
        let mut terms = Vec::new();
        let mut offset = 0;

        loop {
            let page = match self
                .api
                .playlist_page(&token, playlist_id, offset, PLAYLIST_PAGE_SIZE)
                .await
            {
                Ok(page) => page,
                Err(PlaybackError::NotFound(_)) if offset == 0 => {
                    info!("🔄 Playlist no encontrada, probando método alternativo...");
                    let embedded = self.api.playlist_embedded(&token, playlist_id).await?;
                    terms.extend(playlist_terms(&embedded));
                    break;
                }
                Err(e) if offset == 0 => return Err(e),
                Err(e) => {
                    warn!("⚠️ Página {} de la playlist falló ({}), usando las ya obtenidas", offset, e);
                    break;
                }
            };

            terms.extend(playlist_terms(&page));

            if page.items.len() < PLAYLIST_PAGE_SIZE {
                break;
            }
            offset += PLAYLIST_PAGE_SIZE;
        }

        info!("📝 {} canciones de la playlist", terms.len());

        if terms.is_empty() {
            return Err(PlaybackError::NotFound(format!("no playable tracks in playlist {}", playlist_id)));
        }
        Ok(terms)
    }
}

fn playlist_terms(page: &PlaylistPage) -> impl Iterator<Item = String> + '_ {
    page.items
        .iter()
        .filter_map(|item| item.track.as_ref())
        .filter_map(|track| search_term(track, &[]))
}

/// `"artist1, artist2 - title"`, using `fallback_artists` when the track has none.
fn search_term(track: &CatalogTrack, fallback_artists: &[CatalogArtist]) -> Option<String> {
    let name = track.name.trim();
    if name.is_empty() {
        return None;
    }

    let names = |artists: &[CatalogArtist]| -> Vec<String> {
        artists
            .iter()
            .map(|artist| artist.name.trim().to_string())
            .filter(|artist| !artist.is_empty())
            .collect()
    };

    let mut artists = names(&track.artists);
    if artists.is_empty() {
        artists = names(fallback_artists);
    }
    if artists.is_empty() {
        return None;
    }

    Some(format!("{} - {}", artists.join(", "), name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::spotify_api::{CatalogAlbum, MockCatalogApi, PlaylistItem, TrackPage};
    use pretty_assertions::assert_eq;

    fn artist(name: &str) -> CatalogArtist {
        CatalogArtist { name: name.to_string() }
    }

    fn track(name: &str, artists: &[&str]) -> CatalogTrack {
        CatalogTrack {
            name: name.to_string(),
            artists: artists.iter().map(|a| artist(a)).collect(),
        }
    }

    fn issued(token: &str, expires_in: i64) -> IssuedToken {
        IssuedToken {
            access_token: token.to_string(),
            expires_in,
        }
    }

    fn resolver(api: MockCatalogApi, credentials: bool) -> SpotifyResolver {
        SpotifyResolver::new(Arc::new(api), credentials, false)
    }

    #[tokio::test]
    async fn test_token_is_cached_within_ttl() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .times(1)
            .returning(|| Ok(issued("tok", 3600)));

        let spotify = resolver(api, true);
        assert_eq!(spotify.access_token().await.unwrap(), "tok");
        assert_eq!(spotify.access_token().await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn test_token_inside_safety_margin_is_refreshed() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .times(2)
            .returning(|| Ok(issued("short", 30)));

        let spotify = resolver(api, true);
        spotify.access_token().await.unwrap();
        spotify.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_exchange_is_not_cached() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .times(2)
            .returning(|| Err(PlaybackError::Auth("token endpoint returned 400".to_string())));

        let spotify = resolver(api, true);
        assert!(matches!(spotify.access_token().await, Err(PlaybackError::Auth(_))));
        assert!(matches!(spotify.access_token().await, Err(PlaybackError::Auth(_))));
    }

    #[test]
    fn test_token_cache_expiry_margin() {
        let cache = TokenCache::new();
        let now = Utc::now();
        let expires_at = cache.store(&issued("tok", 3600), now);

        assert_eq!(expires_at, now + ChronoDuration::seconds(3540));
        assert_eq!(cache.valid_at(now).as_deref(), Some("tok"));
        assert!(cache.valid_at(expires_at).is_none());
    }

    #[tokio::test]
    async fn test_track_via_api() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_track()
            .withf(|token, id| token == "tok" && id == "t1")
            .returning(|_, _| Ok(track("Get Lucky", &["Daft Punk", "Pharrell Williams"])));
        api.expect_oembed_title().never();

        let spotify = resolver(api, true);
        assert_eq!(
            spotify.resolve_track("t1").await.unwrap(),
            "Daft Punk, Pharrell Williams - Get Lucky"
        );
    }

    #[tokio::test]
    async fn test_track_falls_back_to_oembed_when_api_unreachable() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Err(PlaybackError::Auth("connection refused".to_string())));
        api.expect_oembed_title()
            .withf(|url| url == "https://open.spotify.com/track/t1")
            .returning(|_| Ok(Some("Get Lucky".to_string())));

        let spotify = resolver(api, true);
        assert_eq!(spotify.resolve_track("t1").await.unwrap(), "Get Lucky");
    }

    #[tokio::test]
    async fn test_track_without_credentials_uses_oembed_only() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token().never();
        api.expect_track().never();
        api.expect_oembed_title()
            .returning(|_| Ok(Some("Harder, Better, Faster, Stronger".to_string())));

        let spotify = resolver(api, false);
        assert_eq!(
            spotify.resolve_track("t2").await.unwrap(),
            "Harder, Better, Faster, Stronger"
        );
    }

    #[tokio::test]
    async fn test_track_not_found_when_both_paths_fail() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_track()
            .returning(|_, _| Err(PlaybackError::NotFound("track".to_string())));
        api.expect_oembed_title().returning(|_| Ok(None));

        let spotify = resolver(api, true);
        assert!(matches!(
            spotify.resolve_track("gone").await,
            Err(PlaybackError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_album_tracks_fall_back_to_album_artists() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_album().returning(|_, _| {
            Ok(CatalogAlbum {
                name: "Random Access Memories".to_string(),
                artists: vec![artist("Daft Punk")],
                tracks: TrackPage {
                    items: vec![track("Give Life Back to Music", &[]), track("Contact", &["Daft Punk"])],
                },
            })
        });

        let spotify = resolver(api, true);
        assert_eq!(
            spotify.resolve_album("ram").await.unwrap(),
            vec![
                "Daft Punk - Give Life Back to Music".to_string(),
                "Daft Punk - Contact".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_album_without_usable_tracks_is_not_found() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_album().returning(|_, _| {
            Ok(CatalogAlbum {
                name: "Empty".to_string(),
                artists: vec![],
                tracks: TrackPage {
                    items: vec![track("", &["Someone"]), track("No Artist", &[])],
                },
            })
        });

        let spotify = resolver(api, true);
        assert!(matches!(
            spotify.resolve_album("empty").await,
            Err(PlaybackError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_playlist_unsupported_without_network() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token().never();
        api.expect_playlist_page().never();

        let spotify = resolver(api, true);
        let link = classify("https://open.spotify.com/playlist/abc").unwrap();
        assert!(matches!(
            spotify.resolve_link(&link).await,
            Err(PlaybackError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_enabled_playlist_paginates() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_playlist_page()
            .withf(|_, _, offset, _| *offset == 0)
            .returning(|_, _, _, limit| {
                Ok(PlaylistPage {
                    items: (0..limit)
                        .map(|i| PlaylistItem {
                            track: Some(track(&format!("Song {}", i), &["Band"])),
                        })
                        .collect(),
                })
            });
        api.expect_playlist_page()
            .withf(|_, _, offset, _| *offset == 100)
            .returning(|_, _, _, _| {
                Ok(PlaylistPage {
                    items: vec![PlaylistItem { track: None }, PlaylistItem {
                        track: Some(track("Last", &["Band"])),
                    }],
                })
            });

        let spotify = SpotifyResolver::new(Arc::new(api), true, true);
        let terms = spotify.resolve_playlist("big").await.unwrap();
        assert_eq!(terms.len(), 101);
        assert_eq!(terms.last().map(String::as_str), Some("Band - Last"));
    }

    #[tokio::test]
    async fn test_enabled_playlist_uses_embedded_fallback_on_404() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_playlist_page()
            .returning(|_, _, _, _| Err(PlaybackError::NotFound("playlist".to_string())));
        api.expect_playlist_embedded().times(1).returning(|_, _| {
            Ok(PlaylistPage {
                items: vec![PlaylistItem {
                    track: Some(track("Solo", &["Artist"])),
                }],
            })
        });

        let spotify = SpotifyResolver::new(Arc::new(api), true, true);
        assert_eq!(
            spotify.resolve_playlist("odd").await.unwrap(),
            vec!["Artist - Solo".to_string()]
        );
    }

    fn full_page(prefix: &str) -> PlaylistPage {
        PlaylistPage {
            items: (0..PLAYLIST_PAGE_SIZE)
                .map(|i| PlaylistItem {
                    track: Some(track(&format!("{} {}", prefix, i), &["Band"])),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_full_embedded_fallback_page_is_kept() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_playlist_page()
            .times(1)
            .returning(|_, _, _, _| Err(PlaybackError::NotFound("playlist".to_string())));
        api.expect_playlist_embedded()
            .times(1)
            .returning(|_, _| Ok(full_page("Embedded")));

        let spotify = SpotifyResolver::new(Arc::new(api), true, true);
        let terms = spotify.resolve_playlist("odd").await.unwrap();
        assert_eq!(terms.len(), PLAYLIST_PAGE_SIZE);
        assert_eq!(terms[0], "Band - Embedded 0");
    }

    #[tokio::test]
    async fn test_failing_later_page_keeps_collected_tracks() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_playlist_page()
            .withf(|_, _, offset, _| *offset == 0)
            .returning(|_, _, _, _| Ok(full_page("Song")));
        api.expect_playlist_page()
            .withf(|_, _, offset, _| *offset == 100)
            .returning(|_, _, _, _| Err(PlaybackError::Extraction("HTTP 500".to_string())));
        api.expect_playlist_embedded().never();

        let spotify = SpotifyResolver::new(Arc::new(api), true, true);
        let terms = spotify.resolve_playlist("big").await.unwrap();
        assert_eq!(terms.len(), PLAYLIST_PAGE_SIZE);
        assert_eq!(terms.last().map(String::as_str), Some("Band - Song 99"));
    }

    #[tokio::test]
    async fn test_failing_first_page_is_an_error() {
        let mut api = MockCatalogApi::new();
        api.expect_request_token()
            .returning(|| Ok(issued("tok", 3600)));
        api.expect_playlist_page()
            .returning(|_, _, _, _| Err(PlaybackError::Auth("HTTP 401".to_string())));
        api.expect_playlist_embedded().never();

        let spotify = SpotifyResolver::new(Arc::new(api), true, true);
        assert!(matches!(
            spotify.resolve_playlist("private").await,
            Err(PlaybackError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_short_link_is_expanded_then_resolved() {
        let mut api = MockCatalogApi::new();
        api.expect_expand_short_link()
            .returning(|_| Ok("https://open.spotify.com/track/real42?si=abc".to_string()));
        api.expect_oembed_title()
            .withf(|url| url.ends_with("/track/real42"))
            .returning(|_| Ok(Some("Song".to_string())));

        let spotify = resolver(api, false);
        let link = classify("https://spotify.link/Xyz").unwrap();
        assert_eq!(spotify.resolve_link(&link).await.unwrap(), vec!["Song".to_string()]);
    }

    #[test]
    fn test_search_term_requires_name_and_artist() {
        assert_eq!(
            search_term(&track("Title", &["A", "B"]), &[]).as_deref(),
            Some("A, B - Title")
        );
        assert!(search_term(&track("", &["A"]), &[]).is_none());
        assert!(search_term(&track("Title", &[]), &[]).is_none());
    }
}
