use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Slash commands registered per guild (development)
    pub command_prefix: String,
    pub auto_detect_links: bool,

    // Spotify (optional)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_playlists: bool,

    // yt-dlp
    pub ytdlp_path: String,
    pub audio_format: String,
    pub search_prefix: String,

    // Resolution limits
    pub resolve_timeout_secs: u64,
    pub resolve_retries: u32,
    pub socket_timeout_secs: u64,
    pub resolver_workers: usize,

    // Presentation
    pub queue_display_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),
            auto_detect_links: std::env::var("AUTO_DETECT_LINKS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,

            // Spotify
            spotify_client_id: non_empty_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_var("SPOTIFY_CLIENT_SECRET"),
            spotify_playlists: std::env::var("SPOTIFY_PLAYLISTS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            // yt-dlp
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            audio_format: std::env::var("AUDIO_FORMAT").unwrap_or(defaults.audio_format),
            search_prefix: std::env::var("SEARCH_PREFIX").unwrap_or(defaults.search_prefix),

            // Limits
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            resolve_retries: std::env::var("RESOLVE_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            socket_timeout_secs: std::env::var("SOCKET_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            resolver_workers: match std::env::var("RESOLVER_WORKERS") {
                Ok(val) if !val.trim().is_empty() => val.parse()?,
                _ => num_cpus::get(),
            },

            queue_display_limit: std::env::var("QUEUE_DISPLAY_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The command prefix must not be empty or contain whitespace
    /// - The resolution ceiling and worker count must be greater than 0
    /// - Spotify credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.is_empty() || self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!("Command prefix must be non-empty and contain no whitespace, got: {:?}", self.command_prefix);
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.resolver_workers == 0 {
            anyhow::bail!("Resolver workers must be greater than 0");
        }

        if self.queue_display_limit == 0 {
            anyhow::bail!("Queue display limit must be greater than 0");
        }

        if self.search_prefix.trim().is_empty() {
            anyhow::bail!("Search prefix must not be empty");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn has_spotify_credentials(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and secrets are never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix {:?}, slash commands {}, link detection {}\n  \
            Spotify: credentials {}, playlists {}\n  \
            yt-dlp: {} ({}), search {}\n  \
            Resolution: {} ceiling, {} retries, {} socket timeout, {} workers",
            self.command_prefix,
            self.guild_id.map_or("global".to_string(), |id| format!("guild {}", id)),
            self.auto_detect_links,
            if self.has_spotify_credentials() { "configured" } else { "missing" },
            self.spotify_playlists,
            self.ytdlp_path,
            self.audio_format,
            self.search_prefix,
            humantime::format_duration(self.resolve_timeout()),
            self.resolve_retries,
            humantime::format_duration(Duration::from_secs(self.socket_timeout_secs)),
            self.resolver_workers,
        )
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (token has no default - must be provided)
            discord_token: String::new(),
            guild_id: None,
            command_prefix: "!".to_string(),
            auto_detect_links: true,

            spotify_client_id: None,
            spotify_client_secret: None,
            spotify_playlists: false,

            ytdlp_path: "yt-dlp".to_string(),
            audio_format: "bestaudio[ext=webm]/bestaudio[ext=m4a]/bestaudio/best".to_string(),
            search_prefix: "ytsearch".to_string(),

            resolve_timeout_secs: 30,
            resolve_retries: 2,
            socket_timeout_secs: 10,
            resolver_workers: num_cpus::get(),

            queue_display_limit: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve_timeout(), Duration::from_secs(30));
        assert_eq!(config.resolve_retries, 2);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = Config {
            resolve_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_prefix_with_whitespace() {
        let config = Config {
            command_prefix: "! ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spotify_credentials_must_be_paired() {
        let config = Config {
            spotify_client_id: Some("id".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(!config.has_spotify_credentials());
    }

    #[test]
    fn test_summary_hides_secrets() {
        let config = Config {
            discord_token: "very-secret-token".to_string(),
            spotify_client_id: Some("id".to_string()),
            spotify_client_secret: Some("hunter2".to_string()),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("very-secret-token"));
        assert!(!summary.contains("hunter2"));
        assert!(summary.contains("30s ceiling"));
    }
}
