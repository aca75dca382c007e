use async_process::{Command, Stdio};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{truncate, PlaylistEntries, Resolution, ResolvedStream, StreamResolver};
use crate::{audio::queue::QueueItem, config::Config, error::PlaybackError};

/// Información extraída de yt-dlp (`-J`)
#[derive(Debug, Default, Deserialize)]
struct ExtractedInfo {
    url: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
    /// Present for playlists and search results; failed entries come back as null
    entries: Option<Vec<Option<ExtractedInfo>>>,
}

/// Stream resolver backed by the yt-dlp executable.
pub struct YtDlpResolver {
    program: String,
    format: String,
    search_prefix: String,
    retries: u32,
    socket_timeout_secs: u64,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.ytdlp_path.clone(),
            format: config.audio_format.clone(),
            search_prefix: config.search_prefix.clone(),
            retries: config.resolve_retries,
            socket_timeout_secs: config.socket_timeout_secs,
        }
    }

    /// Verifica que yt-dlp esté disponible
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program).arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("{} --version failed", self.program);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn target(&self, reference: &str, is_search: bool) -> String {
        if is_search {
            format!("{}1:{}", self.search_prefix, reference)
        } else {
            reference.to_string()
        }
    }

    fn args(&self, target: &str) -> Vec<String> {
        let retries = self.retries.to_string();
        let socket_timeout = self.socket_timeout_secs.to_string();

        [
            "-J",
            "--no-warnings",
            "--quiet",
            "--ignore-errors",
            "--yes-playlist",
            "--no-check-certificate",
            "--geo-bypass",
            "--format",
            &self.format,
            "--socket-timeout",
            &socket_timeout,
            "--retries",
            &retries,
            "--extractor-retries",
            &retries,
            "--",
            target,
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, reference: &str, is_search: bool) -> Result<Resolution, PlaybackError> {
        let target = self.target(reference, is_search);
        debug!("🔍 yt-dlp resolviendo: {}", target);

        // kill_on_drop: a timed-out resolution must not leave the child behind
        let output = Command::new(&self.program)
            .args(self.args(&target))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PlaybackError::Extraction(format!("could not run {}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp sin salida ({}): {}", output.status, truncate(stderr.trim(), 200));
            return Err(PlaybackError::Extraction(format!(
                "yt-dlp returned nothing for {}",
                reference
            )));
        }
        if !output.status.success() {
            // --ignore-errors still prints whatever it could extract
            debug!("yt-dlp terminó con {} pero produjo salida", output.status);
        }

        let resolution = interpret(&stdout, reference, is_search)?;
        info!("🎵 Stream resuelto: {}", resolution.stream().title);
        Ok(resolution)
    }
}

/// Reads the JSON document printed by `yt-dlp -J`.
fn interpret(json: &str, reference: &str, is_search: bool) -> Result<Resolution, PlaybackError> {
    let info: ExtractedInfo = serde_json::from_str(json)
        .map_err(|e| PlaybackError::Extraction(format!("unreadable yt-dlp output: {}", e)))?;

    let Some(entries) = info.entries else {
        return into_stream(info, reference).map(Resolution::Stream);
    };

    let playlist_title = info.title;
    let mut entries = entries.into_iter().flatten();

    // Entries that cannot be played are skipped, not fatal
    let first = entries
        .by_ref()
        .find(|entry| entry.url.is_some())
        .ok_or_else(|| PlaybackError::NotFound(format!("nothing playable for {}", reference)))?;
    let first = into_stream(first, reference)?;

    if is_search {
        return Ok(Resolution::Stream(first));
    }

    let remainder: Vec<QueueItem> = entries
        .filter_map(|entry| entry.webpage_url.or(entry.original_url).or(entry.url))
        .map(QueueItem::DirectUrl)
        .collect();

    if remainder.is_empty() {
        return Ok(Resolution::Stream(first));
    }

    Ok(Resolution::Playlist(PlaylistEntries {
        title: playlist_title,
        first,
        remainder,
    }))
}

fn into_stream(info: ExtractedInfo, reference: &str) -> Result<ResolvedStream, PlaybackError> {
    let stream_url = info
        .url
        .ok_or_else(|| PlaybackError::InvalidStream("no direct stream URL in yt-dlp output".to_string()))?;

    Ok(ResolvedStream {
        stream_url,
        title: info.title.unwrap_or_else(|| "Unknown song".to_string()),
        source_url: info
            .webpage_url
            .or(info.original_url)
            .unwrap_or_else(|| reference.to_string()),
        transport_headers: info.http_headers,
    })
}
