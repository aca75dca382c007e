use regex::Regex;
use std::sync::LazyLock;

use crate::audio::queue::QueueItem;

/// Provider family of a recognised link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Something yt-dlp can resolve directly (YouTube video or playlist)
    DirectMediaLink,
    CatalogTrack,
    CatalogAlbum,
    /// Recognised, but refused by the catalog resolver unless enabled
    CatalogPlaylist,
}

/// A link found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicLink {
    pub kind: LinkKind,
    /// The matched substring
    pub url: String,
    /// Catalog identifier, when the link carries one (short links do not)
    pub id: Option<String>,
}

/// What a `play` argument asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayRequest {
    Link(MusicLink),
    Item(QueueItem),
}

struct Family {
    kind: LinkKind,
    patterns: Vec<Regex>,
}

// Order matters: the first family with a match wins.
static FAMILIES: LazyLock<Vec<Family>> = LazyLock::new(|| {
    let compile = |patterns: &[&str]| -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("static link pattern"))
            .collect()
    };

    vec![
        Family {
            kind: LinkKind::DirectMediaLink,
            patterns: compile(&[
                r"https?://(?:www\.|m\.)?youtube\.com/watch\?v=[\w-]+",
                r"https?://(?:www\.)?youtu\.be/[\w-]+",
                r"https?://(?:www\.)?youtube\.com/playlist\?list=[\w-]+",
                r"https?://(?:www\.)?youtube\.com/shorts/[\w-]+",
                r"https?://music\.youtube\.com/watch\?v=[\w-]+",
            ]),
        },
        Family {
            kind: LinkKind::CatalogTrack,
            patterns: compile(&[
                r"https?://open\.spotify\.com/(?:intl-[\w-]+/)?track/(?P<id>\w+)",
                r"https?://spotify\.link/\w+",
            ]),
        },
        Family {
            kind: LinkKind::CatalogAlbum,
            patterns: compile(&[r"https?://open\.spotify\.com/(?:intl-[\w-]+/)?album/(?P<id>\w+)"]),
        },
        Family {
            kind: LinkKind::CatalogPlaylist,
            patterns: compile(&[r"https?://open\.spotify\.com/(?:intl-[\w-]+/)?playlist/(?P<id>\w+)"]),
        },
    ]
});

/// Finds the first music link in `text`.
pub fn classify(text: &str) -> Option<MusicLink> {
    FAMILIES.iter().find_map(|family| {
        family.patterns.iter().find_map(|pattern| {
            pattern.captures(text).map(|caps| MusicLink {
                kind: family.kind,
                url: caps[0].to_string(),
                id: caps.name("id").map(|m| m.as_str().to_string()),
            })
        })
    })
}

/// Interprets the argument of a `play` command.
pub fn parse_query(query: &str) -> PlayRequest {
    let query = query.trim();

    if let Some(link) = classify(query) {
        return PlayRequest::Link(link);
    }

    if query.starts_with("http://") || query.starts_with("https://") {
        return PlayRequest::Item(QueueItem::DirectUrl(query.to_string()));
    }

    PlayRequest::Item(QueueItem::Search(query.to_string()))
}
