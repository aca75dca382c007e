use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::player::{PlaybackState, QueueSnapshot},
    sources::truncate,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Queue entries are shown by reference; long search terms and URLs are cut.
const ITEM_DISPLAY_CHARS: usize = 80;

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &QueueSnapshot, limit: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📝 Music Queue")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now());

    let now = match (&snapshot.now_playing, snapshot.state) {
        (Some(title), _) => Some(format!("**{}**", title)),
        (None, PlaybackState::Resolving) => snapshot
            .current
            .as_ref()
            .map(|item| format!("🔍 Loading `{}`...", truncate(item.reference(), ITEM_DISPLAY_CHARS))),
        _ => None,
    };

    if now.is_none() && snapshot.upcoming.is_empty() {
        return embed
            .description("📝 Queue is empty!")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    let mut embed = embed;
    if let Some(now) = now {
        let status = if snapshot.loop_enabled { "🔂" } else { "🎵" };
        embed = embed.field(format!("{} Now playing", status), now, false);
    }

    if !snapshot.upcoming.is_empty() {
        let mut lines: Vec<String> = snapshot
            .upcoming
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, truncate(item.reference(), ITEM_DISPLAY_CHARS)))
            .collect();

        if snapshot.upcoming.len() > limit {
            lines.push(format!("\n...and {} more songs", snapshot.upcoming.len() - limit));
        }

        embed = embed.field("Up next", lines.join("\n"), false);
    }

    let footer = if snapshot.loop_enabled {
        format!("{} • 🔁 Loop on", STANDARD_FOOTER)
    } else {
        STANDARD_FOOTER.to_string()
    };
    embed.footer(CreateEmbedFooter::new(footer))
}

pub fn create_now_playing_embed(title: &str, loop_enabled: bool) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Now playing")
        .description(format!("**{}**", title))
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(if loop_enabled {
            "🔂 Looping this song"
        } else {
            STANDARD_FOOTER
        }))
}

/// Crea el embed de ayuda
pub fn create_help_embed(prefix: &str, playlists_enabled: bool) -> CreateEmbed {
    let basic = [
        ("play <song/URL>", "Play music (YouTube/Spotify)"),
        ("pause", "Pause"),
        ("resume", "Resume"),
        ("skip", "Skip song"),
        ("stop", "Stop and clear queue"),
        ("leave", "Disconnect bot"),
    ];
    let queue = [
        ("queue", "Show queue"),
        ("np", "Now playing"),
        ("loop", "Toggle loop for current song"),
    ];

    let render = |commands: &[(&str, &str)]| {
        commands
            .iter()
            .map(|(usage, what)| format!("`{}{}` - {}", prefix, usage, what))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut support = vec![
        "• YouTube links and search",
        "• Spotify tracks (auto-search on YouTube)",
        "• Spotify albums (all tracks added to queue)",
        "• YouTube playlists",
    ];
    if playlists_enabled {
        support.push("• Spotify playlists");
    }

    let mut embed = CreateEmbed::default()
        .title("🎵 Music Bot - Commands")
        .color(colors::MUSIC_PURPLE)
        .field("Basic", render(&basic), false)
        .field("Queue", render(&queue), false)
        .field("Support", support.join("\n"), false);

    if !playlists_enabled {
        embed = embed.field(
            "Note",
            "Spotify playlists not supported due to API limitations",
            false,
        );
    }

    embed.footer(CreateEmbedFooter::new(
        "Links posted in chat are played automatically • Slash commands work too",
    ))
}
