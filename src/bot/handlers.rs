use anyhow::Result;
use serenity::{
    model::id::{ChannelId, GuildId, UserId},
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{player::GuildPlayerHandle, queue::QueueItem},
    bot::{commands::Command, reply::Replier, JukeboxBot},
    sources::links::{parse_query, LinkKind, MusicLink, PlayRequest},
    ui::{embeds, messages},
};

/// Where a command came from.
#[derive(Debug, Clone, Copy)]
pub struct Origin {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
}

/// Runs a command after checking its voice preconditions.
pub async fn execute(
    ctx: &Context,
    bot: &JukeboxBot,
    origin: Origin,
    command: Command,
    replier: &dyn Replier,
) -> Result<()> {
    info!(
        "📝 Comando {} usado por {} en guild {}",
        command.name(),
        origin.user_id,
        origin.guild_id
    );

    match command {
        Command::Help => {
            replier
                .embed(embeds::create_help_embed(
                    &bot.config.command_prefix,
                    bot.config.spotify_playlists,
                ))
                .await
        }
        Command::Play(query) => handle_play(ctx, bot, origin, &query, replier).await,
        command => {
            let Some(player) = bot.existing_player(origin.guild_id, origin.channel_id) else {
                return replier.say(messages::not_connected()).await;
            };
            if !player.transport().is_connected().await {
                return replier.say(messages::not_connected()).await;
            }
            handle_control(bot, &player, command, replier).await
        }
    }
}

async fn handle_play(
    ctx: &Context,
    bot: &JukeboxBot,
    origin: Origin,
    query: &str,
    replier: &dyn Replier,
) -> Result<()> {
    let Some(voice_channel) = get_user_voice_channel(ctx, origin.guild_id, origin.user_id) else {
        return replier.say(messages::join_voice_first()).await;
    };

    if query.is_empty() {
        return replier
            .say(&format!("❌ Usage: `{}play <song/URL>`", bot.config.command_prefix))
            .await;
    }

    let player = bot.player(ctx, origin.guild_id, origin.channel_id);
    let transport = player.transport();
    let joined = match transport.current_channel().await {
        None => transport.connect(voice_channel).await,
        Some(current) if current != voice_channel => transport.move_to(voice_channel).await,
        Some(_) => Ok(()),
    };
    if let Err(e) = joined {
        warn!("❌ No se pudo conectar a voz en guild {}: {}", origin.guild_id, e);
        return replier.say(&format!("❌ Error: {}", e)).await;
    }

    let items = match parse_query(query) {
        PlayRequest::Item(item) => {
            if item.is_search() {
                replier.say(&messages::searching(item.reference())).await?;
            }
            vec![item]
        }
        PlayRequest::Link(MusicLink {
            kind: LinkKind::DirectMediaLink,
            url,
            ..
        }) => vec![QueueItem::DirectUrl(url)],
        PlayRequest::Link(link) => {
            if let Some(notice) = catalog_notice(link.kind, bot.config.spotify_playlists) {
                replier.say(notice).await?;
            }
            match bot.catalog.resolve_link(&link).await {
                Ok(terms) => terms.into_iter().map(QueueItem::Search).collect(),
                Err(e) => {
                    warn!("❌ Enlace de Spotify no resuelto ({}): {}", link.url, e);
                    return replier.say(&messages::catalog_failed(&e)).await;
                }
            }
        }
    };

    let outcome = player.enqueue(items.clone()).await?;
    replier
        .say(&messages::added(&items, outcome.pending, outcome.started))
        .await
}

/// Progress line for a catalog link. Disabled playlists get only the refusal.
fn catalog_notice(kind: LinkKind, playlists_enabled: bool) -> Option<&'static str> {
    match kind {
        LinkKind::CatalogAlbum => Some(messages::catalog_album_detected()),
        LinkKind::CatalogPlaylist if playlists_enabled => Some(messages::catalog_playlist_detected()),
        LinkKind::CatalogPlaylist => None,
        LinkKind::CatalogTrack | LinkKind::DirectMediaLink => Some(messages::catalog_track_detected()),
    }
}

async fn handle_control(
    bot: &JukeboxBot,
    player: &GuildPlayerHandle,
    command: Command,
    replier: &dyn Replier,
) -> Result<()> {
    match command {
        Command::Pause => {
            let reply = if player.pause().await? {
                messages::paused()
            } else {
                messages::nothing_playing()
            };
            replier.say(reply).await
        }
        Command::Resume => {
            let reply = if player.resume().await? {
                messages::resumed()
            } else {
                messages::not_paused()
            };
            replier.say(reply).await
        }
        Command::Skip => {
            let reply = if player.skip().await? {
                messages::skipped()
            } else {
                messages::nothing_playing()
            };
            replier.say(reply).await
        }
        Command::Stop => {
            player.stop().await?;
            replier.say(messages::stopped()).await
        }
        Command::Leave => {
            player.stop().await?;
            player.transport().disconnect().await?;
            replier.say(messages::disconnected()).await
        }
        Command::Queue => {
            let snapshot = player.snapshot().await?;
            replier
                .embed(embeds::create_queue_embed(
                    &snapshot,
                    bot.config.queue_display_limit,
                ))
                .await
        }
        Command::Loop => {
            let enabled = player.toggle_loop().await?;
            replier.say(messages::loop_toggled(enabled)).await
        }
        Command::NowPlaying => {
            let snapshot = player.snapshot().await?;
            match snapshot.now_playing {
                Some(title) => {
                    replier
                        .embed(embeds::create_now_playing_embed(&title, snapshot.loop_enabled))
                        .await
                }
                None => replier.say(messages::nothing_playing()).await,
            }
        }
        Command::Play(_) | Command::Help => Ok(()),
    }
}

/// Voice channel the user is currently in, from the cache.
pub fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id);

    channel_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disabled_playlist_gets_no_progress_notice() {
        assert_eq!(catalog_notice(LinkKind::CatalogPlaylist, false), None);
        assert_eq!(
            catalog_notice(LinkKind::CatalogPlaylist, true),
            Some(messages::catalog_playlist_detected())
        );
    }

    #[test]
    fn test_tracks_and_albums_always_get_a_notice() {
        for enabled in [false, true] {
            assert_eq!(
                catalog_notice(LinkKind::CatalogTrack, enabled),
                Some(messages::catalog_track_detected())
            );
            assert_eq!(
                catalog_notice(LinkKind::CatalogAlbum, enabled),
                Some(messages::catalog_album_detected())
            );
        }
    }
}
