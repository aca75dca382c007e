//! # Bot Module
//!
//! Discord surface of the jukebox.
//!
//! - Prefix commands (`!play`, `!skip`, ...) and the same set as slash commands
//! - Music links posted without a command are played automatically
//! - Voice state tracking, so a forced disconnect stops the guild's player
//!
//! ## Architecture
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. It owns nothing
//! stateful itself: playback lives in the per-guild engines of
//! [`PlayerManager`], catalog lookups in [`SpotifyResolver`].

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Message, Ready, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod reply;

use crate::{
    audio::{
        player::{GuildPlayerHandle, PlayerManager, StatusSink},
        transport::{SongbirdTransport, VoiceTransport},
    },
    config::Config,
    sources::{links::classify, SpotifyResolver},
    ui::messages,
};
use commands::Command;
use handlers::Origin;
use reply::{ChannelAnnouncer, ChannelReplier, InteractionReplier, Replier};

/// Main Discord event handler.
///
/// ## Fields
///
/// - `config`: Bot configuration (prefix, link detection, display limits)
/// - `players`: Per-guild playback engines
/// - `catalog`: Spotify link conversion
/// - `songbird`: Voice manager shared with the gateway client
/// - `announcers`: Per-guild channel the engine posts status lines to
pub struct JukeboxBot {
    config: Arc<Config>,
    players: Arc<PlayerManager>,
    catalog: Arc<SpotifyResolver>,
    songbird: Arc<Songbird>,
    /// Client used by songbird to fetch resolved streams
    stream_client: reqwest::Client,
    announcers: DashMap<GuildId, Arc<ChannelAnnouncer>>,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        players: Arc<PlayerManager>,
        catalog: Arc<SpotifyResolver>,
        songbird: Arc<Songbird>,
    ) -> Self {
        Self {
            config,
            players,
            catalog,
            songbird,
            stream_client: reqwest::Client::new(),
            announcers: DashMap::new(),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Per-guild registration when `GUILD_ID` is set (propagates in about a
    /// second), global otherwise (up to an hour).
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("Could not register guild commands; check the applications.commands scope")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("Could not register global commands; check the applications.commands scope")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// The guild's player, with its status lines redirected to `channel_id`.
    pub fn player(&self, ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> GuildPlayerHandle {
        let announcer = self
            .announcers
            .entry(guild_id)
            .or_insert_with(|| Arc::new(ChannelAnnouncer::new(ctx.http.clone())))
            .clone();
        announcer.retarget(channel_id);

        self.players.get_or_spawn(guild_id, || {
            let transport = SongbirdTransport::new(
                self.songbird.clone(),
                guild_id,
                self.stream_client.clone(),
            );
            (
                Arc::new(transport) as Arc<dyn VoiceTransport>,
                announcer as Arc<dyn StatusSink>,
            )
        })
    }

    /// The guild's player if one was ever spawned; never creates an engine.
    pub fn existing_player(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<GuildPlayerHandle> {
        let player = self.players.get(guild_id)?;
        if let Some(announcer) = self.announcers.get(&guild_id) {
            announcer.retarget(channel_id);
        }
        Some(player)
    }

    async fn run(&self, ctx: &Context, origin: Origin, command: Command, replier: &dyn Replier) {
        let name = command.name();
        if let Err(e) = handlers::execute(ctx, self, origin, command, replier).await {
            error!("Error manejando comando {}: {:?}", name, e);
            if let Err(e) = replier.say(&format!("❌ Error: {}", e)).await {
                warn!("No se pudo informar el error: {:?}", e);
            }
        }
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        info!("⌨️ Prefijo: {}", self.config.command_prefix);

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    /// Prefixed commands, and music links posted as plain messages.
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let origin = Origin {
            guild_id,
            channel_id: msg.channel_id,
            user_id: msg.author.id,
        };
        let replier = ChannelReplier::new(ctx.http.clone(), msg.channel_id);

        if msg.content.trim_start().starts_with(&self.config.command_prefix) {
            if let Some(command) = Command::parse(&msg.content, &self.config.command_prefix) {
                self.run(&ctx, origin, command, &replier).await;
            }
            return;
        }

        if !self.config.auto_detect_links {
            return;
        }
        let Some(link) = classify(&msg.content) else {
            return;
        };

        info!("🔗 Enlace detectado de {}: {}", msg.author.name, link.url);
        if handlers::get_user_voice_channel(&ctx, guild_id, msg.author.id).is_none() {
            if let Err(e) = replier.say(messages::join_voice_to_play()).await {
                warn!("No se pudo responder: {:?}", e);
            }
            return;
        }

        self.run(&ctx, origin, Command::Play(link.url), &replier).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        let Some(guild_id) = command.guild_id else {
            debug!("Comando /{} fuera de un servidor ignorado", command.data.name);
            return;
        };
        let Some(parsed) = Command::from_interaction(&command) else {
            warn!("Comando no reconocido: /{}", command.data.name);
            return;
        };

        let origin = Origin {
            guild_id,
            channel_id: command.channel_id,
            user_id: command.user.id,
        };

        match InteractionReplier::defer(ctx.http.clone(), command).await {
            Ok(replier) => self.run(&ctx, origin, parsed, &replier).await,
            Err(e) => error!("Error al diferir la interacción: {:?}", e),
        }
    }

    /// Stops the guild's player when the bot is removed from voice.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        let was_connected = old.as_ref().and_then(|state| state.channel_id).is_some();
        if !was_connected || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };
        info!("🔌 Bot desconectado en guild {}", guild_id);

        if let Some(player) = self.players.get(guild_id) {
            if let Err(e) = player.stop().await {
                error!("Error al detener reproducción: {:?}", e);
            }
        }
    }
}
