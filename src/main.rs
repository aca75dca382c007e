use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::player::PlayerManager;
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::sources::{spotify_api::HttpCatalogApi, ResolverPool, SpotifyResolver, YtDlpResolver};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let ytdlp = YtDlpResolver::new(&config);

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&ytdlp).await;
    }

    match ytdlp.verify().await {
        Ok(version) => info!("✅ yt-dlp {} disponible", version),
        Err(e) => warn!("⚠️ yt-dlp no disponible ({}), las canciones fallarán al resolverse", e),
    }

    // Resolución de streams acotada por workers y timeout
    let resolver = ResolverPool::new(
        Arc::new(ytdlp),
        config.resolver_workers,
        config.resolve_timeout(),
    );
    let players = Arc::new(PlayerManager::new(
        Arc::new(resolver),
        config.command_prefix.clone(),
    ));

    if !config.has_spotify_credentials() {
        warn!("⚠️ Sin credenciales de Spotify: solo se usará oEmbed para canciones");
    }
    let catalog_api = HttpCatalogApi::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
    )?;
    let catalog = Arc::new(SpotifyResolver::new(
        Arc::new(catalog_api),
        config.has_spotify_credentials(),
        config.spotify_playlists,
    ));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let songbird = Songbird::serenity();
    let config = Arc::new(config);
    let handler = JukeboxBot::new(config.clone(), players, catalog, songbird.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(ytdlp: &YtDlpResolver) -> Result<()> {
    let version = ytdlp.verify().await?;
    println!("OK (yt-dlp {})", version);
    Ok(())
}
