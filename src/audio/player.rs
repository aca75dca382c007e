use async_trait::async_trait;
use dashmap::DashMap;
use serenity::all::GuildId;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::{GuildQueue, QueueItem},
        transport::VoiceTransport,
    },
    error::PlaybackError,
    sources::{validate_stream, Resolution, StreamResolver},
    ui::messages,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Resolving,
    Playing,
    /// The queue ran out; waiting for new items
    Draining,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Finished,
    Failed(String),
}

/// Result of an enqueue, used to word the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub added: usize,
    /// Items waiting in the FIFO after the enqueue
    pub pending: usize,
    /// Whether this enqueue started playback
    pub started: bool,
}

/// Read model for the queue and now-playing commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub state: PlaybackState,
    pub now_playing: Option<String>,
    pub current: Option<QueueItem>,
    pub upcoming: Vec<QueueItem>,
    pub loop_enabled: bool,
}

/// Everything a guild's engine reacts to, in arrival order.
pub enum PlayerEvent {
    Enqueue {
        items: Vec<QueueItem>,
        reply: oneshot::Sender<EnqueueOutcome>,
    },
    Skip {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    ToggleLoop {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    Resolved {
        generation: u64,
        result: Result<Resolution, PlaybackError>,
    },
    TrackEnded {
        generation: u64,
        outcome: TrackOutcome,
    },
}

/// Handed to the transport with every track. Firing it only posts an event;
/// the engine decides whether the activation it belongs to is still current.
#[derive(Clone)]
pub struct CompletionHandle {
    events: flume::Sender<PlayerEvent>,
    generation: u64,
}

impl CompletionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn finished(&self, outcome: TrackOutcome) {
        let event = PlayerEvent::TrackEnded {
            generation: self.generation,
            outcome,
        };
        if self.events.send(event).is_err() {
            debug!("Motor de reproducción ya cerrado, evento de fin descartado");
        }
    }
}

/// Where the engine posts its status lines.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn announce(&self, message: &str);
}

/// Per-guild playback engine. Owns the queue; runs as a single task so every
/// mutation is serialized.
struct GuildPlayer {
    guild_id: GuildId,
    queue: GuildQueue,
    state: PlaybackState,
    /// Bumped on every activation, stop and skip-while-resolving
    generation: u64,
    now_playing: Option<String>,
    drain_announced: bool,
    command_prefix: String,
    resolver: Arc<dyn StreamResolver>,
    transport: Arc<dyn VoiceTransport>,
    sink: Arc<dyn StatusSink>,
    events: flume::Sender<PlayerEvent>,
}

impl GuildPlayer {
    async fn run(mut self, receiver: flume::Receiver<PlayerEvent>) {
        debug!("🎛️ Motor de reproducción iniciado para guild {}", self.guild_id);

        while let Ok(event) = receiver.recv_async().await {
            self.handle(event).await;
        }
    }

    async fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Enqueue { items, reply } => {
                let added = self.queue.extend(items);
                self.drain_announced = false;
                let started = self.ensure_playing().await;
                let _ = reply.send(EnqueueOutcome {
                    added,
                    pending: self.queue.len(),
                    started,
                });
            }
            PlayerEvent::Skip { reply } => {
                let skipped = self.skip().await;
                let _ = reply.send(skipped);
            }
            PlayerEvent::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            PlayerEvent::Pause { reply } => {
                let paused = self.state == PlaybackState::Playing
                    && self.transport.is_playing().await
                    && self.transport.pause().await.is_ok();
                let _ = reply.send(paused);
            }
            PlayerEvent::Resume { reply } => {
                let resumed = self.state == PlaybackState::Playing
                    && self.transport.is_paused().await
                    && self.transport.resume().await.is_ok();
                let _ = reply.send(resumed);
            }
            PlayerEvent::ToggleLoop { reply } => {
                let _ = reply.send(self.queue.toggle_loop());
            }
            PlayerEvent::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            PlayerEvent::Resolved { generation, result } => {
                if generation != self.generation || self.state != PlaybackState::Resolving {
                    debug!(
                        "🗑️ Resolución obsoleta descartada (gen {} / actual {}, {:?})",
                        generation, self.generation, self.state
                    );
                    return;
                }
                self.on_resolved(result).await;
            }
            PlayerEvent::TrackEnded { generation, outcome } => {
                if generation != self.generation || self.state != PlaybackState::Playing {
                    debug!(
                        "🗑️ Fin de track obsoleto ignorado (gen {} / actual {})",
                        generation, self.generation
                    );
                    return;
                }

                if let TrackOutcome::Failed(reason) = &outcome {
                    warn!("❌ Error de reproducción en guild {}: {}", self.guild_id, reason);
                    self.announce(&messages::track_errored(reason)).await;
                    self.queue.release_current();
                }
                self.start_next().await;
            }
        }
    }

    /// Starts the next item unless something is already in progress.
    async fn ensure_playing(&mut self) -> bool {
        let idle = matches!(self.state, PlaybackState::Idle | PlaybackState::Draining);
        if idle && !self.transport.is_playing().await {
            self.start_next().await;
            return true;
        }
        false
    }

    async fn start_next(&mut self) {
        let Some(item) = self.queue.advance() else {
            self.drain().await;
            return;
        };

        self.generation += 1;
        self.state = PlaybackState::Resolving;
        info!(
            "🔍 Resolviendo {} (gen {}) en guild {}",
            item, self.generation, self.guild_id
        );

        let generation = self.generation;
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = resolver.resolve(item.reference(), item.is_search()).await;
            let _ = events.send(PlayerEvent::Resolved { generation, result });
        });
    }

    async fn drain(&mut self) {
        self.state = PlaybackState::Draining;
        self.queue.release_current();
        self.now_playing = None;

        if !self.drain_announced {
            self.drain_announced = true;
            info!("📭 Cola terminada en guild {}", self.guild_id);
            self.announce(&messages::queue_drained(&self.command_prefix)).await;
        }
    }

    async fn on_resolved(&mut self, result: Result<Resolution, PlaybackError>) {
        match self.activate(result).await {
            Ok(()) => {}
            Err(e) if !e.is_item_failure() => {
                warn!("🔌 Sin conexión de voz en guild {}, cola conservada", self.guild_id);
                self.queue.release_current();
                self.state = PlaybackState::Idle;
                self.announce(&messages::playback_failed(&e)).await;
            }
            Err(e) => {
                warn!("❌ Falló la reproducción en guild {}: {}", self.guild_id, e);
                self.announce(&messages::playback_failed(&e)).await;
                self.queue.release_current();
                self.start_next().await;
            }
        }
    }

    async fn activate(&mut self, result: Result<Resolution, PlaybackError>) -> Result<(), PlaybackError> {
        let stream = match result? {
            Resolution::Stream(stream) => stream,
            Resolution::Playlist(entries) => {
                let added = self.queue.extend(entries.remainder);
                self.queue
                    .replace_current(QueueItem::DirectUrl(entries.first.source_url.clone()));
                self.announce(&messages::playlist_added(entries.title.as_deref(), added + 1))
                    .await;
                entries.first
            }
        };

        validate_stream(&stream)?;

        if !self.transport.is_connected().await {
            return Err(PlaybackError::TransportNotConnected);
        }

        let completion = CompletionHandle {
            events: self.events.clone(),
            generation: self.generation,
        };
        self.transport.play(&stream, completion).await?;

        self.state = PlaybackState::Playing;
        info!("🎵 Reproduciendo: {} en guild {}", stream.title, self.guild_id);
        self.announce(&messages::now_playing(&stream.title)).await;
        self.now_playing = Some(stream.title);

        Ok(())
    }

    async fn skip(&mut self) -> bool {
        match self.state {
            PlaybackState::Playing => {
                // The track's completion drives the advance
                self.queue.release_current();
                self.transport.stop().await;
                true
            }
            PlaybackState::Resolving => {
                self.generation += 1;
                self.queue.release_current();
                self.start_next().await;
                true
            }
            PlaybackState::Idle | PlaybackState::Draining => false,
        }
    }

    async fn stop(&mut self) {
        self.queue.clear();
        self.generation += 1;
        self.now_playing = None;
        self.state = PlaybackState::Idle;
        self.transport.stop().await;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            state: self.state,
            now_playing: self.now_playing.clone(),
            current: self.queue.current().cloned(),
            upcoming: self.queue.upcoming().cloned().collect(),
            loop_enabled: self.queue.loop_enabled(),
        }
    }

    async fn announce(&self, message: &str) {
        self.sink.announce(message).await;
    }
}

/// Cheap handle to a running guild engine.
#[derive(Clone)]
pub struct GuildPlayerHandle {
    guild_id: GuildId,
    events: flume::Sender<PlayerEvent>,
    transport: Arc<dyn VoiceTransport>,
}

impl GuildPlayerHandle {
    async fn request<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> PlayerEvent,
    ) -> Result<T, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send_async(event(reply))
            .await
            .map_err(|_| PlaybackError::PlayerUnavailable)?;
        response.await.map_err(|_| PlaybackError::PlayerUnavailable)
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// The guild's voice connection, for joining and leaving.
    pub fn transport(&self) -> Arc<dyn VoiceTransport> {
        self.transport.clone()
    }

    pub async fn enqueue(&self, items: Vec<QueueItem>) -> Result<EnqueueOutcome, PlaybackError> {
        self.request(|reply| PlayerEvent::Enqueue { items, reply }).await
    }

    /// `false` when nothing was playing or resolving.
    pub async fn skip(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlayerEvent::Skip { reply }).await
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.request(|reply| PlayerEvent::Stop { reply }).await
    }

    /// `false` when the transport was not playing.
    pub async fn pause(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlayerEvent::Pause { reply }).await
    }

    /// `false` when the transport was not paused.
    pub async fn resume(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlayerEvent::Resume { reply }).await
    }

    pub async fn toggle_loop(&self) -> Result<bool, PlaybackError> {
        self.request(|reply| PlayerEvent::ToggleLoop { reply }).await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, PlaybackError> {
        self.request(|reply| PlayerEvent::Snapshot { reply }).await
    }
}

/// Owns one engine per guild, created on first use.
pub struct PlayerManager {
    players: DashMap<GuildId, GuildPlayerHandle>,
    resolver: Arc<dyn StreamResolver>,
    command_prefix: String,
}

impl PlayerManager {
    pub fn new(resolver: Arc<dyn StreamResolver>, command_prefix: impl Into<String>) -> Self {
        Self {
            players: DashMap::new(),
            resolver,
            command_prefix: command_prefix.into(),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<GuildPlayerHandle> {
        self.players.get(&guild_id).map(|player| player.clone())
    }

    /// Returns the guild's engine, spawning it with the given transport and
    /// status sink if it does not exist yet.
    pub fn get_or_spawn(
        &self,
        guild_id: GuildId,
        connect: impl FnOnce() -> (Arc<dyn VoiceTransport>, Arc<dyn StatusSink>),
    ) -> GuildPlayerHandle {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                let (transport, sink) = connect();
                self.spawn(guild_id, transport, sink)
            })
            .clone()
    }

    fn spawn(
        &self,
        guild_id: GuildId,
        transport: Arc<dyn VoiceTransport>,
        sink: Arc<dyn StatusSink>,
    ) -> GuildPlayerHandle {
        let (events, receiver) = flume::unbounded();

        let player = GuildPlayer {
            guild_id,
            queue: GuildQueue::new(),
            state: PlaybackState::Idle,
            generation: 0,
            now_playing: None,
            drain_announced: false,
            command_prefix: self.command_prefix.clone(),
            resolver: self.resolver.clone(),
            transport: transport.clone(),
            sink,
            events: events.clone(),
        };
        tokio::spawn(player.run(receiver));

        info!("🆕 Reproductor creado para guild {}", guild_id);
        GuildPlayerHandle {
            guild_id,
            events,
            transport,
        }
    }
}
