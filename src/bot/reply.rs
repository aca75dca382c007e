use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serenity::{
    all::{ChannelId, CommandInteraction, Http, MessageFlags},
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateMessage, EditInteractionResponse,
    },
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::warn;

use crate::audio::player::StatusSink;

/// Answers to whoever issued a command.
#[async_trait]
pub trait Replier: Send + Sync {
    async fn say(&self, content: &str) -> Result<()>;

    async fn embed(&self, embed: CreateEmbed) -> Result<()>;
}

fn silent_message() -> CreateMessage {
    CreateMessage::new().flags(MessageFlags::SUPPRESS_NOTIFICATIONS)
}

/// Replies in the text channel a prefixed command came from.
pub struct ChannelReplier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelReplier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Replier for ChannelReplier {
    async fn say(&self, content: &str) -> Result<()> {
        self.channel_id
            .send_message(&self.http, silent_message().content(content))
            .await?;
        Ok(())
    }

    async fn embed(&self, embed: CreateEmbed) -> Result<()> {
        self.channel_id
            .send_message(&self.http, silent_message().embed(embed))
            .await?;
        Ok(())
    }
}

/// Replies to a slash command: the first answer fills the deferred response,
/// later ones become follow-ups.
pub struct InteractionReplier {
    http: Arc<Http>,
    interaction: CommandInteraction,
    answered: AtomicBool,
}

impl InteractionReplier {
    /// Acknowledges the interaction; resolution can take longer than the
    /// three seconds Discord allows for a first response.
    pub async fn defer(http: Arc<Http>, interaction: CommandInteraction) -> Result<Self> {
        interaction
            .create_response(
                &http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;

        Ok(Self {
            http,
            interaction,
            answered: AtomicBool::new(false),
        })
    }

    fn first_answer(&self) -> bool {
        !self.answered.swap(true, Ordering::SeqCst)
    }
}

#[async_trait]
impl Replier for InteractionReplier {
    async fn say(&self, content: &str) -> Result<()> {
        if self.first_answer() {
            self.interaction
                .edit_response(&self.http, EditInteractionResponse::new().content(content))
                .await?;
        } else {
            self.interaction
                .create_followup(
                    &self.http,
                    CreateInteractionResponseFollowup::new()
                        .content(content)
                        .flags(MessageFlags::SUPPRESS_NOTIFICATIONS),
                )
                .await?;
        }
        Ok(())
    }

    async fn embed(&self, embed: CreateEmbed) -> Result<()> {
        if self.first_answer() {
            self.interaction
                .edit_response(&self.http, EditInteractionResponse::new().embed(embed))
                .await?;
        } else {
            self.interaction
                .create_followup(
                    &self.http,
                    CreateInteractionResponseFollowup::new()
                        .embed(embed)
                        .flags(MessageFlags::SUPPRESS_NOTIFICATIONS),
                )
                .await?;
        }
        Ok(())
    }
}

/// Status sink of a guild's engine: posts to the channel of the most recent
/// command in that guild.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    channel: RwLock<Option<ChannelId>>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channel: RwLock::new(None),
        }
    }

    pub fn retarget(&self, channel_id: ChannelId) {
        *self.channel.write() = Some(channel_id);
    }
}

#[async_trait]
impl StatusSink for ChannelAnnouncer {
    async fn announce(&self, message: &str) {
        let channel = *self.channel.read();
        let Some(channel_id) = channel else {
            warn!("⚠️ Sin canal de texto para anunciar: {}", message);
            return;
        };

        if let Err(e) = channel_id
            .send_message(&self.http, silent_message().content(message))
            .await
        {
            warn!("⚠️ No se pudo enviar mensaje al canal {}: {:?}", channel_id, e);
        }
    }
}
