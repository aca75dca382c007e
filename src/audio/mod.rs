//! # Audio Module
//!
//! Per-guild playback for the jukebox.
//!
//! ## Architecture
//!
//! ### [`queue`] - Guild Queue
//! - FIFO of pending items, the current item and the loop flag
//! - Pure data, no I/O
//!
//! ### [`player`] - Playback Engine
//! - One task per guild consuming a channel of [`player::PlayerEvent`]s
//! - Resolve, validate, play, then advance on completion
//! - Generation counter so stale resolutions and completions are ignored
//!
//! ### [`transport`] - Voice Transport
//! - [`transport::VoiceTransport`] trait used by the engine
//! - songbird implementation streaming the resolved URL over HTTP
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let manager = PlayerManager::new(resolver, "!");
//! let player = manager.get_or_spawn(guild_id, || (transport, sink));
//!
//! player.enqueue(vec![QueueItem::Search("daft punk - one more time".into())]).await?;
//! player.skip().await?;
//! ```

pub mod player;
pub mod queue;
pub mod transport;
