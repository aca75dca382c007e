//! What users see: embeds for the queue, now-playing and help commands, and
//! the plain status lines the playback engine posts.

pub mod embeds;
pub mod messages;
