//! # Audio Module
//!
//! Per-guild playback coordination for the bot.
//!
//! ## Architecture
//!
//! ### [`registry`] - Player Registry
//! - One [`player::GuildPlayer`] per guild, created lazily
//! - Idle disconnect timers that can be cancelled when a listener returns
//!
//! ### [`player`] - Guild Player
//! - Queue, current track and loop flag behind a single per-guild lock
//! - Advance protocol: refresh the stream URL, hand it to the sink, skip
//!   broken entries forward until something plays or the queue is empty
//!
//! ### [`queue`] - Track Descriptors
//! - Immutable [`queue::Track`] values and the FIFO [`queue::TrackQueue`]
//!
//! ### [`sink`] - Audio Transport
//! - [`sink::AudioSink`] abstracts the voice connection
//! - [`sink::SongbirdSink`] streams through songbird, routing equalized
//!   playback through an ffmpeg filter chain
//!
//! ### [`equalizer`] - Presets
//! - Static 10-band preset table mapped to ffmpeg `equalizer` filters
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use guild_music::audio::{player::PlayerDefaults, registry::PlayerRegistry};
//! # async fn example(registry: PlayerRegistry, guild_id: serenity::all::GuildId, user: serenity::all::UserId) -> anyhow::Result<()> {
//! let player = registry.get_or_create(guild_id);
//!
//! player.enqueue("never gonna give you up", user).await?;
//! player.begin_if_idle().await?;
//! player.pause().await?;
//! # Ok(())
//! # }
//! ```

pub mod equalizer;
pub mod player;
pub mod queue;
pub mod registry;
pub mod sink;
