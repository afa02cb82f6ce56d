use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    audio::{player::PlaybackAnnouncer, queue::Track},
    error::PlayerError,
    ui::embeds,
};

/// Publica los avisos del reproductor en el canal de texto donde se usó `/play`
pub struct DiscordAnnouncer {
    http: Arc<Http>,
    channels: DashMap<GuildId, ChannelId>,
}

impl DiscordAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
        }
    }

    /// El último canal usado gana
    pub fn bind(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    pub fn unbind(&self, guild_id: GuildId) {
        self.channels.remove(&guild_id);
    }

    pub fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels.get(&guild_id).map(|c| *c)
    }

    async fn send(&self, guild_id: GuildId, embed: CreateEmbed) {
        let Some(channel_id) = self.channel(guild_id) else {
            debug!("Sin canal de anuncios para guild {}", guild_id);
            return;
        };

        if let Err(e) = channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            error!("Error al enviar mensaje a {}: {:?}", channel_id, e);
        }
    }
}

#[async_trait]
impl PlaybackAnnouncer for DiscordAnnouncer {
    async fn now_playing(&self, guild_id: GuildId, track: &Track) {
        self.send(guild_id, embeds::create_now_playing_embed(track)).await;
    }

    async fn playback_failed(&self, guild_id: GuildId, track: &Track, error: &PlayerError) {
        self.send(guild_id, embeds::create_playback_failed_embed(track, error))
            .await;
    }
}
