//! # Bot Module
//!
//! Discord surface of the music bot.
//!
//! This module contains:
//! - Slash command registration and dispatch
//! - Voice connection management (join, move, leave)
//! - Idle disconnect driven by voice state updates
//!
//! The [`MusicBot`] struct implements Serenity's [`EventHandler`] and owns
//! the [`PlayerRegistry`]; all playback state lives in the per-guild players.

use anyhow::Result;
use futures::FutureExt;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{registry::PlayerRegistry, sink::SongbirdSink},
    config::Config,
};
use events::DiscordAnnouncer;

/// Main Discord event handler.
///
/// ## Fields
///
/// - `config`: Bot configuration
/// - `registry`: Per-guild players
/// - `announcer`: Text channel bound per guild for now-playing messages
/// - `http_client`: Shared HTTP client for unfiltered audio streams
pub struct MusicBot {
    config: Arc<Config>,
    pub registry: Arc<PlayerRegistry>,
    pub announcer: Arc<DiscordAnnouncer>,
    http_client: reqwest::Client,
}

impl MusicBot {
    pub fn new(config: Config, registry: Arc<PlayerRegistry>, announcer: Arc<DiscordAnnouncer>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            announcer,
            http_client: reqwest::Client::new(),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands propagate almost immediately and are meant for
    /// development; global commands can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Connects (or moves) the bot to a voice channel.
    ///
    /// The guild player gets a new [`SongbirdSink`] only when it has no
    /// transport; moving between channels keeps the same call and sink.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let manager = voice_manager(ctx).await?;

        let call = manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error al obtener handler de voz: {:?}", e);
            anyhow::anyhow!("Error al conectar al canal de voz")
        })?;

        let player = self.registry.get_or_create(guild_id);
        if !player.has_transport().await {
            let sink = SongbirdSink::new(call, self.config.ffmpeg_path.clone(), self.http_client.clone());
            player.attach_transport(Arc::new(sink)).await;
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    /// Channel the bot is currently connected to in the guild
    pub async fn bot_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Option<ChannelId> {
        let manager = songbird::get(ctx).await?;
        let call = manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }

    /// Stops playback, leaves the voice channel and drops the guild player
    pub async fn teardown(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        let manager = voice_manager(ctx).await?;
        teardown_guild(manager, self.registry.clone(), self.announcer.clone(), guild_id).await;
        Ok(())
    }

    /// Schedules or cancels the idle disconnect depending on who is left
    /// in the bot's channel.
    async fn check_listeners(&self, ctx: &Context, guild_id: GuildId) {
        let Some(bot_channel) = self.bot_voice_channel(ctx, guild_id).await else {
            self.registry.cancel_teardown(guild_id);
            return;
        };

        let listeners = {
            let Some(guild) = ctx.cache.guild(guild_id) else {
                return;
            };
            count_listeners(
                guild.voice_states.values().map(|state| {
                    let is_bot = state
                        .member
                        .as_ref()
                        .map(|m| m.user.bot)
                        .or_else(|| ctx.cache.user(state.user_id).map(|u| u.bot))
                        .unwrap_or(false);
                    (state.user_id, state.channel_id, is_bot)
                }),
                bot_channel,
            )
        };

        if listeners > 0 {
            if self.registry.cancel_teardown(guild_id) {
                info!("👥 Alguien volvió al canal en guild {}, desconexión cancelada", guild_id);
            }
            return;
        }

        if self.registry.has_pending_teardown(guild_id) {
            return;
        }

        let manager = match voice_manager(ctx).await {
            Ok(manager) => manager,
            Err(e) => {
                error!("{:?}", e);
                return;
            }
        };
        let registry = self.registry.clone();
        let announcer = self.announcer.clone();

        self.registry
            .schedule_teardown(guild_id, self.config.idle_timeout(), move || {
                teardown_guild(manager, registry, announcer, guild_id).boxed()
            });
    }
}

async fn voice_manager(ctx: &Context) -> Result<Arc<Songbird>> {
    songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))
}

async fn teardown_guild(
    manager: Arc<Songbird>,
    registry: Arc<PlayerRegistry>,
    announcer: Arc<DiscordAnnouncer>,
    guild_id: GuildId,
) {
    if let Some(player) = registry.remove(guild_id) {
        player.stop_all().await;
        player.detach_transport().await;
    }
    announcer.unbind(guild_id);

    if manager.get(guild_id).is_some() {
        if let Err(e) = manager.remove(guild_id).await {
            warn!("Error al salir del canal de voz en guild {}: {:?}", guild_id, e);
        }
    }

    info!("👋 Desconectado del canal de voz en guild {}", guild_id);
}

/// Non-bot members currently in `channel`
fn count_listeners(
    states: impl Iterator<Item = (UserId, Option<ChannelId>, bool)>,
    channel: ChannelId,
) -> usize {
    states
        .filter(|(_, state_channel, is_bot)| *state_channel == Some(channel) && !is_bot)
        .count()
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Bot forcibly disconnected: immediate teardown. Otherwise the
    /// listener count of the bot's channel drives the idle disconnect.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id.or_else(|| old.as_ref().and_then(|o| o.guild_id)) else {
            return;
        };

        let current_user_id = ctx.cache.current_user().id;
        if new.user_id == current_user_id && new.channel_id.is_none() {
            if old.is_some() {
                info!("🔌 Bot desconectado en guild {}", guild_id);
                if let Err(e) = self.teardown(&ctx, guild_id).await {
                    error!("Error al limpiar guild {}: {:?}", guild_id, e);
                }
            }
            return;
        }

        self.check_listeners(&ctx, guild_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_listeners_ignores_bots_and_other_channels() {
        let music = ChannelId::new(100);
        let other = ChannelId::new(200);
        let states = vec![
            (UserId::new(1), Some(music), true), // el propio bot
            (UserId::new(2), Some(music), false),
            (UserId::new(3), Some(other), false),
            (UserId::new(4), None, false),
            (UserId::new(5), Some(music), true),
        ];

        assert_eq!(count_listeners(states.clone().into_iter(), music), 1);
        assert_eq!(count_listeners(states.into_iter().filter(|s| s.0 != UserId::new(2)), music), 0);
    }
}
