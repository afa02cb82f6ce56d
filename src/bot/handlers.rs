use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    audio::player::{EnqueueOutcome, GuildPlayer, PlaybackStatus},
    bot::MusicBot,
    error::PlayerError,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "help" => respond_embed(ctx, &command, embeds::create_help_embed(), true).await?,
        "ping" => handle_ping(ctx, &command).await?,
        "invite" => {
            let bot_id = ctx.cache.current_user().id;
            respond_embed(ctx, &command, embeds::create_invite_embed(bot_id), false).await?
        }
        "about" => {
            let embed = embeds::create_about_embed(ctx.cache.guild_count(), bot.registry.len());
            respond_embed(ctx, &command, embed, false).await?
        }
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        name @ ("pause" | "resume" | "skip" | "stop" | "clear" | "loop" | "equalizer" | "volume"
        | "leave") => {
            if let Err(message) = ensure_same_channel(ctx, bot, guild_id, command.user.id).await {
                return respond_text(ctx, &command, &message, true).await;
            }

            match name {
                "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
                "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
                "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
                "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
                "clear" => handle_clear(ctx, &command, bot, guild_id).await?,
                "loop" => handle_loop(ctx, &command, bot, guild_id).await?,
                "equalizer" => handle_equalizer(ctx, &command, bot, guild_id).await?,
                "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
                _ => handle_leave(ctx, &command, bot, guild_id).await?,
            }
        }
        _ => respond_text(ctx, &command, "❌ Comando no reconocido", true).await?,
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let query = string_option(command, "query")
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_text(ctx, command, "❌ Debes estar en un canal de voz para usar este comando", true).await;
    };

    // Defer la respuesta ya que la extracción puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // Conectar, o mover si el bot está en otro canal
    if bot.bot_voice_channel(ctx, guild_id).await != Some(voice_channel_id) {
        if let Err(e) = bot.join_voice_channel(ctx, guild_id, voice_channel_id).await {
            warn!("No se pudo conectar en guild {}: {:?}", guild_id, e);
            return edit_embed(
                ctx,
                command,
                embeds::create_error_embed("Error de conexión", "No pude conectarme a tu canal de voz"),
            )
            .await;
        }
    }

    bot.announcer.bind(guild_id, command.channel_id);

    let player = bot.registry.get_or_create(guild_id);
    let outcome = match player.enqueue(query, command.user.id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return edit_embed(
                ctx,
                command,
                embeds::create_error_embed(
                    "Error al cargar",
                    &format!("{}\n\nRevisa la URL o prueba con otra búsqueda.", e),
                ),
            )
            .await;
        }
    };

    // Sólo se inicia si no había nada sonando
    let started = match player.begin_if_idle().await {
        Ok(started) => started,
        Err(e) => {
            warn!("No se pudo iniciar la reproducción en guild {}: {}", guild_id, e);
            false
        }
    };
    let status = player.status().await;

    match play_reply(&outcome, started, status) {
        PlayReply::Playlist => edit_embed(ctx, command, embeds::create_playlist_added_embed(&outcome)).await,
        PlayReply::Loading => {
            edit_text(ctx, command, &format!("🎵 Cargando **{}**", outcome.tracks[0].title())).await
        }
        PlayReply::TrackAdded => {
            let embed = embeds::create_track_added_embed(&outcome.tracks[0], outcome.queue_len);
            edit_embed(ctx, command, embed).await
        }
        PlayReply::Failed => {
            let embed = embeds::create_error_embed(
                "No se pudo reproducir",
                &format!("**{}** no se pudo reproducir. Prueba con otra búsqueda.", outcome.tracks[0].title()),
            );
            edit_embed(ctx, command, embed).await
        }
    }
}

/// Respuesta a `/play` una vez encolado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayReply {
    Playlist,
    /// La pista ya está sonando; el anuncio llega por el canal
    Loading,
    TrackAdded,
    /// Se intentó iniciar y todas las pistas fallaron
    Failed,
}

fn play_reply(outcome: &EnqueueOutcome, started: bool, status: PlaybackStatus) -> PlayReply {
    if outcome.is_playlist {
        PlayReply::Playlist
    } else if !started {
        PlayReply::TrackAdded
    } else if status == PlaybackStatus::Idle {
        PlayReply::Failed
    } else {
        PlayReply::Loading
    }
}

async fn handle_pause(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let result = with_player(bot, guild_id, |player| async move { player.pause().await }).await;
    let ephemeral = !matches!(result, Ok(true));
    let message = match result {
        Ok(true) => "⏸️ Reproducción pausada".to_string(),
        Ok(false) => "❌ No hay nada reproduciéndose".to_string(),
        Err(e) => format!("❌ {}", e),
    };

    respond_text(ctx, command, &message, ephemeral).await
}

async fn handle_resume(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let result = with_player(bot, guild_id, |player| async move { player.resume().await }).await;
    let ephemeral = !matches!(result, Ok(true));
    let message = match result {
        Ok(true) => "▶️ Reproducción reanudada".to_string(),
        Ok(false) => "❌ No hay nada en pausa".to_string(),
        Err(e) => format!("❌ {}", e),
    };

    respond_text(ctx, command, &message, ephemeral).await
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let result = with_player(bot, guild_id, |player| async move { player.skip().await }).await;
    let ephemeral = !matches!(result, Ok(true));
    let message = match result {
        Ok(true) => "⏭️ Saltando a la siguiente canción".to_string(),
        Ok(false) => "❌ No hay nada reproduciéndose".to_string(),
        Err(e) => format!("❌ {}", e),
    };

    respond_text(ctx, command, &message, ephemeral).await
}

async fn handle_stop(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    if let Some(player) = bot.registry.get(guild_id) {
        player.stop_all().await;
    }

    respond_text(ctx, command, "⏹️ Reproducción detenida y cola limpiada", false).await
}

async fn handle_clear(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let removed = match bot.registry.get(guild_id) {
        Some(player) => player.clear_queue().await,
        None => 0,
    };

    if removed == 0 {
        respond_text(ctx, command, "❌ La cola ya está vacía", true).await
    } else {
        respond_text(ctx, command, &format!("🗑️ Se eliminaron {} canciones de la cola", removed), false).await
    }
}

async fn handle_loop(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let enabled = string_option(command, "mode") == Some("on");
    bot.registry.get_or_create(guild_id).set_loop(enabled).await;

    let message = if enabled {
        "🔂 Repetir canción activado"
    } else {
        "➡️ Repetición desactivada"
    };

    respond_text(ctx, command, message, false).await
}

async fn handle_equalizer(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let player = bot.registry.get_or_create(guild_id);

    let Some(key) = string_option(command, "preset") else {
        let snapshot = player.snapshot().await;
        return respond_embed(ctx, command, embeds::create_equalizer_embed(snapshot.equalizer), false).await;
    };

    match player.set_equalizer(key).await {
        Ok(preset) => {
            respond_text(
                ctx,
                command,
                &format!("🎛️ Ecualizador **{}** aplicado desde la próxima canción", preset.display_name),
                false,
            )
            .await
        }
        Err(e) => respond_text(ctx, command, &format!("❌ {}", e), true).await,
    }
}

async fn handle_volume(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let player = bot.registry.get_or_create(guild_id);

    let Some(level) = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
    else {
        let snapshot = player.snapshot().await;
        return respond_embed(ctx, command, embeds::create_volume_embed(snapshot.volume), false).await;
    };

    match player.set_volume(level.clamp(0, i64::from(u8::MAX)) as u8).await {
        Ok(()) => respond_text(ctx, command, &format!("🔊 Volumen ajustado a {}%", level), false).await,
        Err(e) => respond_text(ctx, command, &format!("❌ {}", e), true).await,
    }
}

async fn handle_leave(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    if bot.bot_voice_channel(ctx, guild_id).await.is_none() {
        return respond_text(ctx, command, "❌ El bot no está conectado a un canal de voz", true).await;
    }

    bot.teardown(ctx, guild_id).await?;
    respond_text(ctx, command, "👋 Desconectado del canal de voz", false).await
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let page = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "page")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(1)
        .max(1) as usize;

    let snapshot = bot.registry.get_or_create(guild_id).snapshot().await;
    respond_embed(ctx, command, embeds::create_queue_embed(&snapshot, page), false).await
}

async fn handle_nowplaying(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let snapshot = match bot.registry.get(guild_id) {
        Some(player) => Some(player.snapshot().await),
        None => None,
    };

    match snapshot.as_ref().and_then(embeds::create_current_track_embed) {
        Some(embed) => respond_embed(ctx, command, embed, false).await,
        None => respond_text(ctx, command, "❌ No hay nada reproduciéndose actualmente", true).await,
    }
}

async fn handle_ping(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let start = Instant::now();
    respond_text(ctx, command, "🏓 Pong!", false).await?;

    edit_text(
        ctx,
        command,
        &format!("🏓 Pong! Latencia: {}ms", start.elapsed().as_millis()),
    )
    .await
}

// Funciones auxiliares

async fn with_player<F, Fut, T>(bot: &MusicBot, guild_id: GuildId, f: F) -> Result<T, PlayerError>
where
    F: FnOnce(std::sync::Arc<GuildPlayer>) -> Fut,
    Fut: std::future::Future<Output = Result<T, PlayerError>>,
{
    match bot.registry.get(guild_id) {
        Some(player) => f(player).await,
        None => Err(PlayerError::TransportUnavailable),
    }
}

/// Los comandos de transporte requieren compartir canal con el bot
async fn ensure_same_channel(
    ctx: &Context,
    bot: &MusicBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<(), String> {
    let user_channel = get_user_voice_channel(ctx, guild_id, user_id)
        .ok_or_else(|| "❌ Debes estar en un canal de voz".to_string())?;

    match bot.bot_voice_channel(ctx, guild_id).await {
        Some(bot_channel) if bot_channel != user_channel => {
            Err("❌ Debes estar en el mismo canal de voz que el bot".to_string())
        }
        _ => Ok(()),
    }
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

async fn respond_text(ctx: &Context, command: &CommandInteraction, content: &str, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

async fn respond_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

async fn edit_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

async fn edit_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::Track;

    fn outcome(titles: &[&str]) -> EnqueueOutcome {
        let tracks: Vec<Track> = titles
            .iter()
            .map(|t| Track::new(*t, format!("https://example.com/{}", t), UserId::new(1)))
            .collect();
        EnqueueOutcome {
            is_playlist: tracks.len() > 1,
            collection_name: None,
            queue_len: tracks.len(),
            tracks,
        }
    }

    #[test]
    fn test_play_reply_for_single_track() {
        let single = outcome(&["A"]);

        assert_eq!(play_reply(&single, true, PlaybackStatus::Playing), PlayReply::Loading);
        assert_eq!(play_reply(&single, false, PlaybackStatus::Playing), PlayReply::TrackAdded);
        assert_eq!(play_reply(&single, false, PlaybackStatus::Idle), PlayReply::TrackAdded);
    }

    #[test]
    fn test_play_reply_when_every_track_failed_to_start() {
        assert_eq!(play_reply(&outcome(&["A"]), true, PlaybackStatus::Idle), PlayReply::Failed);
        // La playlist se informa igual; los fallos llegan como avisos al canal
        assert_eq!(
            play_reply(&outcome(&["A", "B"]), true, PlaybackStatus::Idle),
            PlayReply::Playlist
        );
    }
}
