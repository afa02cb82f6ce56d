use serenity::{
    all::{Permissions, Timestamp, UserId},
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{
        equalizer::{EqPreset, EqPresets},
        player::{EnqueueOutcome, PlaybackStatus, PlayerSnapshot},
        queue::{format_duration, Track},
    },
    error::PlayerError,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Music";

/// Canciones que se listan al agregar una playlist
const PLAYLIST_PREVIEW_LEN: usize = 10;

pub const QUEUE_PAGE_SIZE: usize = 10;

/// Permisos que pide el enlace de invitación
pub const INVITE_PERMISSIONS: Permissions = Permissions::CONNECT
    .union(Permissions::SPEAK)
    .union(Permissions::SEND_MESSAGES)
    .union(Permissions::EMBED_LINKS)
    .union(Permissions::READ_MESSAGE_HISTORY);

/// Anuncio de inicio de pista
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.display_link()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", track.format_duration(), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Respuesta a `/nowplaying`: la pista actual con el estado del reproductor
pub fn create_current_track_embed(snapshot: &PlayerSnapshot) -> Option<CreateEmbed> {
    let track = snapshot.current.as_ref()?;

    let status = match snapshot.status {
        PlaybackStatus::Paused => "⏸️ En pausa",
        _ if snapshot.loop_current => "🔂 Repitiendo",
        _ => "▶️ Sonando",
    };

    Some(
        create_now_playing_embed(track)
            .field("📡 Estado", status, true)
            .field("🎛️ Ecualizador", snapshot.equalizer.display_name, true)
            .field("🔊 Volumen", format!("{}%", volume_percent(snapshot.volume)), true)
            .field("📋 En cola", snapshot.queue.len().to_string(), true),
    )
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}** se ha agregado a la cola", track.display_link()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", track.format_duration(), true)
        .field("📍 Posición", position.to_string(), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    let added_at = Timestamp::from_unix_timestamp(track.added_at().timestamp()).unwrap_or_else(|_| Timestamp::now());

    embed
        .timestamp(added_at)
        .footer(CreateEmbedFooter::new("🎵 Se reproducirá automáticamente si no hay música sonando"))
}

/// Crea un embed para mostrar que una playlist fue agregada
pub fn create_playlist_added_embed(outcome: &EnqueueOutcome) -> CreateEmbed {
    let name = outcome.collection_name.as_deref().unwrap_or("Playlist");
    let total: Duration = outcome.tracks.iter().filter_map(Track::duration).sum();

    let mut embed = CreateEmbed::default()
        .title(format!("📋 {}", name))
        .description(format!(
            "Se agregaron **{} canciones** a la cola\n\n{}",
            outcome.tracks.len(),
            playlist_listing(&outcome.tracks)
        ))
        .color(colors::MUSIC_PURPLE)
        .field("📊 Canciones agregadas", outcome.tracks.len().to_string(), true)
        .field("📋 En cola", outcome.queue_len.to_string(), true);

    if total > Duration::ZERO {
        embed = embed.field("⏱️ Duración", format_duration(total), true);
    }

    embed
        .footer(CreateEmbedFooter::new("🎵 Usa /queue para ver todas las canciones"))
        .timestamp(Timestamp::now())
}

/// Las primeras canciones numeradas y un resumen del resto
fn playlist_listing(tracks: &[Track]) -> String {
    let mut listing: Vec<String> = tracks
        .iter()
        .take(PLAYLIST_PREVIEW_LEN)
        .enumerate()
        .map(|(i, track)| format!("**{}**. {}", i + 1, track.title()))
        .collect();

    if tracks.len() > PLAYLIST_PREVIEW_LEN {
        listing.push(format!("*... y {} más*", tracks.len() - PLAYLIST_PREVIEW_LEN));
    }

    listing.join("\n")
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &PlayerSnapshot, page: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.queue.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let mut embed = embed;

    if let Some(current) = &snapshot.current {
        let status = match (snapshot.status, snapshot.loop_current) {
            (PlaybackStatus::Paused, _) => "⏸️",
            (_, true) => "🔂",
            _ => "▶️",
        };

        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}** `[{}]`", current.display_link(), current.format_duration()),
            false,
        );
    }

    let queue_page = snapshot.page(page, QUEUE_PAGE_SIZE);
    if !queue_page.items.is_empty() {
        let description: String = queue_page
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "**{}**. {} `[{}]`\n",
                    queue_page.first_position + i,
                    item.title(),
                    item.format_duration()
                )
            })
            .collect();

        embed = embed.field("Próximas canciones", description, false);
    }

    let mut info = format!("**Total:** {} canciones", snapshot.queue.len());
    if snapshot.queue_duration > Duration::ZERO {
        info.push_str(&format!(" • **Duración:** {}", format_duration(snapshot.queue_duration)));
    }
    if snapshot.loop_current {
        info.push_str(" • 🔂 **Repetir**");
    }
    embed = embed.field("Información", info, false);

    let footer = if queue_page.total_pages > 1 {
        format!(
            "Página {} de {} • Guild Music",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed.footer(CreateEmbedFooter::new(footer)).timestamp(Timestamp::now())
}

/// Crea un embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Guild Music - Comandos")
        .color(colors::INFO_BLUE)
        .description("Bot de música para tu servidor")
        .field(
            "🎵 Reproducción",
            "• `/play <canción>` - Reproduce una canción o playlist\n\
            • `/pause` - Pausa la reproducción\n\
            • `/resume` - Reanuda la reproducción\n\
            • `/skip` - Salta la canción actual\n\
            • `/stop` - Detiene y limpia la cola",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue [página]` - Muestra la cola\n\
            • `/nowplaying` - Muestra la canción actual\n\
            • `/loop <on|off>` - Repite la canción actual\n\
            • `/clear` - Limpia la cola",
            false,
        )
        .field(
            "🎛️ Audio",
            "• `/volume [nivel]` - Ajusta el volumen (0-100)\n\
            • `/equalizer [preset]` - Aplica un ecualizador",
            false,
        )
        .field(
            "🔊 Conexión",
            "• `/leave` - Desconecta del canal\n\
            • `/ping` - Latencia del bot",
            false,
        )
        .field(
            "ℹ️ General",
            "• `/invite` - Enlace de invitación\n\
            • `/about` - Información del bot",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// URL OAuth2 para agregar el bot con los permisos de voz y mensajes
pub fn invite_url(bot_id: UserId) -> String {
    format!(
        "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot%20applications.commands",
        bot_id,
        INVITE_PERMISSIONS.bits()
    )
}

pub fn create_invite_embed(bot_id: UserId) -> CreateEmbed {
    CreateEmbed::default()
        .title("📨 ¡Invítame!")
        .description("Usa el enlace para agregarme a tu servidor")
        .field("🔗 Enlace", format!("[Haz clic aquí]({})", invite_url(bot_id)), false)
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Servidores conectados, reproductores activos y funciones del bot
pub fn create_about_embed(servers: usize, active_players: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Acerca de Guild Music")
        .description("Bot de música con cola independiente por servidor")
        .field("🏠 Servidores", servers.to_string(), true)
        .field("🎶 Reproductores activos", active_players.to_string(), true)
        .field("📦 Versión", env!("CARGO_PKG_VERSION"), true)
        .field(
            "✨ Funciones",
            "• Música de YouTube, SoundCloud y más\n\
            • Playlists y gestión de cola\n\
            • Ecualizador, volumen y repetición",
            false,
        )
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Lista de presets con el activo marcado
pub fn create_equalizer_embed(current: &EqPreset) -> CreateEmbed {
    let presets: String = EqPresets::list()
        .iter()
        .map(|preset| {
            format!(
                "{} **{}** (`{}`) - {}\n",
                if preset.key == current.key { "▶️" } else { "•" },
                preset.display_name,
                preset.key,
                preset.description
            )
        })
        .collect();

    CreateEmbed::default()
        .title("🎛️ Ecualizador")
        .description(format!("**Actual:** {}\n\n{}", current.display_name, presets))
        .field("Uso", "`/equalizer <preset>` - Se aplica desde la próxima canción", false)
        .color(colors::MUSIC_PURPLE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de volumen con indicador visual
pub fn create_volume_embed(volume: f32) -> CreateEmbed {
    let percent = volume_percent(volume);
    let emoji = match percent {
        0 => "🔈",
        1..=50 => "🔉",
        _ => "🔊",
    };

    CreateEmbed::default()
        .title(format!("{} Volumen", emoji))
        .description(format!("**{}%**", percent))
        .field("📊 Nivel", create_volume_bar(volume), false)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new("💡 Usa /volume <nivel> para ajustar"))
        .timestamp(Timestamp::now())
}

/// Aviso en el canal cuando una pista no se pudo reproducir
pub fn create_playback_failed_embed(track: &Track, error: &PlayerError) -> CreateEmbed {
    CreateEmbed::default()
        .title("⚠️ No se pudo reproducir")
        .description(format!("**{}**\n\n{}\n\nSaltando a la siguiente canción...", track.title(), error))
        .color(colors::WARNING_ORANGE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn volume_percent(volume: f32) -> u8 {
    (volume * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Crea una barra visual de volumen
fn create_volume_bar(volume: f32) -> String {
    let segments = 20;
    let filled = ((volume.clamp(0.0, 1.0) * segments as f32).round() as usize).min(segments);

    format!("`[{}{}]`", "█".repeat(filled), "▒".repeat(segments - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::model::id::UserId;

    fn tracks(n: usize) -> Vec<Track> {
        (1..=n)
            .map(|i| Track::new(format!("Song {}", i), format!("https://example.com/{}", i), UserId::new(1)))
            .collect()
    }

    #[test]
    fn test_playlist_listing_truncates() {
        let listing = playlist_listing(&tracks(12));

        assert_eq!(listing.lines().count(), 11);
        assert!(listing.starts_with("**1**. Song 1"));
        assert!(listing.contains("**10**. Song 10"));
        assert!(!listing.contains("Song 11"));
        assert!(listing.ends_with("*... y 2 más*"));
    }

    #[test]
    fn test_playlist_listing_short() {
        let listing = playlist_listing(&tracks(3));
        assert_eq!(listing.lines().count(), 3);
        assert!(!listing.contains("más"));
    }

    #[test]
    fn test_invite_url_requests_voice_permissions() {
        let url = invite_url(UserId::new(42));

        assert!(url.starts_with("https://discord.com/api/oauth2/authorize?client_id=42&"));
        assert!(url.ends_with("&scope=bot%20applications.commands"));
        // connect + speak + send_messages + embed_links + read_message_history
        assert!(url.contains("&permissions=3229696&"));
        assert!(!INVITE_PERMISSIONS.contains(Permissions::ADMINISTRATOR));
    }

    #[test]
    fn test_volume_bar() {
        assert_eq!(create_volume_bar(0.5), format!("`[{}{}]`", "█".repeat(10), "▒".repeat(10)));
        assert_eq!(create_volume_bar(1.0), format!("`[{}]`", "█".repeat(20)));
        assert_eq!(volume_percent(0.8), 80);
    }
}
