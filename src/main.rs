use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod health;
mod sources;
mod ui;

use crate::audio::{equalizer::EqPresets, player::PlayerDefaults, registry::PlayerRegistry};
use crate::bot::{events::DiscordAnnouncer, MusicBot};
use crate::config::Config;
use crate::sources::YtDlpGateway;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Music v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    if config.enable_health_server {
        if let Err(e) = health::spawn(config.health_port).await {
            warn!("⚠️ Servidor de health check no disponible: {:?}", e);
        }
    }

    let gateway = Arc::new(YtDlpGateway::new(config.ytdlp_path.clone(), config.max_playlist_size));
    match gateway.verify().await {
        Ok(version) => info!("✅ yt-dlp {}", version),
        Err(e) => warn!("⚠️ yt-dlp no disponible, las búsquedas fallarán: {:?}", e),
    }

    let announcer = Arc::new(DiscordAnnouncer::new(Arc::new(Http::new(&config.discord_token))));
    let defaults = PlayerDefaults {
        volume: config.default_volume,
        equalizer: EqPresets::resolve(&config.default_equalizer)?,
    };
    let registry = Arc::new(PlayerRegistry::new(gateway, announcer.clone(), defaults));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES | GatewayIntents::GUILD_MESSAGES;

    // Crear handler del bot
    let handler = MusicBot::new(config.clone(), registry, announcer);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    dotenvy::dotenv().ok();
    let ytdlp_path = std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string());
    let ffmpeg_path = std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string());

    // Verificar dependencias críticas
    let yt_dlp = YtDlpGateway::new(ytdlp_path, 1).verify().await;

    let ffmpeg = async_process::Command::new(&ffmpeg_path)
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.is_ok() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
