//! Configuración del bot cargada desde variables de entorno (y `.env`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::equalizer::{EqPresets, DEFAULT_PRESET};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Binarios externos
    pub ytdlp_path: String,
    pub ffmpeg_path: String,

    // Audio
    pub default_volume: f32,
    pub default_equalizer: String,
    pub max_playlist_size: usize,

    // Desconexión por inactividad
    pub idle_timeout_secs: u64,

    // Health check HTTP
    pub enable_health_server: bool,
    pub health_port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no configurado")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no configurado")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            default_equalizer: std::env::var("DEFAULT_EQUALIZER")
                .unwrap_or_else(|_| DEFAULT_PRESET.to_string())
                .to_lowercase(),
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "180".to_string()) // 3 minutos
                .parse()?,

            enable_health_server: std::env::var("ENABLE_HEALTH_SERVER")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            // Las plataformas de hosting suelen inyectar PORT
            health_port: std::env::var("HEALTH_PORT")
                .or_else(|_| std::env::var("PORT"))
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token must not be empty
    /// - Volume must be between 0.0 and 1.0
    /// - Default equalizer must be a known preset
    /// - Playlist size and idle timeout must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if EqPresets::get(&self.default_equalizer).is_none() {
            anyhow::bail!("Unknown default equalizer preset: {}", self.default_equalizer);
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Binaries: {} / {}\n  \
            Audio: {}% vol, EQ={}, {} max playlist\n  \
            Idle disconnect: {}\n  \
            Health server: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.ytdlp_path,
            self.ffmpeg_path,
            (self.default_volume * 100.0).round() as u32,
            self.default_equalizer,
            self.max_playlist_size,
            humantime::format_duration(self.idle_timeout()),
            if self.enable_health_server {
                format!("port {}", self.health_port)
            } else {
                "disabled".to_string()
            }
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),

            default_volume: 0.5,
            default_equalizer: DEFAULT_PRESET.to_string(),
            max_playlist_size: 100,

            idle_timeout_secs: 180,

            enable_health_server: true,
            health_port: 10000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            application_id: 1,
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_are_valid_once_token_is_set() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let loud = Config {
            default_volume: 1.5,
            ..valid()
        };
        assert!(loud.validate().is_err());

        let unknown_eq = Config {
            default_equalizer: "karaoke".to_string(),
            ..valid()
        };
        assert!(unknown_eq.validate().is_err());

        let no_timeout = Config {
            idle_timeout_secs: 0,
            ..valid()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let summary = valid().summary();
        assert!(!summary.contains("token"));
        assert!(summary.contains("3m"));
        assert!(summary.contains("port 10000"));
    }
}
