use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use songbird::{
    input::{ChildContainer, HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{
    process::{Command, Stdio},
    sync::{Arc, Weak},
};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::audio::{equalizer::AudioTransform, player::GuildPlayer};

/// Número de secuencia de cada llamada a `AudioSink::play`
pub type PlayId = u64;

/// Callback de fin de pista.
///
/// El sink lo dispara exactamente una vez por cada `play` aceptado, tanto si la
/// pista termina sola, como si se detuvo o falló. Si `play` devuelve error el
/// callback se descarta sin dispararse.
pub struct TrackCompletion {
    player: Weak<GuildPlayer>,
    play_id: PlayId,
}

impl TrackCompletion {
    pub(crate) fn new(player: Weak<GuildPlayer>, play_id: PlayId) -> Self {
        Self { player, play_id }
    }

    pub fn play_id(&self) -> PlayId {
        self.play_id
    }

    /// Procesa el fin de pista y espera a que termine el avance que provoque
    pub async fn complete(self, error: Option<String>) {
        if let Some(player) = self.player.upgrade() {
            player.handle_completion(self.play_id, error).await;
        } else {
            debug!("Reproductor ya eliminado, ignorando fin de pista {}", self.play_id);
        }
    }

    /// Como `complete`, pero en una tarea aparte para no bloquear el hilo de audio
    pub fn fire(self, error: Option<String>) {
        tokio::spawn(self.complete(error));
    }
}

/// Transporte de audio hacia el canal de voz
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Empieza a reproducir `locator` reemplazando cualquier pista previa
    async fn play(
        &self,
        locator: &str,
        transform: &AudioTransform,
        volume: f32,
        on_end: TrackCompletion,
    ) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Detiene la pista actual; dispara su callback de fin
    async fn stop(&self) -> Result<()>;

    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;
}

/// Opciones de ffmpeg para streams remotos
const FFMPEG_BEFORE_OPTIONS: [&str; 7] = [
    "-reconnect",
    "1",
    "-reconnect_streamed",
    "1",
    "-reconnect_delay_max",
    "5",
    "-nostdin",
];

/// Sink sobre una llamada de songbird
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    ffmpeg: String,
    http: reqwest::Client,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(call: Arc<Mutex<Call>>, ffmpeg: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            call,
            ffmpeg: ffmpeg.into(),
            http,
            current: SyncMutex::new(None),
        }
    }

    fn current_track(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    /// Los presets sin filtro se transmiten directo; el resto pasa por ffmpeg
    fn create_input(&self, locator: &str, transform: &AudioTransform) -> Result<Input> {
        match transform.filter_chain() {
            None => Ok(HttpRequest::new(self.http.clone(), locator.to_string()).into()),
            Some(filter) => {
                let child = Command::new(&self.ffmpeg)
                    .args(ffmpeg_args(locator, filter))
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .spawn()
                    .with_context(|| format!("Error al iniciar {}", self.ffmpeg))?;

                Ok(ChildContainer::from(child).into())
            }
        }
    }
}

fn ffmpeg_args(locator: &str, filter: &str) -> Vec<String> {
    let mut args: Vec<String> = FFMPEG_BEFORE_OPTIONS.iter().map(|s| s.to_string()).collect();
    args.extend(
        [
            "-i", locator, "-vn", "-af", filter, "-ac", "2", "-ar", "48000", "-f", "flac", "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(
        &self,
        locator: &str,
        transform: &AudioTransform,
        volume: f32,
        on_end: TrackCompletion,
    ) -> Result<()> {
        let input = self.create_input(locator, transform)?;

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        let notifier = Arc::new(CompletionNotifier {
            completion: SyncMutex::new(Some(on_end)),
        });

        let registered = handle
            .set_volume(volume)
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::End), TrackEndNotifier(notifier.clone())))
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::Error), TrackEndNotifier(notifier)));

        if let Err(e) = registered {
            let _ = handle.stop();
            anyhow::bail!("Error al configurar la pista: {:?}", e);
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let track = self.current_track().context("No hay pista activa")?;
        track.pause().map_err(|e| anyhow::anyhow!("Error al pausar: {:?}", e))?;
        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let track = self.current_track().context("No hay pista activa")?;
        track.play().map_err(|e| anyhow::anyhow!("Error al reanudar: {:?}", e))?;
        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(track) = self.current.lock().take() {
            // Una pista ya terminada devuelve error; no importa
            let _ = track.stop();
        }
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        if let Some(track) = self.current_track() {
            track
                .set_volume(volume)
                .map_err(|e| anyhow::anyhow!("Error al ajustar volumen: {:?}", e))?;
            info!("🔊 Volumen ajustado a {}%", (volume * 100.0).round() as u8);
        }
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        match self.current_track() {
            Some(track) => matches!(track.get_info().await.map(|info| info.playing), Ok(PlayMode::Play)),
            None => false,
        }
    }

    async fn is_paused(&self) -> bool {
        match self.current_track() {
            Some(track) => matches!(track.get_info().await.map(|info| info.playing), Ok(PlayMode::Pause)),
            None => false,
        }
    }
}

/// Comparte el callback entre los eventos End y Error para dispararlo una sola vez
struct CompletionNotifier {
    completion: SyncMutex<Option<TrackCompletion>>,
}

struct TrackEndNotifier(Arc<CompletionNotifier>);

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            }),
            _ => None,
        };

        if let Some(ref e) = error {
            error!("❌ Error en pista: {}", e);
        }

        if let Some(completion) = self.0.completion.lock().take() {
            debug!("Track terminado (play {}), notificando al reproductor", completion.play_id());
            completion.fire(error);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_args_carry_filter_and_reconnect() {
        let args = ffmpeg_args("https://cdn.example.com/a.webm", "equalizer=f=32:width_type=o:width=1:g=6");

        assert_eq!(&args[..7], &FFMPEG_BEFORE_OPTIONS.map(String::from)[..]);
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "https://cdn.example.com/a.webm");
        let af = args.iter().position(|a| a == "-af").unwrap();
        assert_eq!(args[af + 1], "equalizer=f=32:width_type=o:width=1:g=6");
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }
}
