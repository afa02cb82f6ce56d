use async_trait::async_trait;
use serenity::model::id::{GuildId, UserId};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        equalizer::{EqPreset, EqPresets},
        queue::{Track, TrackQueue},
        sink::{AudioSink, PlayId, TrackCompletion},
    },
    error::{PlayerError, PlayerResult},
    sources::{ExtractionGateway, RawEntry},
};

/// Estado de reproducción de un guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
}

/// Notificaciones que el reproductor emite hacia la capa de presentación
#[async_trait]
pub trait PlaybackAnnouncer: Send + Sync {
    async fn now_playing(&self, guild_id: GuildId, track: &Track);

    async fn playback_failed(&self, guild_id: GuildId, track: &Track, error: &PlayerError);
}

/// Valores iniciales de cada reproductor nuevo
#[derive(Debug, Clone, Copy)]
pub struct PlayerDefaults {
    pub volume: f32,
    pub equalizer: &'static EqPreset,
}

/// Resultado de `enqueue`
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub tracks: Vec<Track>,
    pub is_playlist: bool,
    pub collection_name: Option<String>,
    /// Longitud de la cola tras agregar
    pub queue_len: usize,
}

/// Copia del estado para las vistas de cola y "now playing"
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub status: PlaybackStatus,
    pub loop_current: bool,
    pub equalizer: &'static EqPreset,
    pub volume: f32,
    pub queue_duration: Duration,
}

impl PlayerSnapshot {
    /// Obtiene una página específica de la cola (base 1)
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let total_pages = self.queue.len().div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(self.queue.len());

        QueuePage {
            items: self.queue.get(start..end).map(<[Track]>::to_vec).unwrap_or_default(),
            first_position: start + 1,
            current_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

/// Aviso pendiente de enviar una vez liberado el lock del guild
enum Notice {
    NowPlaying(Track),
    Failed(Track, PlayerError),
}

struct PlayerState {
    queue: TrackQueue,
    current: Option<Track>,
    status: PlaybackStatus,
    loop_current: bool,
    equalizer: &'static EqPreset,
    volume: f32,
    transport: Option<Arc<dyn AudioSink>>,
    /// `play` cuyo fin de pista todavía debe provocar un avance
    active_play: Option<PlayId>,
    next_play_id: PlayId,
}

/// Reproductor de un guild: cola, pista actual y máquina de estados de avance.
///
/// Todo el estado vive detrás de un único `tokio::sync::Mutex`. El avance
/// mantiene el lock durante la consulta al gateway, de modo que un avance
/// provocado por un comando y otro provocado por el fin de pista nunca se
/// entrelazan. Los guilds no comparten ningún lock entre sí.
pub struct GuildPlayer {
    guild_id: GuildId,
    gateway: Arc<dyn ExtractionGateway>,
    announcer: Arc<dyn PlaybackAnnouncer>,
    state: Mutex<PlayerState>,
    this: Weak<GuildPlayer>,
}

impl GuildPlayer {
    pub fn new(
        guild_id: GuildId,
        gateway: Arc<dyn ExtractionGateway>,
        announcer: Arc<dyn PlaybackAnnouncer>,
        defaults: PlayerDefaults,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            guild_id,
            gateway,
            announcer,
            state: Mutex::new(PlayerState {
                queue: TrackQueue::new(),
                current: None,
                status: PlaybackStatus::Idle,
                loop_current: false,
                equalizer: defaults.equalizer,
                volume: defaults.volume,
                transport: None,
                active_play: None,
                next_play_id: 1,
            }),
            this: this.clone(),
        })
    }

    /// Asocia la conexión de voz; se re-valida en cada comando
    pub async fn attach_transport(&self, sink: Arc<dyn AudioSink>) {
        self.state.lock().await.transport = Some(sink);
        debug!("🔌 Transporte asociado en guild {}", self.guild_id);
    }

    pub async fn detach_transport(&self) -> Option<Arc<dyn AudioSink>> {
        self.state.lock().await.transport.take()
    }

    pub async fn has_transport(&self) -> bool {
        self.state.lock().await.transport.is_some()
    }

    /// Resuelve la consulta y agrega las pistas aceptadas al final de la cola.
    ///
    /// Las entradas sin metadatos suficientes se resuelven una vez más; las que
    /// no producen una referencia se descartan. Sólo falla si no queda ninguna.
    pub async fn enqueue(&self, query: &str, requester: UserId) -> PlayerResult<EnqueueOutcome> {
        info!("🔍 Cargando '{}' en guild {}", query, self.guild_id);

        // Sin lock: la extracción puede tardar varios segundos
        let resolution = self
            .gateway
            .resolve(query)
            .await
            .map_err(|e| PlayerError::ExtractionFailed(e.to_string()))?;

        let mut tracks = Vec::with_capacity(resolution.entries.len());
        for entry in resolution.entries {
            if let Some(entry) = self.complete_entry(entry).await {
                tracks.push(Track::from_entry(entry, requester));
            }
        }

        if tracks.is_empty() {
            return Err(PlayerError::ExtractionFailed(format!(
                "'{}' no produjo ninguna pista reproducible",
                query
            )));
        }

        let queue_len = {
            let mut state = self.state.lock().await;
            state.queue.extend(tracks.iter().cloned());
            state.queue.len()
        };

        Ok(EnqueueOutcome {
            is_playlist: tracks.len() > 1,
            collection_name: resolution.is_collection.then_some(resolution.collection_title).flatten(),
            tracks,
            queue_len,
        })
    }

    async fn complete_entry(&self, entry: RawEntry) -> Option<RawEntry> {
        if entry.canonical_reference.trim().is_empty() {
            warn!("⚠️ Entrada sin URL descartada: {:?}", entry.title);
            return None;
        }

        if !entry.needs_full_metadata() {
            return Some(entry);
        }

        debug!("📊 Extrayendo info completa de: {}", entry.canonical_reference);
        match self.gateway.resolve(&entry.canonical_reference).await {
            Ok(full) => Some(
                full.entries
                    .into_iter()
                    .find(|e| !e.canonical_reference.trim().is_empty())
                    .unwrap_or(entry),
            ),
            Err(e) => {
                warn!("⚠️ No se pudo extraer info de {}: {}", entry.canonical_reference, e);
                None
            }
        }
    }

    /// Inicia el avance si no hay nada sonando y la cola tiene pistas.
    /// Devuelve `true` si se intentó avanzar.
    pub async fn begin_if_idle(&self) -> PlayerResult<bool> {
        let mut state = self.state.lock().await;

        if state.status != PlaybackStatus::Idle || state.queue.is_empty() {
            return Ok(false);
        }
        if state.transport.is_none() {
            return Err(PlayerError::TransportUnavailable);
        }

        let notices = self.advance(&mut state, false).await;
        drop(state);

        self.announce(notices).await;
        Ok(true)
    }

    pub async fn pause(&self) -> PlayerResult<bool> {
        let mut state = self.state.lock().await;
        let transport = Self::transport(&state)?;

        if state.status != PlaybackStatus::Playing {
            return Ok(false);
        }

        transport
            .pause()
            .await
            .map_err(|e| PlayerError::PlaybackError(e.to_string()))?;
        state.status = PlaybackStatus::Paused;
        Ok(true)
    }

    pub async fn resume(&self) -> PlayerResult<bool> {
        let mut state = self.state.lock().await;
        let transport = Self::transport(&state)?;

        if state.status != PlaybackStatus::Paused {
            return Ok(false);
        }

        transport
            .resume()
            .await
            .map_err(|e| PlayerError::PlaybackError(e.to_string()))?;
        state.status = PlaybackStatus::Playing;
        Ok(true)
    }

    /// Detiene la pista que está sonando; en pausa no hace nada.
    /// El avance lo hace el callback de fin de pista.
    pub async fn skip(&self) -> PlayerResult<bool> {
        let state = self.state.lock().await;
        let transport = Self::transport(&state)?;

        let Some(ref track) = state.current else {
            return Ok(false);
        };
        if state.status != PlaybackStatus::Playing {
            return Ok(false);
        }

        info!("⏭️ Saltando '{}' en guild {}", track.title(), self.guild_id);
        transport
            .stop()
            .await
            .map_err(|e| PlayerError::PlaybackError(e.to_string()))?;
        Ok(true)
    }

    /// Vacía la cola, descarta la pista actual y detiene el sink sin que su
    /// callback de fin vuelva a avanzar.
    pub async fn stop_all(&self) {
        let mut state = self.state.lock().await;

        state.queue.clear();
        state.current = None;
        state.status = PlaybackStatus::Idle;
        state.active_play = None;

        if let Some(transport) = state.transport.clone() {
            if let Err(e) = transport.stop().await {
                warn!("Error al detener el sink en guild {}: {:?}", self.guild_id, e);
            }
        }

        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    /// Vacía sólo la cola; la pista actual sigue sonando
    pub async fn clear_queue(&self) -> usize {
        self.state.lock().await.queue.clear()
    }

    /// Aplica desde la próxima pista que empiece, nunca a la que está sonando
    pub async fn set_equalizer(&self, key: &str) -> PlayerResult<&'static EqPreset> {
        let preset = EqPresets::resolve(key)?;
        self.state.lock().await.equalizer = preset;
        info!("🎛️ Preset '{}' seleccionado en guild {}", preset.key, self.guild_id);
        Ok(preset)
    }

    pub async fn set_loop(&self, enabled: bool) {
        self.state.lock().await.loop_current = enabled;
        info!(
            "{} en guild {}",
            if enabled { "🔂 Repetir canción activado" } else { "➡️ Repetición desactivada" },
            self.guild_id
        );
    }

    /// Volumen en porcentaje (0-100); afecta a la pista actual y a las siguientes
    pub async fn set_volume(&self, percent: u8) -> PlayerResult<()> {
        if percent > 100 {
            return Err(PlayerError::InvalidVolume(percent));
        }

        let mut state = self.state.lock().await;
        let volume = f32::from(percent) / 100.0;

        if state.status != PlaybackStatus::Idle {
            let transport = Self::transport(&state)?;
            transport
                .set_volume(volume)
                .await
                .map_err(|e| PlayerError::PlaybackError(e.to_string()))?;
        }

        state.volume = volume;
        Ok(())
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        let state = self.state.lock().await;
        PlayerSnapshot {
            current: state.current.clone(),
            queue: state.queue.to_vec(),
            status: state.status,
            loop_current: state.loop_current,
            equalizer: state.equalizer,
            volume: state.volume,
            queue_duration: state.queue.total_duration(),
        }
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.state.lock().await.status
    }

    /// Fin de pista notificado por el sink.
    ///
    /// Sólo avanza si `play_id` es la reproducción activa; así `stop_all` (que
    /// la anula) no provoca un nuevo avance.
    pub(crate) async fn handle_completion(&self, play_id: PlayId, error: Option<String>) {
        let mut state = self.state.lock().await;

        if state.active_play != Some(play_id) {
            debug!("Ignorando fin de pista obsoleto {} en guild {}", play_id, self.guild_id);
            return;
        }

        let mut notices = Vec::new();
        let failed = match (error, state.current.clone()) {
            (Some(e), Some(track)) => {
                warn!("❌ La pista '{}' falló en guild {}: {}", track.title(), self.guild_id, e);
                notices.push(Notice::Failed(track, PlayerError::PlaybackError(e)));
                true
            }
            _ => false,
        };

        // Una pista que falló no se repite aunque el loop esté activo
        notices.extend(self.advance(&mut state, failed).await);
        drop(state);

        self.announce(notices).await;
    }

    /// Protocolo de avance. Se ejecuta entero bajo el lock del guild; los
    /// avisos se devuelven para enviarlos fuera de él.
    async fn advance(&self, state: &mut MutexGuard<'_, PlayerState>, suppress_loop: bool) -> Vec<Notice> {
        let mut notices = Vec::new();
        state.active_play = None;
        state.status = PlaybackStatus::Idle;

        if let Some(finished) = state.current.take() {
            if state.loop_current && !suppress_loop {
                state.queue.push_front(finished);
            }
        }

        if state.transport.is_none() {
            warn!("Sin transporte en guild {}, reproducción detenida", self.guild_id);
            return notices;
        }

        // Cada pista rota se descarta una vez: la cola finita garantiza que termina
        while let Some(track) = state.queue.pop_front() {
            state.current = Some(track.clone());

            match self.start_track(state, &track).await {
                Ok(play_id) => {
                    state.active_play = Some(play_id);
                    state.status = PlaybackStatus::Playing;
                    info!("🎵 Reproduciendo '{}' en guild {}", track.title(), self.guild_id);
                    notices.push(Notice::NowPlaying(track));
                    return notices;
                }
                Err(e) => {
                    warn!("❌ Error al reproducir '{}' en guild {}: {}", track.title(), self.guild_id, e);
                    state.current = None;
                    notices.push(Notice::Failed(track, e));
                }
            }
        }

        info!("📭 Cola vacía en guild {}", self.guild_id);
        notices
    }

    async fn announce(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::NowPlaying(track) => self.announcer.now_playing(self.guild_id, &track).await,
                Notice::Failed(track, error) => {
                    self.announcer.playback_failed(self.guild_id, &track, &error).await
                }
            }
        }
    }

    /// Renueva el locator (nunca se reutiliza uno anterior) y lo entrega al sink
    async fn start_track(&self, state: &mut PlayerState, track: &Track) -> PlayerResult<PlayId> {
        if !track.has_fetchable_reference() {
            return Err(PlayerError::PlaybackError(format!(
                "Referencia no válida para extraer audio: '{}'",
                track.canonical_reference()
            )));
        }

        let transport = Self::transport(state)?;

        let locator = self
            .gateway
            .resolve_locator(track.canonical_reference())
            .await
            .map_err(|e| PlayerError::PlaybackError(e.to_string()))?;
        if locator.trim().is_empty() {
            return Err(PlayerError::PlaybackError("No se pudo extraer URL de audio".to_string()));
        }

        let play_id = state.next_play_id;
        state.next_play_id += 1;

        let transform = state.equalizer.transform();
        transport
            .play(&locator, &transform, state.volume, TrackCompletion::new(self.this.clone(), play_id))
            .await
            .map_err(|e| PlayerError::PlaybackError(e.to_string()))?;

        Ok(play_id)
    }

    fn transport(state: &PlayerState) -> PlayerResult<Arc<dyn AudioSink>> {
        state.transport.clone().ok_or(PlayerError::TransportUnavailable)
    }
}
