use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::sources::RawEntry;

/// Título usado cuando el gateway no devuelve uno
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Descriptor inmutable de una pista encolada.
///
/// `canonical_reference` es lo único que se usa para volver a resolver el audio;
/// `source_locator` se conserva sólo como dato informativo y nunca se reproduce.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    source_locator: String,
    canonical_reference: String,
    duration_secs: u64,
    thumbnail: Option<String>,
    requested_by: UserId,
    added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, canonical_reference: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            source_locator: String::new(),
            canonical_reference: canonical_reference.into(),
            duration_secs: 0,
            thumbnail: None,
            requested_by,
            added_at: Utc::now(),
        }
    }

    /// Construye la pista a partir de una entrada cruda del gateway
    pub fn from_entry(entry: RawEntry, requested_by: UserId) -> Self {
        Self {
            title: entry
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            source_locator: entry.source_locator.unwrap_or_default(),
            canonical_reference: entry.canonical_reference,
            duration_secs: entry.duration_secs.unwrap_or(0),
            thumbnail: entry.thumbnail,
            requested_by,
            added_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn canonical_reference(&self) -> &str {
        &self.canonical_reference
    }
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// La referencia debe ser una URL http(s); un ID suelto no sirve para re-extraer
    pub fn has_fetchable_reference(&self) -> bool {
        is_fetchable_reference(&self.canonical_reference)
    }

    /// Duración en `M:SS` o `H:MM:SS`, `Unknown` si no se conoce
    pub fn format_duration(&self) -> String {
        match self.duration() {
            Some(duration) => format_duration(duration),
            None => "Unknown".to_string(),
        }
    }

    /// Enlace markdown si la referencia es una URL, si no sólo el título
    pub fn display_link(&self) -> String {
        if self.has_fetchable_reference() {
            format!("[{}]({})", self.title, self.canonical_reference)
        } else {
            self.title.clone()
        }
    }
}

pub fn is_fetchable_reference(reference: &str) -> bool {
    url::Url::parse(reference)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Cola FIFO de pistas pendientes. Nunca contiene la pista actual.
#[derive(Debug, Default, Clone)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega las pistas al final respetando el orden de entrada
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.items.len();
        self.items.extend(tracks);
        let added = self.items.len() - before;
        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Extrae la cabeza de la cola (FIFO)
    pub fn pop_front(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(ref track) = next {
            debug!("➡️ Siguiente en cola (FIFO): {}", track.title());
        }
        next
    }

    /// Reinserta una pista en la posición 0 (loop de la pista actual)
    pub fn push_front(&mut self, track: Track) {
        debug!("🔂 Reinsertando al frente: {}", track.title());
        self.items.push_front(track);
    }

    /// Vacía la cola y devuelve cuántas pistas se eliminaron
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        info!("🗑️ Cola limpiada ({} canciones)", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(Track::duration).sum()
    }
}
