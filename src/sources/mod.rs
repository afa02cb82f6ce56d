//! # Sources
//!
//! Gateway de extracción: convierte una consulta o URL en entradas de pista y,
//! justo antes de reproducir, renueva el locator de audio de una pista.
//!
//! Los locators devueltos por [`ExtractionGateway::resolve_locator`] caducan y
//! son de un solo uso; nunca se guardan en la cola.

pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;

pub use ytdlp::YtDlpGateway;

use crate::audio::queue::UNKNOWN_TITLE;

/// Entrada cruda tal como la devuelve el gateway
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    /// Referencia estable para volver a extraer el audio (puede estar vacía)
    pub canonical_reference: String,
    pub source_locator: Option<String>,
    pub duration_secs: Option<u64>,
    pub thumbnail: Option<String>,
}

impl RawEntry {
    /// Las extracciones "planas" de playlists no traen título o duración
    pub fn needs_full_metadata(&self) -> bool {
        let missing_title = self
            .title
            .as_deref()
            .map(|t| t.trim().is_empty() || t == UNKNOWN_TITLE)
            .unwrap_or(true);
        let missing_duration = self.duration_secs.unwrap_or(0) == 0;

        missing_title || missing_duration
    }
}

/// Resultado de resolver una consulta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Entradas en el orden en que deben encolarse
    pub entries: Vec<RawEntry>,
    /// Título de la colección (playlist o búsqueda) si la hubo
    pub collection_title: Option<String>,
    pub is_collection: bool,
}

impl Resolution {
    pub fn single(entry: RawEntry) -> Self {
        Self {
            entries: vec![entry],
            collection_title: None,
            is_collection: false,
        }
    }

    pub fn collection(title: Option<String>, entries: Vec<RawEntry>) -> Self {
        Self {
            entries,
            collection_title: title,
            is_collection: true,
        }
    }
}

/// Servicio externo de extracción de metadatos y audio.
///
/// Ambas llamadas pueden tardar segundos; el reproductor las invoca fuera de
/// cualquier hilo de audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    /// Resuelve una consulta o URL en una o varias entradas
    async fn resolve(&self, query: &str) -> Result<Resolution>;

    /// Obtiene un locator de audio fresco para una referencia canónica
    async fn resolve_locator(&self, canonical_reference: &str) -> Result<String>;
}
