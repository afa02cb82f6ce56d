use thiserror::Error;

/// Errores del reproductor por guild.
///
/// Ninguno es fatal: en el peor caso el reproductor queda en `Idle`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    /// La consulta no produjo ninguna entrada reproducible. La cola no cambia.
    #[error("No se pudo cargar la pista: {0}")]
    ExtractionFailed(String),

    /// Preset de ecualizador inexistente.
    #[error("Preset de ecualizador desconocido: {0}")]
    UnknownPreset(String),

    /// El gateway no pudo renovar el locator o el sink lo rechazó.
    /// Se recupera internamente saltando a la siguiente pista.
    #[error("Error de reproducción: {0}")]
    PlaybackError(String),

    /// No hay conexión de voz activa para este guild.
    #[error("El bot no está conectado a un canal de voz")]
    TransportUnavailable,

    #[error("El volumen debe estar entre 0 y 100, recibido: {0}")]
    InvalidVolume(u8),
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
