use crate::error::{PlayerError, PlayerResult};

/// Frecuencias centrales para el ecualizador de 10 bandas
const EQ_FREQUENCIES: [u32; 10] = [
    32,    // Sub-bass
    64,    // Bass
    125,   // Low-mid
    250,   // Mid
    500,   // Upper-mid
    1000,  // Presence
    2000,  // Brilliance
    4000,  // High
    8000,  // Very high
    16000, // Air
];

/// Preset usado cuando el guild no eligió ninguno
pub const DEFAULT_PRESET: &str = "flat";

/// Parámetros de transformación de audio que se entregan tal cual al sink.
///
/// El reproductor no los interpreta; el sink de songbird los convierte en
/// una cadena de filtros de ffmpeg.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioTransform {
    filter: Option<String>,
}

impl AudioTransform {
    pub fn passthrough() -> Self {
        Self { filter: None }
    }

    /// Convierte ganancias en dB a una cadena `equalizer=` de ffmpeg.
    /// Las bandas a 0 dB se omiten.
    pub fn from_gains(gains: &[f32; 10]) -> Self {
        let bands: Vec<String> = EQ_FREQUENCIES
            .iter()
            .zip(gains.iter())
            .filter(|(_, gain)| gain.abs() > f32::EPSILON)
            .map(|(freq, gain)| format!("equalizer=f={}:width_type=o:width=1:g={}", freq, gain))
            .collect();

        if bands.is_empty() {
            Self::passthrough()
        } else {
            Self {
                filter: Some(bands.join(",")),
            }
        }
    }

    pub fn filter_chain(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn is_passthrough(&self) -> bool {
        self.filter.is_none()
    }
}

/// Entrada de la tabla estática de presets
#[derive(Debug, Clone, Copy)]
pub struct EqPreset {
    pub key: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    gains: [f32; 10], // Ganancias en dB para cada banda
}

impl EqPreset {
    pub fn transform(&self) -> AudioTransform {
        AudioTransform::from_gains(&self.gains)
    }
}

const PRESETS: [EqPreset; 8] = [
    EqPreset {
        key: "flat",
        display_name: "Plano",
        description: "Sin ecualización",
        gains: [0.0; 10],
    },
    EqPreset {
        key: "bass",
        display_name: "Bass Boost",
        description: "Refuerza graves y sub-graves",
        gains: [6.0, 5.0, 4.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    },
    EqPreset {
        key: "pop",
        display_name: "Pop",
        description: "Medios presentes para voces y melodías",
        gains: [-1.0, 2.0, 4.0, 5.0, 3.0, 0.0, -1.0, -1.0, 0.0, 0.0],
    },
    EqPreset {
        key: "rock",
        display_name: "Rock",
        description: "Curva en V con graves y agudos marcados",
        gains: [5.0, 4.0, 3.0, 1.0, -1.0, -1.0, 0.0, 2.0, 3.0, 4.0],
    },
    EqPreset {
        key: "jazz",
        display_name: "Jazz",
        description: "Cálido, con agudos suaves",
        gains: [0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0, 1.0, 2.0, 3.0],
    },
    EqPreset {
        key: "classical",
        display_name: "Clásica",
        description: "Atenúa ligeramente los agudos",
        gains: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0, -2.0, -2.0, -3.0],
    },
    EqPreset {
        key: "electronic",
        display_name: "Electrónica",
        description: "Graves profundos y brillo en los agudos",
        gains: [5.0, 4.0, 1.0, 0.0, -2.0, 2.0, 1.0, 0.0, 3.0, 4.0],
    },
    EqPreset {
        key: "vocal",
        display_name: "Vocal",
        description: "Realza la voz",
        gains: [-2.0, -1.0, 0.0, 2.0, 4.0, 3.0, 2.0, 1.0, 0.0, -1.0],
    },
];

/// Tabla estática de presets
pub struct EqPresets;

impl EqPresets {
    /// Busca un preset por clave (sin distinguir mayúsculas)
    pub fn get(key: &str) -> Option<&'static EqPreset> {
        let key = key.trim().to_lowercase();
        PRESETS.iter().find(|preset| preset.key == key)
    }

    /// Como `get`, pero devuelve `UnknownPreset` si no existe
    pub fn resolve(key: &str) -> PlayerResult<&'static EqPreset> {
        Self::get(key).ok_or_else(|| PlayerError::UnknownPreset(key.to_string()))
    }

    pub fn list() -> &'static [EqPreset] {
        &PRESETS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(EqPresets::get("BASS").map(|p| p.key), Some("bass"));
        assert_eq!(EqPresets::get(" Vocal ").map(|p| p.key), Some("vocal"));
        assert!(EqPresets::get("karaoke").is_none());
    }

    #[test]
    fn test_resolve_unknown_preset() {
        assert_eq!(
            EqPresets::resolve("karaoke").map(|p| p.key),
            Err(PlayerError::UnknownPreset("karaoke".to_string()))
        );
    }

    #[test]
    fn test_flat_is_passthrough() {
        let flat = EqPresets::resolve(DEFAULT_PRESET).unwrap();
        assert!(flat.transform().is_passthrough());
    }

    #[test]
    fn test_gains_to_filter_chain() {
        let bass = EqPresets::get("bass").unwrap().transform();
        let chain = bass.filter_chain().unwrap();

        assert!(chain.starts_with("equalizer=f=32:width_type=o:width=1:g=6"));
        assert_eq!(chain.matches("equalizer=").count(), 4);
        assert!(!chain.contains("f=500"));
    }
}
