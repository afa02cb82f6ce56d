use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{ExtractionGateway, RawEntry, Resolution};

static YTDLP_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ERROR:\s*(.+)$").expect("regex válida"));

/// Nombre por defecto de la colección cuando yt-dlp no lo informa
const DEFAULT_COLLECTION_TITLE: &str = "Playlist";

/// Información extraída de yt-dlp (`--dump-single-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    entries: Option<Vec<Option<YtDlpInfo>>>,
}

impl YtDlpInfo {
    /// Mejor identificador disponible para re-extraer: webpage_url, url o id
    fn into_entry(self) -> RawEntry {
        let canonical_reference = [&self.webpage_url, &self.url, &self.id]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_default();

        RawEntry {
            title: self.title,
            canonical_reference,
            source_locator: self.url,
            duration_secs: self
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d.round() as u64),
            thumbnail: self.thumbnail,
        }
    }
}

/// Gateway que delega en el binario `yt-dlp`
pub struct YtDlpGateway {
    binary: String,
    max_playlist_size: usize,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

impl YtDlpGateway {
    pub fn new(binary: impl Into<String>, max_playlist_size: usize) -> Self {
        Self {
            binary: binary.into(),
            max_playlist_size,
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Verifica que el binario esté disponible
    pub async fn verify(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("No se pudo ejecutar {}", self.binary))?;

        if !output.status.success() {
            anyhow::bail!("{} no disponible", self.binary);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", summarize_stderr(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ExtractionGateway for YtDlpGateway {
    async fn resolve(&self, query: &str) -> Result<Resolution> {
        info!("🔍 Resolviendo: {}", query);

        let playlist_end = self.max_playlist_size.to_string();
        let stdout = self
            .run(&[
                "--dump-single-json",
                "--flat-playlist",
                "--no-warnings",
                "--default-search",
                "ytsearch",
                "--playlist-end",
                &playlist_end,
                query,
            ])
            .await?;

        parse_resolution(&stdout)
    }

    async fn resolve_locator(&self, canonical_reference: &str) -> Result<String> {
        debug!("🎵 Obteniendo URL de stream para: {}", canonical_reference);

        let stdout = self
            .run(&[
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "--get-url",
                "--no-warnings",
                canonical_reference,
            ])
            .await?;

        parse_locator(&stdout)
    }
}

fn parse_resolution(json: &str) -> Result<Resolution> {
    let mut info: YtDlpInfo =
        serde_json::from_str(json.trim()).context("Error al parsear respuesta de yt-dlp")?;

    match info.entries.take() {
        Some(entries) => {
            let title = info
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COLLECTION_TITLE.to_string());
            let total = entries.len();
            let entries: Vec<RawEntry> = entries.into_iter().flatten().map(YtDlpInfo::into_entry).collect();

            if entries.len() < total {
                warn!("⚠️ {} entradas vacías descartadas de '{}'", total - entries.len(), title);
            }

            Ok(Resolution::collection(Some(title), entries))
        }
        None => Ok(Resolution::single(info.into_entry())),
    }
}

fn parse_locator(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("No se pudo obtener URL de stream"))
}

/// Se queda con las líneas `ERROR:` de yt-dlp, o con el stderr completo
fn summarize_stderr(stderr: &str) -> String {
    let errors: Vec<&str> = YTDLP_ERROR
        .captures_iter(stderr)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
        .collect();

    if errors.is_empty() {
        stderr.trim().to_string()
    } else {
        errors.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_single_video() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "url": "https://rr1---sn.googlevideo.com/videoplayback?expire=1",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "duration": 212.0,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        }"#;

        let resolution = parse_resolution(json).unwrap();

        assert!(!resolution.is_collection);
        assert_eq!(resolution.collection_title, None);
        assert_eq!(
            resolution.entries,
            vec![RawEntry {
                title: Some("Never Gonna Give You Up".into()),
                canonical_reference: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
                source_locator: Some("https://rr1---sn.googlevideo.com/videoplayback?expire=1".into()),
                duration_secs: Some(212),
                thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".into()),
            }]
        );
    }

    #[test]
    fn test_parse_flat_playlist() {
        let json = r#"{
            "title": "Mix",
            "entries": [
                {"id": "a1", "title": "First", "url": "https://www.youtube.com/watch?v=a1"},
                null,
                {"id": "b2", "duration": 90}
            ]
        }"#;

        let resolution = parse_resolution(json).unwrap();

        assert!(resolution.is_collection);
        assert_eq!(resolution.collection_title.as_deref(), Some("Mix"));
        assert_eq!(resolution.entries.len(), 2);
        assert_eq!(resolution.entries[0].canonical_reference, "https://www.youtube.com/watch?v=a1");
        assert!(resolution.entries[0].needs_full_metadata());
        // Sin URL sólo queda el ID, que no es re-extraíble
        assert_eq!(resolution.entries[1].canonical_reference, "b2");
        assert_eq!(resolution.entries[1].duration_secs, Some(90));
    }

    #[test]
    fn test_parse_collection_without_title() {
        let resolution = parse_resolution(r#"{"entries": []}"#).unwrap();
        assert_eq!(resolution.collection_title.as_deref(), Some(DEFAULT_COLLECTION_TITLE));
        assert!(resolution.entries.is_empty());
    }

    #[test]
    fn test_parse_locator() {
        assert_eq!(
            parse_locator("\nhttps://cdn.example.com/audio.webm\n").unwrap(),
            "https://cdn.example.com/audio.webm"
        );
        assert!(parse_locator("  \n").is_err());
    }

    #[test]
    fn test_summarize_stderr() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Video unavailable\n";
        assert_eq!(summarize_stderr(stderr), "[youtube] abc: Video unavailable");
        assert_eq!(summarize_stderr("boom\n"), "boom");
    }
}
