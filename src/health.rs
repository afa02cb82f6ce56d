//! Servidor HTTP mínimo para los health checks del hosting.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

const HEALTH_RESPONSE: &str = "Discord bot is running!";

fn build_router() -> Router {
    Router::new()
        .route("/", get(|| async { HEALTH_RESPONSE }))
        .route("/health", get(|| async { HEALTH_RESPONSE }))
}

pub async fn serve(listener: TcpListener) -> Result<()> {
    axum::serve(listener, build_router())
        .await
        .context("Error en el servidor de health check")
}

/// Arranca el servidor en segundo plano; un fallo aquí no detiene el bot
pub async fn spawn(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("No se pudo abrir el puerto {}", port))?;

    info!("🩺 Health check escuchando en http://{}", addr);

    tokio::spawn(async move {
        if let Err(e) = serve(listener).await {
            error!("❌ {:?}", e);
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_routes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let client = reqwest::Client::new();
        for path in ["/", "/health"] {
            let response = client.get(format!("http://{}{}", addr, path)).send().await.unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            assert_eq!(response.text().await.unwrap(), HEALTH_RESPONSE);
        }

        let missing = client.get(format!("http://{}/nope", addr)).send().await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
