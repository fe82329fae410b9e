//! Keep-alive HTTP endpoint.
//!
//! Runs beside the core pipeline and shares no state with it. Hosting
//! platforms ping it to keep the process scheduled.

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;

use crate::config::LivenessConfig;
use crate::error::{CourierError, Result};

pub const ALIVE_BODY: &str = "I'm alive!";

async fn alive() -> &'static str {
    ALIVE_BODY
}

pub fn router() -> Router {
    Router::new().route("/", get(alive))
}

/// Serve the endpoint until `shutdown` is cancelled.
pub async fn serve(config: &LivenessConfig, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| CourierError::Config(format!("invalid liveness address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Liveness endpoint listening");

    axum::serve(listener, router())
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("Liveness endpoint received shutdown signal");
        })
        .await?;

    tracing::info!("Liveness endpoint shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_reports_alive() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], ALIVE_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_other_paths_are_not_found() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejects_unparseable_address() {
        let config = LivenessConfig {
            enabled: true,
            host: "not a host".to_string(),
            port: 8080,
        };
        assert!(matches!(
            serve(&config, CancellationToken::new()).await,
            Err(CourierError::Config(_))
        ));
    }
}
