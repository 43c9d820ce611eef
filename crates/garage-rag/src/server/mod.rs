//! HTTP server for garage-rag

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{RagConfig, ServerConfig};
use crate::error::{Error, Result};
use state::AppState;

/// garage-rag HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new server, restoring the index from disk
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Application state shared with the handlers
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Start serving until Ctrl+C or SIGTERM, then flush the index
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let app = router(self.state.clone(), &self.config.server);

        tracing::info!("Starting garage-rag server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Shutting down, writing final index snapshot");
        let index = self.state.index().clone();
        tokio::task::spawn_blocking(move || index.flush())
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(routes::routes(config.max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app.layer(cors)
    } else {
        app
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecoveryPolicy;
    use crate::embeddings::HashingEmbedder;
    use crate::generation::Generator;
    use crate::index::{IndexStore, SharedIndex};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "garage-rag-test-boundary";

    struct CannedGenerator;

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> crate::error::Result<String> {
            Ok(format!("answered {} chars", prompt.len()))
        }

        async fn health_check(&self) -> crate::error::Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-1"
        }
    }

    fn test_app(dir: &std::path::Path) -> (Router, AppState) {
        let mut config = RagConfig::default();
        config.retrieval.top_k = 3;
        let index =
            SharedIndex::open(IndexStore::new(dir.join("index.bin"), RecoveryPolicy::Fail)).unwrap();
        let state = AppState::from_parts(
            config.clone(),
            index,
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(CannedGenerator),
        )
        .unwrap();
        (router(state.clone(), &config.server), state)
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        /// Bare field: no filename, no content type
        Bytes(&'a str, &'a [u8]),
        File {
            name: &'a str,
            filename: &'a str,
            content_type: &'a str,
            data: &'a [u8],
        },
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::Bytes(name, data) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, filename, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_banner_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["message"].is_string());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = test_app(dir.path());

        let request = multipart_request(
            "/upload",
            &[Part::File {
                name: "file",
                filename: "notes.txt",
                content_type: "text/plain",
                data: b"Oil change every 10,000 km.",
            }],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["error"]["type"], "unsupported_format");
        assert!(state.index().is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_content_type_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = test_app(dir.path());

        let request = multipart_request(
            "/upload",
            &[Part::Bytes("file", b"Oil change every 10,000 km.")],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["error"]["type"], "unsupported_format");
        assert!(state.index().is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let response = app
            .oneshot(multipart_request("/upload", &[Part::Text("prompt", "hi")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_returns_answer_and_passages() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = test_app(dir.path());
        state
            .pipeline()
            .ingest_texts(vec![
                "Oil change every 10,000 km.".into(),
                "Tire rotation every 10,000 km.".into(),
            ])
            .await
            .unwrap();

        let request = multipart_request("/generate", &[Part::Text("prompt", "oil"), Part::Text("k", "1")]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["gemini_response"].as_str().unwrap().starts_with("answered"));
        assert_eq!(body["relevant_docs"], serde_json::json!(["Oil change every 10,000 km."]));
        assert_eq!(body["units_added"], 0);
        assert!(body.get("generation_error").is_none());
    }

    #[tokio::test]
    async fn test_generate_rejects_blank_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path());

        let response = app
            .oneshot(multipart_request("/generate", &[Part::Text("prompt", "  ")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["type"], "invalid_argument");
    }

    #[tokio::test]
    async fn test_info_reports_index() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = test_app(dir.path());
        state
            .pipeline()
            .ingest_texts(vec!["Coolant: 50/50 mix.".into()])
            .await
            .unwrap();

        let response = app
            .oneshot(Request::builder().uri("/api/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;

        assert_eq!(body["index_size"], 1);
        assert_eq!(body["dimensions"], 64);
        assert_eq!(body["embedder"], "hashing");
        assert_eq!(body["generator"], "canned");
        assert_eq!(body["default_top_k"], 3);
    }

    #[test]
    fn test_state_rejects_embedder_of_other_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let index =
            SharedIndex::open(IndexStore::new(dir.path().join("index.bin"), RecoveryPolicy::Fail))
                .unwrap();
        index
            .insert(vec![vec![1.0, 0.0]], vec!["Wiper blades".into()])
            .unwrap();

        let result = AppState::from_parts(
            RagConfig::default(),
            index,
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(CannedGenerator),
        );
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }
}
