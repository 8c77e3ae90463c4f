//! Web server implementation

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use testscope_common::narrative::{FallbackNarrator, Narrator};
use testscope_common::vision::{ChangeDetector, Jitter, SimilarityEngine, VerdictBuilder};

use crate::llm::{LlmConfig, LlmNarrator};

/// Web server configuration
#[derive(Debug, Clone, Default)]
pub struct WebServerConfig {
    /// LLM narrator settings; `None` runs the deterministic narrator only.
    pub llm: Option<LlmConfig>,
    /// Pin the fallback perturbation for reproducible runs.
    pub jitter_seed: Option<u64>,
}

/// Shared, immutable per-request dependencies. The pipeline holds no
/// cross-request state.
pub struct AppState {
    pub engine: SimilarityEngine,
    pub detector: ChangeDetector,
    pub builder: VerdictBuilder,
    pub narrator: Arc<dyn Narrator>,
    pub llm_configured: bool,
}

/// Web server handle
#[derive(Clone)]
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server
    pub fn new(cfg: WebServerConfig) -> Self {
        let jitter = match cfg.jitter_seed {
            Some(seed) => Jitter::seeded(seed),
            None => Jitter::from_entropy(),
        };

        let llm_configured = cfg.llm.is_some();
        let narrator: Arc<dyn Narrator> = match cfg.llm {
            Some(llm_cfg) => Arc::new(LlmNarrator::new(llm_cfg)),
            None => Arc::new(FallbackNarrator::new()),
        };

        Self {
            state: Arc::new(AppState {
                engine: SimilarityEngine::with_jitter(jitter),
                detector: ChangeDetector::new(),
                builder: VerdictBuilder::new(),
                narrator,
                llm_configured,
            }),
        }
    }

    pub fn router(&self) -> Router {
        let analysis = crate::visual::visual_routes(self.state.clone())
            .merge(crate::analysis::heuristic_routes());

        Router::new()
            .route("/", get(root_handler))
            .route("/api/health", get(health_handler))
            .nest_service("/api/analysis", analysis)
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!("TestScope analysis service starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new(WebServerConfig::default())
    }
}

pub async fn serve(addr: SocketAddr, cfg: WebServerConfig) -> anyhow::Result<()> {
    let server = WebServer::new(cfg);
    server.serve(addr).await
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "testscope-web",
        "version": testscope_common::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "testscope-web",
        "llm_connected": state.llm_configured,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Deterministic state for handler tests: pinned jitter, pinned narrator.
#[cfg(test)]
pub(crate) fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        engine: SimilarityEngine::with_jitter(Jitter::seeded(0)),
        detector: ChangeDetector::new(),
        builder: VerdictBuilder::new(),
        narrator: Arc::new(FallbackNarrator::seeded(0)),
        llm_configured: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_llm_state() {
        let response = health_handler(State(test_state())).await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["llm_connected"], false);
    }
}
