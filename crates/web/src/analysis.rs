//! Heuristic Analysis Web Handlers
//!
//! Thin JSON wrappers over the rule-table classifiers in
//! `testscope-common`: XPath deep analysis, script XPath extraction,
//! locator health, Playwright script metrics and optimization hints.
//! All of them are pure request -> response; no shared state.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use testscope_common::heuristics::locator::LocatorHealthReport;
use testscope_common::heuristics::metrics::MetricsReport;
use testscope_common::heuristics::optimize::OptimizationReport;
use testscope_common::heuristics::xpath::{ScriptXPathAnalysis, XPathAnalysis};
use testscope_common::heuristics::{
    analyze_locators, analyze_optimizations, analyze_script, analyze_script_metrics, analyze_xpath,
};

#[derive(Debug, Serialize)]
pub struct AnalysisResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> AnalysisResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct XPathAnalysisRequest {
    pub xpath: String,
}

#[derive(Debug, Deserialize)]
pub struct ScriptAnalysisRequest {
    pub script_content: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocatorHealthRequest {
    pub locators: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaywrightCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ScriptAnalysisData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub analysis: ScriptXPathAnalysis,
}

// ============================================================================
// Handlers
// ============================================================================

/// Deep analysis of one XPath expression
pub async fn xpath_analysis_handler(
    Json(req): Json<XPathAnalysisRequest>,
) -> impl IntoResponse {
    let analysis: XPathAnalysis = analyze_xpath(&req.xpath);
    (StatusCode::OK, Json(AnalysisResponse::ok(analysis)))
}

/// Extract and analyze every XPath in a script
pub async fn script_xpath_handler(
    Json(req): Json<ScriptAnalysisRequest>,
) -> impl IntoResponse {
    let analysis = analyze_script(&req.script_content);
    (
        StatusCode::OK,
        Json(AnalysisResponse::ok(ScriptAnalysisData {
            filename: req.filename,
            analysis,
        })),
    )
}

/// Batch locator health scoring
pub async fn locator_health_handler(
    Json(req): Json<LocatorHealthRequest>,
) -> impl IntoResponse {
    let report: LocatorHealthReport = analyze_locators(&req.locators);
    (StatusCode::OK, Json(AnalysisResponse::ok(report)))
}

/// Playwright script quality metrics
pub async fn playwright_metrics_handler(
    Json(req): Json<PlaywrightCodeRequest>,
) -> impl IntoResponse {
    let report: MetricsReport = analyze_script_metrics(&req.code);
    (StatusCode::OK, Json(AnalysisResponse::ok(report)))
}

/// Playwright script optimization hints
pub async fn optimize_playwright_handler(
    Json(req): Json<PlaywrightCodeRequest>,
) -> impl IntoResponse {
    let report: OptimizationReport = analyze_optimizations(&req.code);
    (StatusCode::OK, Json(AnalysisResponse::ok(report)))
}

/// Build the heuristic-analysis routes
pub fn heuristic_routes() -> Router {
    Router::new()
        .route("/xpath", post(xpath_analysis_handler))
        .route("/script-xpaths", post(script_xpath_handler))
        .route("/locator-health", post(locator_health_handler))
        .route("/playwright-metrics", post(playwright_metrics_handler))
        .route("/optimize-playwright", post(optimize_playwright_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_xpath_endpoint_shape() {
        let response = xpath_analysis_handler(Json(XPathAnalysisRequest {
            xpath: "//button[@data-testid='save']".to_string(),
        }))
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_of(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["type"], "relative");
        assert_eq!(body["data"]["stability"], "high");
    }

    #[tokio::test]
    async fn test_script_endpoint_carries_filename() {
        let response = script_xpath_handler(Json(ScriptAnalysisRequest {
            script_content: "page.locator('/html/body/div[1]')".to_string(),
            filename: Some("checkout.spec.ts".to_string()),
        }))
        .await
        .into_response();

        let body = body_of(response).await;
        assert_eq!(body["data"]["filename"], "checkout.spec.ts");
        assert_eq!(body["data"]["xpath_count"], 1);
    }

    #[tokio::test]
    async fn test_locator_health_endpoint() {
        let response = locator_health_handler(Json(LocatorHealthRequest {
            locators: vec!["page.getByTestId('ok')".to_string()],
        }))
        .await
        .into_response();

        let body = body_of(response).await;
        assert_eq!(body["data"]["summary"]["total_locators"], 1);
        assert_eq!(body["data"]["summary"]["overall_status"], "healthy");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let response = playwright_metrics_handler(Json(PlaywrightCodeRequest {
            code: "await page.waitForTimeout(1000);".to_string(),
        }))
        .await
        .into_response();

        let body = body_of(response).await;
        assert_eq!(body["data"]["metrics"]["wait_strategy"]["implicit_timeouts"], 1);
        assert!(body["data"]["grade"].is_string());
    }

    #[tokio::test]
    async fn test_optimize_endpoint() {
        let response = optimize_playwright_handler(Json(PlaywrightCodeRequest {
            code: "await page.waitForTimeout(1000);".to_string(),
        }))
        .await
        .into_response();

        let body = body_of(response).await;
        assert_eq!(body["data"]["total_optimizations"], 1);
        assert_eq!(body["data"]["optimizations"][0]["priority"], "critical");
    }
}
