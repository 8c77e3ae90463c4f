//! Visual Regression Web Handlers
//!
//! `POST /visual-regression` takes a pair of base64 screenshots and a
//! tolerance and returns a full `VerdictReport`. Decode failures are
//! client errors; analysis failures degrade inside the pipeline and never
//! fail the request.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use testscope_common::narrative::{FallbackNarrator, NarrativeContext};
use testscope_common::vision::codec::DecodedImage;
use testscope_common::vision::VerdictReport;
use testscope_common::Error;

use crate::server::AppState;

fn default_tolerance() -> f64 {
    0.95
}

#[derive(Debug, Deserialize)]
pub struct VisualRegressionRequest {
    /// Baseline screenshot, base64 (data-URI prefix allowed)
    pub before_screenshot: String,
    /// Candidate screenshot, base64
    pub after_screenshot: String,
    /// Minimum similarity for a PASS verdict
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

#[derive(Debug, Serialize)]
pub struct VisualRegressionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<VerdictReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VisualRegressionResponse {
    fn ok(report: VerdictReport) -> Self {
        Self {
            success: true,
            data: Some(report),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Analyze a before/after screenshot pair
pub async fn visual_regression_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VisualRegressionRequest>,
) -> impl IntoResponse {
    let before = match DecodedImage::from_base64(&req.before_screenshot) {
        Ok(image) => image,
        Err(e) => return decode_error_response("before_screenshot", e),
    };
    let after = match DecodedImage::from_base64(&req.after_screenshot) {
        Ok(image) => image,
        Err(e) => return decode_error_response("after_screenshot", e),
    };

    debug!(
        before_format = %before.metadata.format,
        after_format = %after.metadata.format,
        tolerance = req.tolerance,
        "running visual comparison"
    );

    // Similarity and change detection are CPU-bound; keep them off the
    // async worker threads.
    let engine = state.engine.clone();
    let detector = state.detector;
    let tolerance = req.tolerance;
    let analysis = tokio::task::spawn_blocking(move || {
        let similarity = engine.compare(&before, &after);
        let changes = detector.detect(&before, &after, tolerance);
        (before, after, similarity, changes)
    })
    .await;

    let (before, after, similarity, changes) = match analysis {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VisualRegressionResponse::err(format!("Analysis task failed: {}", e))),
            )
                .into_response();
        }
    };

    let context = NarrativeContext::from_analysis(
        &before.metadata,
        &after.metadata,
        similarity.overall_similarity,
        &changes,
    );
    let narrative = match state.narrator.narrate(&context).await {
        Ok(bundle) => bundle,
        Err(e) => {
            // Narrative failures are absorbed; the report still ships.
            warn!("narrative generator unavailable: {}", e);
            FallbackNarrator::new().generate(&context)
        }
    };

    let report = state.builder.build(
        similarity,
        changes,
        req.tolerance,
        before.metadata,
        after.metadata,
        narrative,
    );

    (StatusCode::OK, Json(VisualRegressionResponse::ok(report))).into_response()
}

fn decode_error_response(field: &str, error: Error) -> axum::response::Response {
    let status = match error {
        Error::Decode(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(VisualRegressionResponse::err(format!("{}: {}", field, error))),
    )
        .into_response()
}

/// Build the visual-regression routes
pub fn visual_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/visual-regression", post(visual_regression_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_state;
    use axum::body::to_bytes;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32, color: [u8; 4]) -> String {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).expect("encode png");
        STANDARD.encode(buf.into_inner())
    }

    async fn run(req: VisualRegressionRequest) -> (StatusCode, serde_json::Value) {
        let response = visual_regression_handler(State(test_state()), Json(req))
            .await
            .into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_identical_screenshots_pass() {
        let screenshot = png_base64(16, 16, [12, 120, 200, 255]);
        let (status, body) = run(VisualRegressionRequest {
            before_screenshot: screenshot.clone(),
            after_screenshot: screenshot,
            tolerance: 0.95,
        })
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let data = &body["data"];
        assert_eq!(data["verdict"], "PASS");
        assert_eq!(data["similarity"], 1.0);
        assert_eq!(data["changes"].as_array().unwrap().len(), 0);
        assert_eq!(data["has_changes"], false);
    }

    #[tokio::test]
    async fn test_single_pixel_pair_passes_when_identical() {
        let screenshot = png_base64(1, 1, [0, 128, 64, 255]);
        let (status, body) = run(VisualRegressionRequest {
            before_screenshot: screenshot.clone(),
            after_screenshot: screenshot,
            tolerance: 0.95,
        })
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["verdict"], "PASS");
        assert_eq!(data["similarity"], 1.0);
        assert_eq!(data["changes"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_different_pixels_reported() {
        let (status, body) = run(VisualRegressionRequest {
            before_screenshot: png_base64(1, 1, [255, 0, 0, 255]),
            after_screenshot: png_base64(1, 1, [0, 0, 255, 255]),
            tolerance: 0.95,
        })
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        // Red vs blue single pixels land far below any sane tolerance
        assert_eq!(data["verdict"], "FAIL");
        let changes = data["changes"].as_array().unwrap();
        assert!(
            changes
                .iter()
                .any(|c| c["type"] == "pixel" || c["type"] == "color"),
            "expected a pixel or color change, got {:?}",
            changes
        );
        assert_eq!(data["has_changes"], true);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_client_error() {
        let (status, body) = run(VisualRegressionRequest {
            before_screenshot: "!!!not-base64!!!".to_string(),
            after_screenshot: png_base64(1, 1, [0, 0, 0, 255]),
            tolerance: 0.95,
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("before_screenshot"));
    }

    #[tokio::test]
    async fn test_missing_padding_still_decodes() {
        let screenshot = png_base64(2, 2, [9, 9, 9, 255]);
        let trimmed = screenshot.trim_end_matches('=').to_string();
        let (status, body) = run(VisualRegressionRequest {
            before_screenshot: trimmed.clone(),
            after_screenshot: format!("data:image/png;base64,{}", trimmed),
            tolerance: 0.95,
        })
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verdict"], "PASS");
    }

    #[tokio::test]
    async fn test_oversize_payload_rejected_before_analysis() {
        use testscope_common::vision::MAX_IMAGE_BYTES;

        let oversized = STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES + 1]);
        let (status, body) = run(VisualRegressionRequest {
            before_screenshot: oversized,
            after_screenshot: png_base64(1, 1, [0, 0, 0, 255]),
            tolerance: 0.95,
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("maximum size"));
    }
}
