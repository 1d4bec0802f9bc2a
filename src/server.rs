//! HTTP transport over the pipeline (feature `server`).
//!
//! | Method | Path                         | Body (multipart)             | Response                    |
//! |--------|------------------------------|------------------------------|-----------------------------|
//! | POST   | `/process_pdfs/`             | `pa_pdf`, `referral_pdf`     | `application/pdf` download  |
//! | POST   | `/retrieve_pdf_ocr_results`  | `file`                       | OCR + model summary JSON    |
//! | GET    | `/health`                    |                              | `OK`                        |
//!
//! Errors are JSON `{error, stage, status}`. The status tells the caller
//! whose fault it was: 400 for a bad request, 422 for an unreadable PDF,
//! 502 when the OCR service or the model let us down, 500 otherwise.

use crate::config::FillConfig;
use crate::error::{PaFillError, PipelineError, Stage};
use crate::fill::{fill, inspect, Inspection};
use crate::pipeline::input::looks_like_pdf;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Transport settings around a [`FillConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub fill: FillConfig,
    /// Allowed CORS origins; `*` allows any. Default: `http://localhost:3000`.
    pub cors_origins: Vec<String>,
    /// Maximum request body in bytes. Default: 25 MiB.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            fill: FillConfig::default(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            body_limit: 25 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<FillConfig>,
}

/// Build the router with CORS, request tracing and the body limit applied.
pub fn router(config: ServerConfig) -> Router {
    let state = AppState {
        config: Arc::new(config.fill),
    };

    Router::new()
        .route("/health", get(health))
        .route("/process_pdfs/", post(process_pdfs))
        .route("/retrieve_pdf_ocr_results", post(retrieve_pdf_ocr_results))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving on http://{}", listener.local_addr()?);
    axum::serve(listener, router(config)).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(values))
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "OK"
}

async fn process_pdfs(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut parts = read_parts(multipart).await?;
    let pa = take_pdf(&mut parts, "pa_pdf")?;
    let referral = take_pdf(&mut parts, "referral_pdf")?;
    info!(
        "process_pdfs: form {} bytes, referral {} bytes",
        pa.len(),
        referral.len()
    );

    let output = fill(&pa, &referral, &state.config).await?;
    let disposition = format!("attachment; filename={}", output.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        output.bytes,
    )
        .into_response())
}

async fn retrieve_pdf_ocr_results(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Inspection>, ApiError> {
    let mut parts = read_parts(multipart).await?;
    let pdf = take_pdf(&mut parts, "file")?;
    let inspection = inspect(&pdf, &state.config).await?;
    Ok(Json(inspection))
}

/// All named parts of the upload, by part name.
async fn read_parts(mut multipart: Multipart) -> Result<HashMap<String, Vec<u8>>, ApiError> {
    let mut parts = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await?;
        parts.insert(name, data.to_vec());
    }
    Ok(parts)
}

fn take_pdf(parts: &mut HashMap<String, Vec<u8>>, name: &'static str) -> Result<Vec<u8>, ApiError> {
    let bytes = parts.remove(name).ok_or(ApiError::MissingPart(name))?;
    if !looks_like_pdf(&bytes) {
        return Err(ApiError::NotAPdf(name));
    }
    Ok(bytes)
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
enum ApiError {
    #[error("Missing multipart part '{0}'")]
    MissingPart(&'static str),

    #[error("Part '{0}' is not a PDF")]
    NotAPdf(&'static str),

    #[error("Invalid upload: {0}")]
    Upload(#[from] MultipartError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Component(#[from] PaFillError),
}

/// HTTP status for a component error.
fn status_for(error: &PaFillError) -> StatusCode {
    match error {
        PaFillError::DocumentParse { .. }
        | PaFillError::NotAPdf { .. }
        | PaFillError::FileNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PaFillError::OcrService { .. }
        | PaFillError::LmService { .. }
        | PaFillError::MalformedModelResponse { .. } => StatusCode::BAD_GATEWAY,
        PaFillError::DocumentWrite { .. }
        | PaFillError::ProviderNotConfigured { .. }
        | PaFillError::InvalidConfig(_)
        | PaFillError::OutputWriteFailed { .. }
        | PaFillError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, stage, message): (StatusCode, Option<Stage>, String) = match &self {
            ApiError::MissingPart(_) => (StatusCode::BAD_REQUEST, None, self.to_string()),
            ApiError::NotAPdf(_) => (StatusCode::UNPROCESSABLE_ENTITY, None, self.to_string()),
            ApiError::Upload(e) => (e.status(), None, e.body_text()),
            ApiError::Pipeline(e) => (status_for(&e.source), Some(e.stage), e.source.to_string()),
            ApiError::Component(e) => (status_for(e), None, e.to_string()),
        };

        if status.is_server_error() {
            error!("Request failed ({}): {}", status, message);
        } else {
            warn!("Request rejected ({}): {}", status, message);
        }

        let body = Json(json!({
            "error": message,
            "stage": stage,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::fixtures::{FixtureField, FormBuilder};
    use crate::pipeline::llm::TextCompletion;
    use crate::pipeline::ocr::{OcrEngine, PageText};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pafill-test-boundary";

    struct OnePage;

    #[async_trait]
    impl OcrEngine for OnePage {
        async fn pages(&self, _: &[u8]) -> Result<Vec<PageText>, PaFillError> {
            Ok(vec![PageText {
                page_number: 1,
                markdown: "Patient: Jane Doe".into(),
            }])
        }
    }

    /// Describes on array prompts, maps on object prompts.
    struct Model {
        values: &'static str,
    }

    #[async_trait]
    impl TextCompletion for Model {
        async fn complete(&self, prompt: &str) -> Result<String, PaFillError> {
            if prompt.contains("JSON array") {
                Ok(r#"[{"name": "patient_name", "description": "Patient full name"}]"#.into())
            } else {
                Ok(self.values.into())
            }
        }
    }

    fn app(values: &'static str) -> Router {
        let fill = FillConfig::builder()
            .text_client(Arc::new(Model { values }))
            .ocr(Arc::new(OnePage))
            .build()
            .unwrap();
        router(ServerConfig {
            fill,
            ..Default::default()
        })
    }

    fn form() -> Vec<u8> {
        FormBuilder::new(1)
            .field(FixtureField::text("patient_name", 1))
            .build()
    }

    fn multipart(parts: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, data) in parts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/process_pdfs/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app("{}")
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn filled_pdf_is_returned_as_attachment() {
        let pa = form();
        let response = app(r#"{"patient_name": "Jane Doe"}"#)
            .oneshot(multipart(&[("pa_pdf", &pa), ("referral_pdf", b"%PDF-1.7")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=filled_PA.pdf"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let fields = crate::form::read_fields(&bytes).unwrap();
        assert_eq!(fields[0].value.as_deref(), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn missing_part_is_bad_request() {
        let pa = form();
        let response = app("{}")
            .oneshot(multipart(&[("pa_pdf", &pa)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("referral_pdf"));
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn non_pdf_part_is_unprocessable() {
        let response = app("{}")
            .oneshot(multipart(&[("pa_pdf", b"hello"), ("referral_pdf", b"%PDF")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_model_output_is_bad_gateway_with_stage() {
        let pa = form();
        let response = app("Sure! Here's the data: not json")
            .oneshot(multipart(&[("pa_pdf", &pa), ("referral_pdf", b"%PDF-1.7")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["stage"], "values_reconciled");
        assert!(body["error"].as_str().unwrap().contains("not json"));
    }

    #[tokio::test]
    async fn ocr_results_endpoint_returns_ocr_and_model_output() {
        let pa = form();
        let mut request = multipart(&[("file", &pa)]);
        *request.uri_mut() = "/retrieve_pdf_ocr_results".parse().unwrap();
        let response = app(r#"{"patient_name": "Jane Doe"}"#)
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["pages"][0]["page_number"], 1);
        assert_eq!(body["raw_text"], "Patient: Jane Doe");
        assert_eq!(body["model_output"], r#"{"patient_name": "Jane Doe"}"#);
        assert_eq!(body["fields"][0]["name"], "patient_name");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_by_the_body_limit() {
        let fill = FillConfig::builder()
            .text_client(Arc::new(Model { values: "{}" }))
            .ocr(Arc::new(OnePage))
            .build()
            .unwrap();
        let app = router(ServerConfig {
            fill,
            body_limit: 1024,
            ..Default::default()
        });
        let mut big = b"%PDF-1.7\n".to_vec();
        big.resize(8 * 1024, b' ');

        let response = app
            .oneshot(multipart(&[("pa_pdf", &big), ("referral_pdf", &big)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn statuses_follow_fault_ownership() {
        assert_eq!(status_for(&PaFillError::parse("x")), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_for(&PaFillError::OcrService { detail: "x".into() }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(&PaFillError::write("x")), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
