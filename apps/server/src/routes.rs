//! Request handlers: multipart decoding and the ingest endpoint.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use sourcemill_shared::{IngestionRequest, IngestionResult, SourcemillError, UploadedFile};

use crate::AppState;

/// Default page budget when the client omits `max_pages`.
const DEFAULT_MAX_PAGES: u32 = 10;

/// `GET /health`
pub(crate) async fn health() -> &'static str {
    "OK"
}

/// `POST /api/ingest` — one multipart submission, one JSON result.
///
/// Only a structurally malformed request produces a non-2xx status; bad
/// individual sources come back as `errors` entries beside whatever items
/// succeeded.
pub(crate) async fn ingest(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestionResult>, ApiError> {
    let request = decode_multipart(multipart).await?;

    debug!(
        files = request.files.len(),
        max_pages = request.max_pages,
        "decoded ingest submission"
    );

    let result = state.pipeline.run(request).await?;
    Ok(Json(result))
}

/// Decode the multipart form into an [`IngestionRequest`].
///
/// Recognized fields: repeated `files` parts, `urls` (newline-delimited
/// text), `max_pages` (integer text), `source_team_map` (JSON object).
/// Unknown fields are ignored so clients can evolve independently.
async fn decode_multipart(mut multipart: Multipart) -> Result<IngestionRequest, ApiError> {
    let mut request = IngestionRequest {
        max_pages: DEFAULT_MAX_PAGES,
        ..Default::default()
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::from(SourcemillError::malformed(format!(
            "unreadable multipart field: {e}"
        )))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "files" => {
                let file_name = field.file_name().map(str::to_string).unwrap_or_default();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::from(SourcemillError::malformed(format!(
                        "failed to read file part: {e}"
                    )))
                })?;

                request.files.push(UploadedFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                    content_type,
                });
            }
            "urls" => {
                request.url_lines = text_field(field, "urls").await?;
            }
            "max_pages" => {
                let raw = text_field(field, "max_pages").await?;
                request.max_pages = parse_max_pages(&raw)?;
            }
            "source_team_map" => {
                let raw = text_field(field, "source_team_map").await?;
                request.source_team_map = parse_team_map(&raw)?;
            }
            other => {
                debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    Ok(request)
}

/// Read one text field, surfacing decode failures as malformed-request.
async fn text_field(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, ApiError> {
    field.text().await.map_err(|e| {
        ApiError::from(SourcemillError::malformed(format!(
            "field {name} is not valid text: {e}"
        )))
    })
}

/// Parse the page budget. Out-of-range values are clamped downstream by
/// the resolver; non-numeric input is malformed.
fn parse_max_pages(raw: &str) -> Result<u32, ApiError> {
    raw.trim().parse::<u32>().map_err(|_| {
        ApiError::from(SourcemillError::malformed(format!(
            "max_pages is not a non-negative integer: {raw:?}"
        )))
    })
}

/// Parse the JSON source→team mapping object.
fn parse_team_map(raw: &str) -> Result<std::collections::HashMap<String, String>, ApiError> {
    if raw.trim().is_empty() {
        return Ok(Default::default());
    }
    serde_json::from_str(raw).map_err(|e| {
        ApiError::from(SourcemillError::malformed(format!(
            "source_team_map is not a JSON object of strings: {e}"
        )))
    })
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Pipeline errors as HTTP responses: malformed requests are the client's
/// fault, everything else is ours.
#[derive(Debug)]
pub(crate) struct ApiError(SourcemillError);

impl From<SourcemillError> for ApiError {
    fn from(err: SourcemillError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SourcemillError::MalformedRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
