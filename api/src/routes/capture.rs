use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kapsa_core::error::ApiError;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::ownership::require_course;
use crate::state::AppState;
use crate::validate::{MAX_TITLE_CHARS, http_url, optional_text};

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/capture", post(process_capture))
}

/// How the uploaded file should be turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    /// Text extraction from an image (photographed pages, whiteboards)
    Ocr,
    /// Speech-to-text for recorded lectures
    Whisper,
}

impl CaptureKind {
    /// Material type tag persisted with the extracted content.
    fn material_type(self) -> &'static str {
        match self {
            CaptureKind::Ocr => "pdf",
            CaptureKind::Whisper => "audio",
        }
    }

    fn default_title_prefix(self) -> &'static str {
        match self {
            CaptureKind::Ocr => "Scanned",
            CaptureKind::Whisper => "Transcribed",
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub course_id: Uuid,
    #[serde(rename = "type")]
    pub kind: CaptureKind,
    pub file_url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct CourseMaterialRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_title(kind: CaptureKind, now: DateTime<Utc>) -> String {
    format!(
        "{} - {}",
        kind.default_title_prefix(),
        now.format("%-m/%-d/%Y")
    )
}

/// Ingest a captured file: run OCR or transcription on it and store the
/// extracted text as a course material. Content length is unbounded here —
/// truncation happens later, where materials feed prompts.
#[utoipa::path(
    post,
    path = "/v1/capture",
    request_body = CaptureRequest,
    responses(
        (status = 200, description = "Material created with extracted content", body = CourseMaterialRow),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Course not found", body = ApiError),
        (status = 500, description = "Extraction failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "capture"
)]
pub async fn process_capture(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<CaptureRequest>,
) -> Result<Json<CourseMaterialRow>, AppError> {
    let file_url = http_url(&req.file_url, "fileUrl")?;
    let title = optional_text(req.title.as_deref(), MAX_TITLE_CHARS)
        .unwrap_or_else(|| default_title(req.kind, Utc::now()));

    let user = authenticate(&state, &headers).await?;
    require_course(&state.db, req.course_id, user.user_id).await?;

    let content = match req.kind {
        CaptureKind::Ocr => state.replicate.extract_text_from_image(file_url.as_str()).await?,
        CaptureKind::Whisper => state.replicate.transcribe_audio(file_url.as_str()).await?,
    };

    let material = sqlx::query_as::<_, CourseMaterialRow>(
        "INSERT INTO course_materials (id, course_id, user_id, title, type, content, file_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, course_id, user_id, title, type, content, file_url, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(req.course_id)
    .bind(user.user_id)
    .bind(&title)
    .bind(req.kind.material_type())
    .bind(&content)
    .bind(file_url.as_str())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = %user.user_id,
        material_id = %material.id,
        kind = material.kind,
        chars = content.len(),
        "Capture processed"
    );

    Ok(Json(material))
}

#[cfg(test)]
mod tests {
    use super::{CaptureKind, CaptureRequest, default_title};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn capture_kinds_map_to_material_types() {
        assert_eq!(CaptureKind::Ocr.material_type(), "pdf");
        assert_eq!(CaptureKind::Whisper.material_type(), "audio");
    }

    #[test]
    fn unknown_capture_kinds_are_rejected_at_deserialization() {
        let result = serde_json::from_value::<CaptureRequest>(json!({
            "courseId": "018f6f50-9c3a-7e57-b0f4-111111111111",
            "type": "video",
            "fileUrl": "https://cdn.example.com/file.mp4"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn default_titles_carry_the_capture_date() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(default_title(CaptureKind::Ocr, now), "Scanned - 3/9/2025");
        assert_eq!(
            default_title(CaptureKind::Whisper, now),
            "Transcribed - 3/9/2025"
        );
    }
}
