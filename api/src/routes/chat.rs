use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kapsa_core::error::ApiError;
use kapsa_core::lang::{Language, detect_language};
use kapsa_core::sanitize::truncate_chars;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::materials::{MaterialRow, joined_content, load_course_materials};
use crate::ownership::{require_course, require_session};
use crate::state::AppState;
use crate::validate::{MAX_HISTORY_ENTRY_CHARS, MAX_MESSAGE_CHARS, required_text};

const MATERIAL_CONTEXT_CHARS: usize = 2000;
const MAX_CITATIONS: usize = 3;
const REPLY_MAX_TOKENS: u32 = 1024;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/chat", post(send_chat_message))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub course_id: Uuid,
    pub session_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: String,
    pub content: String,
    pub citations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The user's message language wins; course material language is the
/// fallback before defaulting to English.
fn response_language(message_lang: Language, material_lang: Language) -> Language {
    if message_lang != Language::English {
        message_lang
    } else {
        material_lang
    }
}

/// Format materials for the tutor prompt, tagging each with its type so the
/// model can cite "the lecture recording" vs "the scanned notes".
fn format_material_context(materials: &[MaterialRow]) -> String {
    materials
        .iter()
        .map(|m| {
            format!(
                "--- {} ({}) ---\n{}",
                m.title,
                m.kind,
                truncate_chars(m.content.as_deref().unwrap_or_default(), MATERIAL_CONTEXT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render prior turns as `Student:`/`Tutor:` lines, each entry bounded.
fn format_history(history: &[HistoryMessage]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let turns = history
        .iter()
        .map(|h| {
            let speaker = if h.role == "user" { "Student" } else { "Tutor" };
            format!(
                "{}: {}",
                speaker,
                truncate_chars(&h.content, MAX_HISTORY_ENTRY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\nConversation History:\n{turns}")
}

fn build_system_prompt(
    course_title: &str,
    course_subtitle: Option<&str>,
    response_lang: Language,
    message_lang: Language,
    material_lang: Language,
    material_context: &str,
) -> String {
    let subtitle = course_subtitle
        .map(|s| format!(" - {s}"))
        .unwrap_or_default();
    let materials = if material_context.is_empty() {
        String::new()
    } else {
        format!("\n\nCourse Materials Available:\n{material_context}")
    };
    format!(
        "You are \"The Oracle\", an expert AI study tutor for the course \"{course_title}\"{subtitle}.\n\n\
         Your role:\n\
         - Help students understand course concepts clearly and concisely\n\
         - Use analogies and examples to explain complex topics\n\
         - Reference specific course materials when relevant\n\
         - Be encouraging and supportive\n\
         - Keep responses focused and educational\n\
         - When referencing materials, mention them as citations\n\n\
         CRITICAL LANGUAGE RULE: You MUST respond in {response}. The student's message is in \
         {message} and the course materials are in {material}. Always match the student's \
         language. If they write in Spanish, respond entirely in Spanish. If they write in \
         English, respond in English. Never mix languages.{materials}",
        response = response_lang.name(),
        message = message_lang.name(),
        material = material_lang.name(),
    )
}

/// Answer a student's question about a course and persist the reply.
///
/// Only the assistant message is written here — the caller persists its own
/// user messages. Citations are the titles of the materials fed as context.
#[utoipa::path(
    post,
    path = "/v1/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant message persisted", body = ChatMessageRow),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Course or session not found", body = ApiError),
        (status = 500, description = "Inference failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn send_chat_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Json<ChatMessageRow>, AppError> {
    let message = required_text(&req.message, "message", MAX_MESSAGE_CHARS)?;
    let user = authenticate(&state, &headers).await?;

    let course = require_course(&state.db, req.course_id, user.user_id).await?;
    require_session(&state.db, req.session_id, user.user_id).await?;

    let materials =
        load_course_materials(&state.db, req.course_id, user.user_id, None).await?;
    let material_context = format_material_context(&materials);

    let material_lang = detect_language(&joined_content(&materials), 20, 3);
    let message_lang = detect_language(&message, 20, 3);
    let response_lang = response_language(message_lang, material_lang);

    let system_prompt = build_system_prompt(
        &course.title,
        course.subtitle.as_deref(),
        response_lang,
        message_lang,
        material_lang,
        &material_context,
    );
    let prompt = format!(
        "{}\n\nStudent: {}\n\nTutor:",
        format_history(&req.history),
        message
    );

    let reply = state
        .replicate
        .generate_text(&system_prompt, &prompt, REPLY_MAX_TOKENS)
        .await?;

    let citations: Vec<String> = materials
        .iter()
        .take(MAX_CITATIONS)
        .map(|m| m.title.clone())
        .collect();

    let row = sqlx::query_as::<_, ChatMessageRow>(
        "INSERT INTO chat_messages (id, session_id, role, content, citations) \
         VALUES ($1, $2, 'assistant', $3, $4) \
         RETURNING id, session_id, role, content, citations, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(req.session_id)
    .bind(reply.trim())
    .bind(&citations)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::{HistoryMessage, format_history, format_material_context, response_language};
    use crate::materials::MaterialRow;
    use kapsa_core::lang::Language;

    #[test]
    fn material_context_tags_each_entry_with_its_type() {
        let materials = vec![MaterialRow {
            title: "Lecture 4".to_string(),
            content: Some("Krebs cycle notes".to_string()),
            kind: "audio".to_string(),
        }];
        assert_eq!(
            format_material_context(&materials),
            "--- Lecture 4 (audio) ---\nKrebs cycle notes"
        );
        assert_eq!(format_material_context(&[]), "");
    }

    #[test]
    fn user_message_language_takes_priority() {
        assert_eq!(
            response_language(Language::Spanish, Language::German),
            Language::Spanish
        );
        assert_eq!(
            response_language(Language::English, Language::Portuguese),
            Language::Portuguese
        );
        assert_eq!(
            response_language(Language::English, Language::English),
            Language::English
        );
    }

    #[test]
    fn history_is_rendered_as_labeled_turns() {
        let history = vec![
            HistoryMessage {
                role: "user".to_string(),
                content: "What is ATP?".to_string(),
            },
            HistoryMessage {
                role: "assistant".to_string(),
                content: "The energy currency of the cell.".to_string(),
            },
        ];
        let rendered = format_history(&history);
        assert!(rendered.contains("Student: What is ATP?"));
        assert!(rendered.contains("Tutor: The energy currency of the cell."));
    }

    #[test]
    fn history_entries_are_bounded() {
        let history = vec![HistoryMessage {
            role: "user".to_string(),
            content: "x".repeat(3000),
        }];
        let rendered = format_history(&history);
        assert!(rendered.len() < 2100);
    }

    #[test]
    fn empty_history_renders_nothing() {
        assert_eq!(format_history(&[]), "");
    }
}
