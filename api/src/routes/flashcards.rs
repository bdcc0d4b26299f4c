use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use kapsa_core::error::ApiError;
use kapsa_core::lang::detect_language;
use kapsa_core::sanitize::{string_field, string_field_or};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::generate::json_array_with_retry;
use crate::materials::{build_material_context, joined_content, load_course_materials};
use crate::ownership::require_course;
use crate::state::AppState;
use crate::validate::{
    FLASHCARD_COUNT_DEFAULT, FLASHCARD_COUNT_RANGE, MAX_TOPIC_CHARS, clamp_count, optional_text,
};

const MATERIAL_CONTEXT_CHARS: usize = 3000;
const GENERATION_MAX_TOKENS: u32 = 2048;
const NO_MATERIALS_FALLBACK: &str =
    "No materials available. Generate general study flashcards for the course.";

const MAX_TOPIC_FIELD_CHARS: usize = 200;
const MAX_QUESTION_PART_CHARS: usize = 1000;
const MAX_KEYWORD_CHARS: usize = 100;
const MAX_ANSWER_FIELD_CHARS: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/flashcards", post(generate_flashcards))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFlashcardsRequest {
    pub course_id: Uuid,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub material_id: Option<Uuid>,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct DeckRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub card_count: i32,
    pub created_at: DateTime<Utc>,
}

/// A flashcard as coerced out of the model's untrusted output.
#[derive(Debug, PartialEq)]
struct CardDraft {
    topic: String,
    question_before: String,
    keyword: String,
    question_after: String,
    answer: String,
}

/// Coerce and bound each generated card. Non-object elements are dropped;
/// the surviving count becomes the deck's persisted card_count.
fn sanitize_cards(items: &[Value]) -> Vec<CardDraft> {
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| CardDraft {
            topic: string_field_or(item, "topic", MAX_TOPIC_FIELD_CHARS, "General"),
            question_before: string_field(item, "question_before", MAX_QUESTION_PART_CHARS),
            keyword: string_field(item, "keyword", MAX_KEYWORD_CHARS),
            question_after: string_field(item, "question_after", MAX_QUESTION_PART_CHARS),
            answer: string_field(item, "answer", MAX_ANSWER_FIELD_CHARS),
        })
        .collect()
}

fn build_system_prompt(
    course_title: &str,
    language: &str,
    count: i64,
    topic: Option<&str>,
) -> String {
    let focus = topic
        .map(|t| format!("\nFocus on the topic: {t}"))
        .unwrap_or_default();
    format!(
        "You are a flashcard generator for the course \"{course_title}\".\n\n\
         CRITICAL LANGUAGE RULE: The course material is in {language}. You MUST generate ALL \
         flashcard content (topic, question_before, keyword, question_after, and answer) in \
         {language}. Do NOT translate to English. Keep the same language as the source material.\n\n\
         Generate exactly {count} flashcards in JSON format. Each flashcard must have:\n\
         - topic: The specific topic/category\n\
         - question_before: The first part of the question before the key term\n\
         - keyword: The key term/concept that should be highlighted (1-3 words)\n\
         - question_after: The rest of the question after the keyword (can be empty string)\n\
         - answer: A clear, concise answer (1-3 sentences)\n\n\
         The question format should read naturally: question_before + keyword + question_after \
         forms the full question.\n\n\
         IMPORTANT: Output ONLY a valid JSON array. No markdown, no explanation, just the JSON \
         array.{focus}"
    )
}

/// Generate a deck of flashcards from a course's materials.
///
/// The deck and all of its cards are inserted in one transaction; card_count
/// reflects the cards that survived sanitization, not the requested count.
#[utoipa::path(
    post,
    path = "/v1/flashcards",
    request_body = GenerateFlashcardsRequest,
    responses(
        (status = 200, description = "Deck created with generated cards", body = DeckRow),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Course not found", body = ApiError),
        (status = 500, description = "Inference or parsing failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "flashcards"
)]
pub async fn generate_flashcards(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<GenerateFlashcardsRequest>,
) -> Result<Json<DeckRow>, AppError> {
    let count = clamp_count(req.count, FLASHCARD_COUNT_DEFAULT, FLASHCARD_COUNT_RANGE);
    let topic = optional_text(req.topic.as_deref(), MAX_TOPIC_CHARS);
    let user = authenticate(&state, &headers).await?;

    let course = require_course(&state.db, req.course_id, user.user_id).await?;

    let materials =
        load_course_materials(&state.db, req.course_id, user.user_id, req.material_id).await?;
    let material_content =
        build_material_context(&materials, MATERIAL_CONTEXT_CHARS, NO_MATERIALS_FALLBACK);
    let language = detect_language(&joined_content(&materials), 20, 3);

    let system_prompt =
        build_system_prompt(&course.title, language.name(), count, topic.as_deref());
    let prompt = format!(
        "Based on this course material, generate {count} flashcards in the SAME LANGUAGE as \
         the material:\n\n{material_content}\n\nOutput the JSON array now:"
    );
    let retry_prompt = format!(
        "Generate exactly {count} flashcards as a JSON array. Output ONLY the JSON array \
         starting with [ and ending with ]. No text before or after.\n\n\
         Material:\n{material_content}\n\nJSON array:"
    );

    let items = json_array_with_retry(
        &state.replicate,
        &system_prompt,
        &prompt,
        &retry_prompt,
        GENERATION_MAX_TOKENS,
    )
    .await?;
    let cards = sanitize_cards(&items);

    let deck_title = topic.unwrap_or_else(|| {
        if course.title.trim().is_empty() {
            "Study Deck".to_string()
        } else {
            course.title.clone()
        }
    });

    let mut tx = state.db.begin().await?;
    let deck = sqlx::query_as::<_, DeckRow>(
        "INSERT INTO flashcard_decks (id, course_id, user_id, title, card_count) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, course_id, user_id, title, card_count, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(req.course_id)
    .bind(user.user_id)
    .bind(&deck_title)
    .bind(cards.len() as i32)
    .fetch_one(&mut *tx)
    .await?;

    for card in &cards {
        sqlx::query(
            "INSERT INTO flashcards \
             (id, deck_id, topic, question_before, keyword, question_after, answer) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::now_v7())
        .bind(deck.id)
        .bind(&card.topic)
        .bind(&card.question_before)
        .bind(&card.keyword)
        .bind(&card.question_after)
        .bind(&card.answer)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        user_id = %user.user_id,
        deck_id = %deck.id,
        cards = cards.len(),
        "Flashcard deck generated"
    );

    Ok(Json(deck))
}

#[cfg(test)]
mod tests {
    use super::{build_system_prompt, sanitize_cards};
    use serde_json::json;

    #[test]
    fn cards_are_coerced_field_by_field() {
        let items = vec![json!({
            "topic": "Cell Structure",
            "question_before": "What is the primary function of the ",
            "keyword": "mitochondria",
            "question_after": "?",
            "answer": "It produces ATP."
        })];
        let cards = sanitize_cards(&items);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].keyword, "mitochondria");
    }

    #[test]
    fn non_object_elements_are_dropped() {
        let items = vec![json!("not a card"), json!(42), json!({"answer": "kept"})];
        let cards = sanitize_cards(&items);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].answer, "kept");
    }

    #[test]
    fn missing_fields_default_and_long_fields_truncate() {
        let items = vec![json!({
            "topic": "",
            "answer": "a".repeat(5000)
        })];
        let cards = sanitize_cards(&items);
        assert_eq!(cards[0].topic, "General");
        assert_eq!(cards[0].question_before, "");
        assert_eq!(cards[0].answer.len(), 2000);
    }

    #[test]
    fn system_prompt_pins_count_language_and_topic() {
        let prompt = build_system_prompt("Biología", "Spanish", 12, Some("La célula"));
        assert!(prompt.contains("exactly 12 flashcards"));
        assert!(prompt.contains("material is in Spanish"));
        assert!(prompt.contains("Focus on the topic: La célula"));
    }
}
