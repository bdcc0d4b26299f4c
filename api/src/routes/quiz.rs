use std::collections::HashMap;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use kapsa_core::error::ApiError;
use kapsa_core::grading::{grade_for_score, motivation_text};
use kapsa_core::lang::{Language, detect_language};
use kapsa_core::repair::extract_json_array;
use kapsa_core::sanitize::{bool_field, string_field, truncate_chars};

use crate::auth::{AuthenticatedUser, authenticate};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::generate::json_array_with_retry;
use crate::inference::ReplicateClient;
use crate::materials::{build_material_context, joined_content, load_course_materials};
use crate::ownership::require_course;
use crate::state::AppState;
use crate::validate::{MAX_ANSWER_CHARS, QUIZ_COUNT_DEFAULT, QUIZ_COUNT_RANGE, clamp_count};

const MATERIAL_CONTEXT_CHARS: usize = 2000;
const GENERATION_MAX_TOKENS: u32 = 2048;
const EVALUATION_MAX_TOKENS: u32 = 2048;
const NO_MATERIALS_FALLBACK: &str = "Generate general knowledge questions for the course.";

const MAX_QUESTION_CHARS: usize = 1000;
const MAX_CORRECT_ANSWER_CHARS: usize = 2000;
const MAX_INSIGHT_CHARS: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/quiz", post(handle_quiz))
}

/// A quiz moves through three states: questions generated, answers
/// submitted, evaluated. The two actions below drive the transitions.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum QuizRequest {
    #[serde(rename_all = "camelCase")]
    Generate {
        course_id: Uuid,
        #[serde(default)]
        count: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Evaluate {
        test_id: Uuid,
        answers: Vec<AnswerInput>,
    },
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: Uuid,
    pub answer: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct TestRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub score: Option<f64>,
    pub grade: Option<String>,
    pub correct_count: Option<i32>,
    pub total_count: i32,
    pub motivation_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct TestQuestionRow {
    pub id: Uuid,
    pub test_id: Uuid,
    pub question_number: i32,
    pub question: String,
    pub correct_answer: String,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub ai_insight: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuizResponse {
    pub test: TestRow,
    pub questions: Vec<TestQuestionRow>,
}

/// Generate questions or evaluate submitted answers, depending on `action`.
#[utoipa::path(
    post,
    path = "/v1/quiz",
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Test with questions", body = QuizResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Course or test not found", body = ApiError),
        (status = 500, description = "Inference or parsing failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "quiz"
)]
pub async fn handle_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<QuizRequest>,
) -> Result<Json<QuizResponse>, AppError> {
    let user = authenticate(&state, &headers).await?;
    match req {
        QuizRequest::Generate { course_id, count } => {
            generate_quiz(state, user, course_id, count).await
        }
        QuizRequest::Evaluate { test_id, answers } => {
            evaluate_quiz(state, user, test_id, answers).await
        }
    }
}

// --- generate ---

/// A quiz question as coerced out of the model's untrusted output.
#[derive(Debug, PartialEq)]
struct QuestionDraft {
    question: String,
    correct_answer: String,
}

fn sanitize_questions(items: &[Value]) -> Vec<QuestionDraft> {
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| QuestionDraft {
            question: string_field(item, "question", MAX_QUESTION_CHARS),
            correct_answer: string_field(item, "correct_answer", MAX_CORRECT_ANSWER_CHARS),
        })
        .collect()
}

fn build_generation_system_prompt(course_title: &str, language: &str, count: i64) -> String {
    format!(
        "You are a quiz generator for \"{course_title}\".\n\n\
         CRITICAL LANGUAGE RULE: The course material is in {language}. You MUST generate ALL \
         quiz content (questions and correct_answer) in {language}. Do NOT translate to \
         English. Keep the same language as the source material.\n\n\
         Generate exactly {count} quiz questions in JSON format. Each question must have:\n\
         - question: The full question text (in {language})\n\
         - correct_answer: The correct answer, concise 1-2 sentences max (in {language})\n\n\
         Make questions that test understanding, not just memorization.\n\
         Vary difficulty: mix easy, medium, and hard questions.\n\n\
         IMPORTANT: Output ONLY a valid JSON array. No markdown, no explanation."
    )
}

async fn generate_quiz(
    state: AppState,
    user: AuthenticatedUser,
    course_id: Uuid,
    count: Option<i64>,
) -> Result<Json<QuizResponse>, AppError> {
    let count = clamp_count(count, QUIZ_COUNT_DEFAULT, QUIZ_COUNT_RANGE);

    let course = require_course(&state.db, course_id, user.user_id).await?;

    let materials = load_course_materials(&state.db, course_id, user.user_id, None).await?;
    let material_content =
        build_material_context(&materials, MATERIAL_CONTEXT_CHARS, NO_MATERIALS_FALLBACK);
    let language = detect_language(&joined_content(&materials), 20, 3);

    let system_prompt = build_generation_system_prompt(&course.title, language.name(), count);
    let prompt = format!(
        "Based on this course material, generate {count} quiz questions in the SAME LANGUAGE \
         as the material:\n\n{material_content}\n\nOutput the JSON array now:"
    );
    let retry_prompt = format!(
        "Generate exactly {count} quiz questions as a JSON array. Output ONLY the JSON array \
         starting with [ and ending with ]. No text before or after.\n\n\
         Material:\n{material}\n\nJSON array:",
        material = truncate_chars(&material_content, 2000)
    );

    let items = json_array_with_retry(
        &state.replicate,
        &system_prompt,
        &prompt,
        &retry_prompt,
        GENERATION_MAX_TOKENS,
    )
    .await?;
    let drafts = sanitize_questions(&items);

    let mut tx = state.db.begin().await?;
    let test = sqlx::query_as::<_, TestRow>(
        "INSERT INTO tests (id, course_id, user_id, title, total_count) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, course_id, user_id, title, score, grade, correct_count, total_count, \
                   motivation_text, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(course_id)
    .bind(user.user_id)
    .bind(format!("{} - Quiz", course.title))
    .bind(drafts.len() as i32)
    .fetch_one(&mut *tx)
    .await?;

    let mut questions = Vec::with_capacity(drafts.len());
    for (i, draft) in drafts.iter().enumerate() {
        let row = sqlx::query_as::<_, TestQuestionRow>(
            "INSERT INTO test_questions (id, test_id, question_number, question, correct_answer) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, test_id, question_number, question, correct_answer, user_answer, \
                       is_correct, ai_insight, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(test.id)
        .bind((i + 1) as i32)
        .bind(&draft.question)
        .bind(&draft.correct_answer)
        .fetch_one(&mut *tx)
        .await?;
        questions.push(row);
    }
    tx.commit().await?;

    tracing::info!(
        user_id = %user.user_id,
        test_id = %test.id,
        questions = questions.len(),
        "Quiz generated"
    );

    Ok(Json(QuizResponse { test, questions }))
}

// --- evaluate ---

struct GradedAnswer {
    user_answer: String,
    is_correct: bool,
    ai_insight: String,
}

/// Default insight on the AI grading path when the model omits one.
fn default_insight(language: Language, is_correct: bool) -> &'static str {
    match (language, is_correct) {
        (Language::Spanish, true) => "¡Correcto! Buen trabajo.",
        (Language::Spanish, false) => "Revisa este tema.",
        (_, true) => "Correct! Great job.",
        (_, false) => "Review this topic.",
    }
}

/// Insight used on the deterministic fallback path.
fn fallback_insight(language: Language, is_correct: bool) -> &'static str {
    match (language, is_correct) {
        (Language::Spanish, true) => "¡Correcto! Buen trabajo.",
        (Language::Spanish, false) => "Revisa este tema para mejorar tu comprensión.",
        (_, true) => "Correct! Great job.",
        (_, false) => "Review this topic for better understanding.",
    }
}

/// Deterministic grading: case-insensitive exact match, or the correct
/// answer containing the student's answer. Blank answers are never correct.
fn fallback_is_correct(user_answer: &str, correct_answer: &str) -> bool {
    let user = user_answer.trim().to_lowercase();
    if user.is_empty() {
        return false;
    }
    let correct = correct_answer.trim().to_lowercase();
    user == correct || correct.contains(&user)
}

fn format_answer_sheet(
    questions: &[TestQuestionRow],
    answers: &HashMap<Uuid, String>,
) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let user_answer = answers.get(&q.id).map(String::as_str).unwrap_or_default();
            format!(
                "Q{}: {}\nCorrect Answer: {}\nStudent Answer: {}",
                i + 1,
                q.question,
                q.correct_answer,
                truncate_chars(user_answer, MAX_ANSWER_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_evaluation_system_prompt(language: &str) -> String {
    format!(
        "You are a fair and encouraging study tutor evaluating a student's quiz answers.\n\n\
         CRITICAL: Respond in {language}.\n\n\
         For each question, evaluate if the student's answer demonstrates understanding of the \
         concept, even if the wording differs from the correct answer. Be lenient — if the \
         student shows they understand the key concept, mark it as correct.\n\n\
         For each question, provide:\n\
         - is_correct: true/false (true if the student demonstrates understanding)\n\
         - ai_insight: A brief 1-2 sentence insight in {language}. For correct answers, praise \
         briefly. For wrong answers, explain why it's wrong and help them remember the correct \
         answer.\n\n\
         IMPORTANT: Output ONLY a valid JSON array with objects like: \
         [{{\"is_correct\": true, \"ai_insight\": \"...\"}}]\n\
         One object per question, in order. No markdown, no explanation outside the JSON."
    )
}

/// One batched lenient-grading call; errors here are recoverable.
async fn ai_evaluate(
    replicate: &ReplicateClient,
    system_prompt: &str,
    prompt: &str,
) -> Result<Vec<Value>, AppError> {
    let raw = replicate
        .generate_text(system_prompt, prompt, EVALUATION_MAX_TOKENS)
        .await?;
    Ok(extract_json_array(&raw)?)
}

/// Merge the model's verdicts onto the questions, coercing each field and
/// filling defaults where the model returned less than one object per
/// question.
fn apply_ai_evaluations(
    questions: &[TestQuestionRow],
    answers: &HashMap<Uuid, String>,
    evaluations: &[Value],
    language: Language,
) -> Vec<GradedAnswer> {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let user_answer = answers.get(&q.id).map(String::as_str).unwrap_or_default();
            let is_correct = evaluations
                .get(i)
                .map(|e| bool_field(e, "is_correct"))
                .unwrap_or(false);
            let insight = evaluations
                .get(i)
                .map(|e| string_field(e, "ai_insight", MAX_INSIGHT_CHARS))
                .unwrap_or_default();
            GradedAnswer {
                user_answer: truncate_chars(user_answer, MAX_ANSWER_CHARS).to_string(),
                is_correct,
                ai_insight: if insight.is_empty() {
                    default_insight(language, is_correct).to_string()
                } else {
                    insight
                },
            }
        })
        .collect()
}

/// Deterministic grading for every question, used when the AI path fails.
fn fallback_grade(
    questions: &[TestQuestionRow],
    answers: &HashMap<Uuid, String>,
    language: Language,
) -> Vec<GradedAnswer> {
    questions
        .iter()
        .map(|q| {
            let user_answer = answers.get(&q.id).map(String::as_str).unwrap_or_default();
            let is_correct = fallback_is_correct(user_answer, &q.correct_answer);
            GradedAnswer {
                user_answer: truncate_chars(user_answer, MAX_ANSWER_CHARS).to_string(),
                is_correct,
                ai_insight: fallback_insight(language, is_correct).to_string(),
            }
        })
        .collect()
}

async fn evaluate_quiz(
    state: AppState,
    user: AuthenticatedUser,
    test_id: Uuid,
    answers: Vec<AnswerInput>,
) -> Result<Json<QuizResponse>, AppError> {
    if answers.is_empty() {
        return Err(AppError::Validation {
            message: "answers must not be empty".to_string(),
            field: Some("answers".to_string()),
        });
    }

    let mut test = sqlx::query_as::<_, TestRow>(
        "SELECT id, course_id, user_id, title, score, grade, correct_count, total_count, \
                motivation_text, created_at \
         FROM tests WHERE id = $1 AND user_id = $2",
    )
    .bind(test_id)
    .bind(user.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "Test".to_string(),
    })?;

    // Questions are scoped through the verified test.
    let mut questions = sqlx::query_as::<_, TestQuestionRow>(
        "SELECT id, test_id, question_number, question, correct_answer, user_answer, \
                is_correct, ai_insight, created_at \
         FROM test_questions WHERE test_id = $1 ORDER BY question_number ASC",
    )
    .bind(test_id)
    .fetch_all(&state.db)
    .await?;

    let answers_by_question: HashMap<Uuid, String> = answers
        .into_iter()
        .map(|a| (a.question_id, a.answer))
        .collect();

    let questions_text = questions
        .iter()
        .map(|q| q.question.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let language = detect_language(&questions_text, 20, 3);

    let system_prompt = build_evaluation_system_prompt(language.name());
    let prompt = format!(
        "Evaluate these {} student answers:\n\n{}\n\nOutput the JSON array now:",
        questions.len(),
        format_answer_sheet(&questions, &answers_by_question)
    );

    // Lenient AI grading first; any failure silently degrades to string
    // matching rather than failing the request.
    let graded = match ai_evaluate(&state.replicate, &system_prompt, &prompt).await {
        Ok(evaluations) => {
            apply_ai_evaluations(&questions, &answers_by_question, &evaluations, language)
        }
        Err(err) => {
            tracing::warn!(
                test_id = %test_id,
                "AI evaluation failed ({:?}), falling back to string comparison",
                err
            );
            fallback_grade(&questions, &answers_by_question, language)
        }
    };

    let correct_count = graded.iter().filter(|g| g.is_correct).count() as i32;
    let total = questions.len().max(1) as f64;
    let score = f64::from(correct_count) / total;
    let grade = grade_for_score(score);
    let motivation = motivation_text(language, score);

    // The test update and every question update commit together.
    let mut tx = state.db.begin().await?;
    sqlx::query(
        "UPDATE tests SET score = $1, grade = $2, correct_count = $3, motivation_text = $4 \
         WHERE id = $5 AND user_id = $6",
    )
    .bind(score)
    .bind(grade)
    .bind(correct_count)
    .bind(motivation)
    .bind(test_id)
    .bind(user.user_id)
    .execute(&mut *tx)
    .await?;

    for (question, graded) in questions.iter().zip(&graded) {
        sqlx::query(
            "UPDATE test_questions SET user_answer = $1, is_correct = $2, ai_insight = $3 \
             WHERE id = $4 AND test_id = $5",
        )
        .bind(&graded.user_answer)
        .bind(graded.is_correct)
        .bind(&graded.ai_insight)
        .bind(question.id)
        .bind(test_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    test.score = Some(score);
    test.grade = Some(grade.to_string());
    test.correct_count = Some(correct_count);
    test.motivation_text = Some(motivation.to_string());
    for (question, graded) in questions.iter_mut().zip(graded) {
        question.user_answer = Some(graded.user_answer);
        question.is_correct = Some(graded.is_correct);
        question.ai_insight = Some(graded.ai_insight);
    }

    tracing::info!(
        user_id = %user.user_id,
        test_id = %test_id,
        correct = correct_count,
        "Quiz evaluated"
    );

    Ok(Json(QuizResponse { test, questions }))
}

#[cfg(test)]
mod tests {
    use super::{
        GradedAnswer, QuizRequest, TestQuestionRow, apply_ai_evaluations, fallback_grade,
        fallback_is_correct, sanitize_questions,
    };
    use chrono::Utc;
    use kapsa_core::lang::Language;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn question(correct_answer: &str) -> TestQuestionRow {
        TestQuestionRow {
            id: Uuid::now_v7(),
            test_id: Uuid::now_v7(),
            question_number: 1,
            question: "What produces ATP?".to_string(),
            correct_answer: correct_answer.to_string(),
            user_answer: None,
            is_correct: None,
            ai_insight: None,
            created_at: Utc::now(),
        }
    }

    fn answers_for(q: &TestQuestionRow, answer: &str) -> HashMap<Uuid, String> {
        HashMap::from([(q.id, answer.to_string())])
    }

    #[test]
    fn request_actions_deserialize_by_tag() {
        let generate: QuizRequest = serde_json::from_value(json!({
            "action": "generate",
            "courseId": "018f6f50-9c3a-7e57-b0f4-111111111111",
            "count": 5
        }))
        .unwrap();
        assert!(matches!(generate, QuizRequest::Generate { .. }));

        let evaluate: QuizRequest = serde_json::from_value(json!({
            "action": "evaluate",
            "testId": "018f6f50-9c3a-7e57-b0f4-222222222222",
            "answers": [{"questionId": "018f6f50-9c3a-7e57-b0f4-333333333333", "answer": "x"}]
        }))
        .unwrap();
        assert!(matches!(evaluate, QuizRequest::Evaluate { .. }));
    }

    #[test]
    fn malformed_question_ids_fail_deserialization() {
        let result = serde_json::from_value::<QuizRequest>(json!({
            "action": "evaluate",
            "testId": "not-a-uuid",
            "answers": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn exact_and_substring_matches_are_correct() {
        assert!(fallback_is_correct("Mitochondria", "mitochondria"));
        assert!(fallback_is_correct("ATP", "The cell produces ATP in the mitochondria"));
        assert!(!fallback_is_correct("chloroplast", "mitochondria"));
    }

    #[test]
    fn blank_answers_are_never_correct_in_fallback() {
        assert!(!fallback_is_correct("", "anything"));
        assert!(!fallback_is_correct("   ", "anything"));
    }

    #[test]
    fn fallback_grades_every_question_without_raising() {
        let q = question("the mitochondria");
        let graded = fallback_grade(
            std::slice::from_ref(&q),
            &answers_for(&q, "The Mitochondria"),
            Language::English,
        );
        assert_eq!(graded.len(), 1);
        assert!(graded[0].is_correct);
        assert_eq!(graded[0].ai_insight, "Correct! Great job.");
    }

    #[test]
    fn fallback_insights_are_localized_for_spanish() {
        let q = question("la mitocondria");
        let graded = fallback_grade(
            std::slice::from_ref(&q),
            &answers_for(&q, "el cloroplasto"),
            Language::Spanish,
        );
        assert!(!graded[0].is_correct);
        assert_eq!(
            graded[0].ai_insight,
            "Revisa este tema para mejorar tu comprensión."
        );
    }

    #[test]
    fn missing_ai_verdicts_default_to_incorrect() {
        let q = question("answer");
        let graded: Vec<GradedAnswer> = apply_ai_evaluations(
            std::slice::from_ref(&q),
            &answers_for(&q, "whatever"),
            &[],
            Language::English,
        );
        assert!(!graded[0].is_correct);
        assert_eq!(graded[0].ai_insight, "Review this topic.");
    }

    #[test]
    fn ai_verdicts_are_coerced_and_insights_bounded() {
        let q = question("answer");
        let evaluations = vec![json!({
            "is_correct": true,
            "ai_insight": "i".repeat(900)
        })];
        let graded = apply_ai_evaluations(
            std::slice::from_ref(&q),
            &answers_for(&q, "answer"),
            &evaluations,
            Language::English,
        );
        assert!(graded[0].is_correct);
        assert_eq!(graded[0].ai_insight.len(), 500);
    }

    #[test]
    fn generated_questions_are_sanitized() {
        let items = vec![
            json!({"question": "q".repeat(1500), "correct_answer": 7}),
            json!("junk"),
        ];
        let drafts = sanitize_questions(&items);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].question.len(), 1000);
        assert_eq!(drafts[0].correct_answer, "");
    }
}
