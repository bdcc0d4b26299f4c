use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use kapsa_core::error::ApiError;
use kapsa_core::lang::{Language, detect_language};
use kapsa_core::repair::{extract_json_array, extract_json_object};
use kapsa_core::sanitize::{i64_field, string_field, string_field_or, truncate_chars};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::routes::chat::HistoryMessage;
use crate::state::AppState;
use crate::validate::{MAX_HISTORY_ENTRY_CHARS, MAX_MESSAGE_CHARS, required_text};

const INSIGHT_MAX_TOKENS: u32 = 256;
const CHAT_MAX_TOKENS: u32 = 1024;
const CALENDAR_MAX_TOKENS: u32 = 1024;

/// How many prior turns feed the assistant prompt.
const CHAT_HISTORY_WINDOW: usize = 8;

/// At most this many suggested events are created per request.
const MAX_CALENDAR_SUGGESTIONS: usize = 5;

const MAX_DESCRIPTION_CHARS: usize = 1000;
const MAX_SUGGESTION_CHARS: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/assistant", post(run_assistant))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssistantMode {
    Insights,
    Chat,
    CalendarSuggestions,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    pub mode: AssistantMode,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct InsightResponse {
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AssistantReply {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct CalendarEventRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub ai_suggestion: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CalendarSuggestionsResponse {
    pub suggestions: Vec<CalendarEventRow>,
}

// --- context gathering ---

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    full_name: Option<String>,
    streak_days: Option<i32>,
}

#[derive(Debug, sqlx::FromRow)]
struct CourseOverviewRow {
    title: String,
    progress: Option<f64>,
    exam_date: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct RecentTestRow {
    id: Uuid,
    title: String,
    grade: Option<String>,
    correct_count: Option<i32>,
    total_count: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct FlashcardStatsRow {
    mastered: i64,
    learning: i64,
    total_new: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct UpcomingEventRow {
    title: String,
    #[sqlx(rename = "type")]
    kind: String,
    start_time: DateTime<Utc>,
}

/// Everything the assistant knows about the student for one request.
struct StudentSnapshot {
    first_name: String,
    last_name: String,
    streak_days: i32,
    course_count: usize,
    courses: Vec<CourseOverviewRow>,
    recent_tests: Vec<RecentTestRow>,
    flashcard_stats: Option<FlashcardStatsRow>,
    upcoming_events: Vec<UpcomingEventRow>,
    weak_topics: Vec<String>,
    material_sample: String,
}

fn split_full_name(full_name: Option<&str>) -> (String, String) {
    let full_name = full_name.unwrap_or_default().trim().to_string();
    if full_name.is_empty() {
        return ("Student".to_string(), String::new());
    }
    match full_name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.to_string()),
        None => (full_name, String::new()),
    }
}

async fn load_student_snapshot(
    state: &AppState,
    user_id: Uuid,
) -> Result<StudentSnapshot, AppError> {
    let profile = sqlx::query_as::<_, ProfileRow>(
        "SELECT full_name, streak_days FROM profiles WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?;

    let courses = sqlx::query_as::<_, CourseOverviewRow>(
        "SELECT title, progress, exam_date FROM courses \
         WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    let recent_tests = sqlx::query_as::<_, RecentTestRow>(
        "SELECT id, title, grade, correct_count, total_count FROM tests \
         WHERE user_id = $1 ORDER BY created_at DESC LIMIT 5",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    let flashcard_stats = sqlx::query_as::<_, FlashcardStatsRow>(
        "SELECT mastered, learning, total_new FROM get_flashcard_stats($1)",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?;

    let upcoming_events = sqlx::query_as::<_, UpcomingEventRow>(
        "SELECT title, type, start_time FROM calendar_events \
         WHERE user_id = $1 AND start_time >= NOW() \
         ORDER BY start_time ASC LIMIT 10",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    let material_contents = sqlx::query_scalar::<_, String>(
        "SELECT content FROM course_materials \
         WHERE user_id = $1 AND content IS NOT NULL \
         ORDER BY created_at DESC LIMIT 10",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;
    let material_sample = material_contents
        .iter()
        .map(|content| truncate_chars(content, 200))
        .collect::<Vec<_>>()
        .join(" ");

    let weak_topics = if recent_tests.is_empty() {
        Vec::new()
    } else {
        let test_ids: Vec<Uuid> = recent_tests.iter().map(|t| t.id).collect();
        sqlx::query_scalar::<_, String>(
            "SELECT question FROM test_questions \
             WHERE test_id = ANY($1) AND is_correct = FALSE LIMIT 10",
        )
        .bind(&test_ids)
        .fetch_all(&state.db)
        .await?
        .into_iter()
        .map(|q| truncate_chars(&q, 60).to_string())
        .collect()
    };

    let (first_name, last_name) =
        split_full_name(profile.as_ref().and_then(|p| p.full_name.as_deref()));

    Ok(StudentSnapshot {
        first_name,
        last_name,
        streak_days: profile.and_then(|p| p.streak_days).unwrap_or(0),
        course_count: courses.len(),
        courses,
        recent_tests,
        flashcard_stats,
        upcoming_events,
        weak_topics,
        material_sample,
    })
}

// --- prompt assembly ---

fn summarize_courses(courses: &[CourseOverviewRow]) -> String {
    courses
        .iter()
        .take(5)
        .map(|c| {
            let exam = c
                .exam_date
                .map(|d| format!(" | Exam: {}", d.format("%-m/%-d/%Y")))
                .unwrap_or_default();
            format!(
                "- {} ({:.0}%{})",
                c.title,
                c.progress.unwrap_or(0.0) * 100.0,
                exam
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_tests(tests: &[RecentTestRow]) -> String {
    tests
        .iter()
        .take(3)
        .map(|t| {
            format!(
                "- {}: {} ({}/{})",
                t.title,
                t.grade.as_deref().unwrap_or("N/A"),
                t.correct_count.unwrap_or(0),
                t.total_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_events(events: &[UpcomingEventRow]) -> String {
    events
        .iter()
        .take(5)
        .map(|e| {
            format!(
                "- {} ({}) on {}",
                e.title,
                e.kind,
                e.start_time.format("%-m/%-d/%Y")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_weak_topics(weak_topics: &[String]) -> String {
    if weak_topics.is_empty() {
        "No weak areas identified yet.".to_string()
    } else {
        format!(
            "Weak areas: {}",
            weak_topics
                .iter()
                .take(5)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}

fn summarize_flashcard_stats(stats: Option<&FlashcardStatsRow>) -> String {
    match stats {
        Some(stats) => format!(
            "Flashcards: {} mastered, {} learning, {} new",
            stats.mastered, stats.learning, stats.total_new
        ),
        None => "No flashcard data yet.".to_string(),
    }
}

fn non_empty_or(summary: String, fallback: &str) -> String {
    if summary.is_empty() {
        fallback.to_string()
    } else {
        summary
    }
}

fn build_system_prompt(
    snapshot: &StudentSnapshot,
    response_lang: Language,
    message_lang: Language,
    material_lang: Language,
) -> String {
    format!(
        "You are The Oracle, a personal AI study assistant for {first} in the Kapsa app.\n\n\
         CRITICAL LANGUAGE RULE: You MUST respond in {response}. The student communicates in \
         {message} and their course materials are in {material}. Always match the student's \
         language. If they write in Spanish, respond entirely in Spanish. If English, respond \
         in English. Never mix languages.\n\n\
         STUDENT PROFILE:\n\
         - Name: {first} {last}\n\
         - Streak: {streak} days\n\
         - Total courses: {course_count}\n\n\
         COURSES:\n{courses}\n\n\
         RECENT QUIZ RESULTS:\n{tests}\n\n\
         {flashcards}\n\n\
         {weak}\n\n\
         UPCOMING EVENTS:\n{events}\n\n\
         RULES:\n\
         - Be encouraging, warm, and concise\n\
         - Reference specific courses, scores, and dates when relevant\n\
         - Suggest actionable study strategies\n\
         - If they have upcoming exams, prioritize exam prep advice\n\
         - Keep responses under 150 words for insights mode, normal length for chat mode\n\
         - Use the student's name occasionally\n\
         - Never make up data not provided above",
        first = snapshot.first_name,
        last = snapshot.last_name,
        streak = snapshot.streak_days,
        course_count = snapshot.course_count,
        courses = non_empty_or(summarize_courses(&snapshot.courses), "No courses yet."),
        tests = non_empty_or(summarize_tests(&snapshot.recent_tests), "No quizzes taken yet."),
        flashcards = summarize_flashcard_stats(snapshot.flashcard_stats.as_ref()),
        weak = summarize_weak_topics(&snapshot.weak_topics),
        events = non_empty_or(summarize_events(&snapshot.upcoming_events), "No upcoming events."),
        response = response_lang.name(),
        message = message_lang.name(),
        material = material_lang.name(),
    )
}

/// Run one of the assistant's three modes over the student's data.
#[utoipa::path(
    post,
    path = "/v1/assistant",
    request_body = AssistantRequest,
    responses(
        (status = 200, description = "Insight, reply, or created calendar suggestions"),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 500, description = "Inference failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "assistant"
)]
pub async fn run_assistant(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(req): AppJson<AssistantRequest>,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers).await?;
    let snapshot = load_student_snapshot(&state, user.user_id).await?;

    let message_lang = req
        .message
        .as_deref()
        .map(|m| detect_language(m, 10, 2))
        .unwrap_or(Language::English);
    let material_lang = detect_language(&snapshot.material_sample, 10, 2);
    let response_lang = if message_lang != Language::English {
        message_lang
    } else {
        material_lang
    };

    let system_prompt =
        build_system_prompt(&snapshot, response_lang, message_lang, material_lang);

    match req.mode {
        AssistantMode::Insights => {
            let raw = state
                .replicate
                .generate_text(&system_prompt, insight_prompt(response_lang), INSIGHT_MAX_TOKENS)
                .await?;
            Ok(Json(parse_insight(&raw, response_lang)).into_response())
        }
        AssistantMode::Chat => {
            let message = required_text(
                req.message.as_deref().unwrap_or_default(),
                "message",
                MAX_MESSAGE_CHARS,
            )?;
            let prompt = format_conversation(&req.history, &message);
            let content = state
                .replicate
                .generate_text(&system_prompt, &prompt, CHAT_MAX_TOKENS)
                .await?;
            Ok(Json(AssistantReply {
                role: "assistant".to_string(),
                content: content.trim().to_string(),
            })
            .into_response())
        }
        AssistantMode::CalendarSuggestions => {
            let now = Utc::now();
            let raw = state
                .replicate
                .generate_text(
                    &system_prompt,
                    &calendar_prompt(response_lang, now),
                    CALENDAR_MAX_TOKENS,
                )
                .await?;
            // Unusable output means no suggestions, not a failed request.
            let items = extract_json_array(&raw).unwrap_or_default();
            let drafts = build_event_drafts(&items, response_lang, now);
            let created = insert_suggested_events(&state, user.user_id, &drafts).await;
            Ok(Json(CalendarSuggestionsResponse { suggestions: created }).into_response())
        }
    }
}

// --- insights mode ---

fn insight_prompt(language: Language) -> &'static str {
    if language == Language::Spanish {
        "Basado en los datos del estudiante, genera una perspectiva de estudio personalizada. \
         Considera:\n\
         1. Exámenes próximos\n\
         2. Rendimiento reciente en quizzes y áreas débiles\n\
         3. Racha de estudio\n\
         4. Repaso de flashcards\n\
         5. Progreso de cursos\n\
         Responde con JSON: { \"title\": \"título corto (max 6 palabras)\", \"body\": \"consejo \
         accionable (max 2 oraciones)\", \"type\": \"exam_prep|weak_area|streak|review|progress\" }"
    } else {
        "Based on the student's data, generate a single personalized study insight or reminder. \
         Consider:\n\
         1. Upcoming exams and how soon they are\n\
         2. Recent quiz performance and weak areas\n\
         3. Study streak maintenance\n\
         4. Flashcard review suggestions\n\
         5. Course progress\n\
         Respond with JSON: { \"title\": \"short title (max 6 words)\", \"body\": \"actionable \
         insight (max 2 sentences)\", \"type\": \"exam_prep|weak_area|streak|review|progress\" }"
    }
}

fn default_insight_title(language: Language) -> &'static str {
    if language == Language::Spanish {
        "Consejo de Estudio"
    } else {
        "Study Tip"
    }
}

/// Coerce the model's insight object, or synthesize one from the raw text
/// when no object can be extracted. This mode never fails on bad output.
fn parse_insight(raw: &str, language: Language) -> InsightResponse {
    match extract_json_object(raw) {
        Ok(map) => {
            let obj = Value::Object(map);
            InsightResponse {
                title: string_field_or(&obj, "title", 100, default_insight_title(language)),
                body: string_field(&obj, "body", 500),
                kind: string_field_or(&obj, "type", 50, "progress"),
            }
        }
        Err(_) => InsightResponse {
            title: default_insight_title(language).to_string(),
            body: truncate_chars(raw, 200).to_string(),
            kind: "progress".to_string(),
        },
    }
}

// --- chat mode ---

/// Render the last turns plus the new message as a `User:`/`Assistant:`
/// transcript ending with an open assistant turn.
fn format_conversation(history: &[HistoryMessage], message: &str) -> String {
    let start = history.len().saturating_sub(CHAT_HISTORY_WINDOW);
    let mut lines: Vec<String> = history[start..]
        .iter()
        .map(|h| {
            let speaker = if h.role == "user" { "User" } else { "Assistant" };
            format!(
                "{}: {}",
                speaker,
                truncate_chars(&h.content, MAX_HISTORY_ENTRY_CHARS)
            )
        })
        .collect();
    lines.push(format!("User: {message}"));
    format!("{}\nAssistant:", lines.join("\n"))
}

// --- calendar suggestions mode ---

fn calendar_prompt(language: Language, now: DateTime<Utc>) -> String {
    let today = now.format("%Y-%m-%d");
    if language == Language::Spanish {
        format!(
            "Basado en los cursos del estudiante, exámenes, áreas débiles y resultados, sugiere \
             3-5 eventos de estudio para los próximos 7 días.\n\
             Hoy es {today}.\n\
             Para cada evento responde con JSON array:\n\
             [{{ \"title\": \"título del evento (en español)\", \"type\": \"suggestion\", \
             \"start_hour\": 14, \"duration_minutes\": 45, \"days_from_today\": 0, \
             \"description\": \"por qué esta sesión\", \"ai_suggestion\": \"consejo breve\" }}]\n\
             Prioriza:\n\
             1. Cursos con exámenes próximos\n\
             2. Áreas débiles que necesitan repaso\n\
             3. Sesiones de repaso de flashcards\n\
             4. Timing de repetición espaciada"
        )
    } else {
        format!(
            "Based on the student's courses, upcoming exams, weak areas, and quiz results, \
             suggest 3-5 study events for the next 7 days.\n\
             Today is {today}.\n\
             For each event respond with JSON array:\n\
             [{{ \"title\": \"event title\", \"type\": \"suggestion\", \"start_hour\": 14, \
             \"duration_minutes\": 45, \"days_from_today\": 0, \"description\": \"why this \
             session\", \"ai_suggestion\": \"brief tip\" }}]\n\
             Prioritize:\n\
             1. Upcoming exam courses\n\
             2. Weak areas that need review\n\
             3. Flashcard review sessions\n\
             4. Spaced repetition timing"
        )
    }
}

fn default_event_title(language: Language) -> &'static str {
    if language == Language::Spanish {
        "Sesión de Estudio"
    } else {
        "Study Session"
    }
}

#[derive(Debug, PartialEq)]
struct EventDraft {
    title: String,
    description: String,
    ai_suggestion: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

/// Turn the model's suggestions into insertable events. Non-objects and
/// events with out-of-range hours are skipped; at most five survive.
fn build_event_drafts(items: &[Value], language: Language, now: DateTime<Utc>) -> Vec<EventDraft> {
    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| {
            let start_hour = i64_field(item, "start_hour", 14);
            if !(0..=23).contains(&start_hour) {
                return None;
            }
            let days_from_today = i64_field(item, "days_from_today", 0).clamp(0, 30);
            let duration_minutes = i64_field(item, "duration_minutes", 45).clamp(5, 24 * 60);

            let start_time = (now + Duration::days(days_from_today))
                .date_naive()
                .and_hms_opt(start_hour as u32, 0, 0)?
                .and_utc();
            let end_time = start_time + Duration::minutes(duration_minutes);

            Some(EventDraft {
                title: string_field_or(item, "title", 200, default_event_title(language)),
                description: string_field(item, "description", MAX_DESCRIPTION_CHARS),
                ai_suggestion: string_field(item, "ai_suggestion", MAX_SUGGESTION_CHARS),
                start_time,
                end_time,
            })
        })
        .take(MAX_CALENDAR_SUGGESTIONS)
        .collect()
}

/// Best-effort bulk insert: a failure on one event is logged and skipped,
/// the rest still land.
async fn insert_suggested_events(
    state: &AppState,
    user_id: Uuid,
    drafts: &[EventDraft],
) -> Vec<CalendarEventRow> {
    let mut created = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let inserted = sqlx::query_as::<_, CalendarEventRow>(
            "INSERT INTO calendar_events \
             (id, user_id, title, type, start_time, end_time, description, ai_suggestion) \
             VALUES ($1, $2, $3, 'suggestion', $4, $5, $6, $7) \
             RETURNING id, user_id, title, type, start_time, end_time, description, \
                       ai_suggestion, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&draft.title)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(&draft.description)
        .bind(&draft.ai_suggestion)
        .fetch_one(&state.db)
        .await;

        match inserted {
            Ok(event) => created.push(event),
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    "Skipping calendar suggestion that failed to insert: {:?}",
                    err
                );
            }
        }
    }
    created
}

#[cfg(test)]
mod tests {
    use super::{
        CourseOverviewRow, build_event_drafts, format_conversation, parse_insight,
        split_full_name, summarize_courses, summarize_weak_topics,
    };
    use crate::routes::chat::HistoryMessage;
    use chrono::{TimeZone, Utc};
    use kapsa_core::lang::Language;
    use serde_json::json;

    #[test]
    fn full_names_split_into_first_and_rest() {
        assert_eq!(
            split_full_name(Some("Ada Lovelace King")),
            ("Ada".to_string(), "Lovelace King".to_string())
        );
        assert_eq!(split_full_name(Some("Ada")), ("Ada".to_string(), String::new()));
        assert_eq!(split_full_name(None), ("Student".to_string(), String::new()));
        assert_eq!(split_full_name(Some("  ")), ("Student".to_string(), String::new()));
    }

    #[test]
    fn course_summary_includes_progress_and_exam_date() {
        let courses = vec![CourseOverviewRow {
            title: "Biology".to_string(),
            progress: Some(0.42),
            exam_date: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
        }];
        assert_eq!(summarize_courses(&courses), "- Biology (42% | Exam: 6/1/2025)");
    }

    #[test]
    fn weak_topic_summary_caps_at_five() {
        let topics: Vec<String> = (0..8).map(|i| format!("topic {i}")).collect();
        let summary = summarize_weak_topics(&topics);
        assert!(summary.starts_with("Weak areas: "));
        assert_eq!(summary.matches(';').count(), 4);
    }

    #[test]
    fn conversation_keeps_only_the_last_eight_turns() {
        let history: Vec<HistoryMessage> = (0..12)
            .map(|i| HistoryMessage {
                role: "user".to_string(),
                content: format!("turn {i}"),
            })
            .collect();
        let prompt = format_conversation(&history, "latest");
        assert!(!prompt.contains("turn 3"));
        assert!(prompt.contains("turn 4"));
        assert!(prompt.contains("User: latest"));
        assert!(prompt.ends_with("\nAssistant:"));
    }

    #[test]
    fn insight_objects_are_coerced() {
        let raw = "Here: {\"title\": \"Exam soon\", \"body\": \"Review chapter 3.\", \"type\": \"exam_prep\"}";
        let insight = parse_insight(raw, Language::English);
        assert_eq!(insight.title, "Exam soon");
        assert_eq!(insight.kind, "exam_prep");
    }

    #[test]
    fn unparseable_insight_output_falls_back_to_raw_text() {
        let insight = parse_insight("Just keep studying every day!", Language::Spanish);
        assert_eq!(insight.title, "Consejo de Estudio");
        assert_eq!(insight.body, "Just keep studying every day!");
        assert_eq!(insight.kind, "progress");
    }

    #[test]
    fn event_drafts_skip_out_of_range_hours_and_cap_at_five() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let mut items = vec![json!({"title": "Bad", "start_hour": 99})];
        for i in 0..6 {
            items.push(json!({"title": format!("Session {i}"), "start_hour": 14, "days_from_today": i}));
        }
        let drafts = build_event_drafts(&items, Language::English, now);
        assert_eq!(drafts.len(), 5);
        assert!(drafts.iter().all(|d| d.title != "Bad"));
    }

    #[test]
    fn event_drafts_apply_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let drafts = build_event_drafts(&[json!({})], Language::English, now);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "Study Session");
        assert_eq!(drafts[0].start_time.format("%H:%M").to_string(), "14:00");
        assert_eq!(
            (drafts[0].end_time - drafts[0].start_time).num_minutes(),
            45
        );
    }
}
