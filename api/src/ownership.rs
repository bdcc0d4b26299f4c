//! Ownership guards. Every lookup is filtered by both the record id and the
//! caller's user id; zero rows maps to `NotFound`, so existence of another
//! user's record is never confirmed. Callers still re-filter by user id in
//! every subsequent query.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, sqlx::FromRow)]
pub struct CourseRow {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
}

/// Load a course iff it belongs to `user_id`.
pub async fn require_course(
    pool: &PgPool,
    course_id: Uuid,
    user_id: Uuid,
) -> Result<CourseRow, AppError> {
    sqlx::query_as::<_, CourseRow>(
        "SELECT id, title, subtitle FROM courses WHERE id = $1 AND user_id = $2",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "Course".to_string(),
    })
}

/// Confirm a chat session belongs to `user_id`.
pub async fn require_session(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM chat_sessions WHERE id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .map(|_| ())
    .ok_or_else(|| AppError::NotFound {
        resource: "Session".to_string(),
    })
}
