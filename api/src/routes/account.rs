use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::delete;
use axum::{Json, Router};
use serde::Serialize;

use kapsa_core::error::ApiError;

use crate::auth::authenticate;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AccountDeletedResponse {
    pub message: String,
    pub rows_deleted: i64,
}

/// Deletion order respects foreign keys: children before parents, the
/// profile last. Every statement binds the authenticated user id.
const DELETION_STATEMENTS: &[&str] = &[
    "DELETE FROM chat_messages WHERE session_id IN \
     (SELECT id FROM chat_sessions WHERE user_id = $1)",
    "DELETE FROM chat_sessions WHERE user_id = $1",
    "DELETE FROM flashcards WHERE deck_id IN \
     (SELECT id FROM flashcard_decks WHERE user_id = $1)",
    "DELETE FROM flashcard_decks WHERE user_id = $1",
    "DELETE FROM test_questions WHERE test_id IN \
     (SELECT id FROM tests WHERE user_id = $1)",
    "DELETE FROM tests WHERE user_id = $1",
    "DELETE FROM course_materials WHERE user_id = $1",
    "DELETE FROM courses WHERE user_id = $1",
    "DELETE FROM calendar_events WHERE user_id = $1",
    "DELETE FROM usage_tracking WHERE user_id = $1",
    "DELETE FROM profiles WHERE id = $1",
];

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/account", delete(delete_own_account))
}

/// Delete the caller's account: every owned row across the domain tables,
/// then the identity itself.
#[utoipa::path(
    delete,
    path = "/v1/account",
    responses(
        (status = 200, description = "Account and all data permanently deleted", body = AccountDeletedResponse),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 500, description = "Deletion failed", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "account"
)]
pub async fn delete_own_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AccountDeletedResponse>, AppError> {
    let user = authenticate(&state, &headers).await?;
    let mut tx = state.db.begin().await?;
    let mut rows_deleted: i64 = 0;
    for statement in DELETION_STATEMENTS {
        let result = sqlx::query(statement)
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
        rows_deleted += result.rows_affected() as i64;
    }
    tx.commit().await?;

    // Data is gone; the identity goes last so a provider failure leaves a
    // re-runnable (empty) account rather than orphaned rows.
    state.identity.delete_identity(user.user_id).await?;

    tracing::info!(
        user_id = %user.user_id,
        rows_deleted,
        "Account permanently deleted"
    );

    Ok(Json(AccountDeletedResponse {
        message: "Account and all associated data permanently deleted.".to_string(),
        rows_deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::DELETION_STATEMENTS;

    #[test]
    fn every_domain_table_is_covered_in_child_first_order() {
        let tables: Vec<&str> = DELETION_STATEMENTS
            .iter()
            .map(|s| {
                s.trim_start_matches("DELETE FROM ")
                    .split_whitespace()
                    .next()
                    .unwrap()
            })
            .collect();
        assert_eq!(
            tables,
            vec![
                "chat_messages",
                "chat_sessions",
                "flashcards",
                "flashcard_decks",
                "test_questions",
                "tests",
                "course_materials",
                "courses",
                "calendar_events",
                "usage_tracking",
                "profiles",
            ]
        );
        // Children always precede their parent table.
        let pos = |t: &str| tables.iter().position(|x| *x == t).unwrap();
        assert!(pos("chat_messages") < pos("chat_sessions"));
        assert!(pos("flashcards") < pos("flashcard_decks"));
        assert!(pos("test_questions") < pos("tests"));
        assert!(pos("course_materials") < pos("courses"));
    }

    #[test]
    fn every_statement_scopes_by_the_bound_user() {
        for statement in DELETION_STATEMENTS {
            assert!(statement.contains("$1"), "unscoped statement: {statement}");
        }
    }
}
