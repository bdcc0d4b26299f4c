//! Course material loading and prompt-context assembly. Material content is
//! unbounded at capture time, so everything fed into a prompt is truncated
//! per material here.

use sqlx::PgPool;
use uuid::Uuid;

use kapsa_core::sanitize::truncate_chars;

use crate::error::AppError;

/// At most this many materials feed one prompt.
const MATERIAL_CONTEXT_LIMIT: i64 = 5;

#[derive(Debug, sqlx::FromRow)]
pub struct MaterialRow {
    pub title: String,
    pub content: Option<String>,
    #[sqlx(rename = "type")]
    pub kind: String,
}

/// Load a user's materials for a course (optionally a single material),
/// newest first, skipping rows without extracted content.
pub async fn load_course_materials(
    pool: &PgPool,
    course_id: Uuid,
    user_id: Uuid,
    material_id: Option<Uuid>,
) -> Result<Vec<MaterialRow>, AppError> {
    let rows = match material_id {
        Some(material_id) => {
            sqlx::query_as::<_, MaterialRow>(
                "SELECT title, content, type FROM course_materials \
                 WHERE course_id = $1 AND user_id = $2 AND id = $3 AND content IS NOT NULL \
                 ORDER BY created_at DESC LIMIT $4",
            )
            .bind(course_id)
            .bind(user_id)
            .bind(material_id)
            .bind(MATERIAL_CONTEXT_LIMIT)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, MaterialRow>(
                "SELECT title, content, type FROM course_materials \
                 WHERE course_id = $1 AND user_id = $2 AND content IS NOT NULL \
                 ORDER BY created_at DESC LIMIT $3",
            )
            .bind(course_id)
            .bind(user_id)
            .bind(MATERIAL_CONTEXT_LIMIT)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Format materials as prompt context, each truncated to `chars_per_material`
/// under a `--- <title> ---` header. Empty input yields `fallback`.
pub fn build_material_context(
    materials: &[MaterialRow],
    chars_per_material: usize,
    fallback: &str,
) -> String {
    if materials.is_empty() {
        return fallback.to_string();
    }
    materials
        .iter()
        .map(|m| {
            format!(
                "--- {} ---\n{}",
                m.title,
                truncate_chars(m.content.as_deref().unwrap_or_default(), chars_per_material)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// All material content joined into one sample for language detection.
pub fn joined_content(materials: &[MaterialRow]) -> String {
    materials
        .iter()
        .map(|m| m.content.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{MaterialRow, build_material_context, joined_content};

    fn material(title: &str, content: &str) -> MaterialRow {
        MaterialRow {
            title: title.to_string(),
            content: Some(content.to_string()),
            kind: "notes".to_string(),
        }
    }

    #[test]
    fn context_uses_fallback_when_no_materials_exist() {
        assert_eq!(
            build_material_context(&[], 2000, "No materials available."),
            "No materials available."
        );
    }

    #[test]
    fn context_headers_and_truncation_are_applied_per_material() {
        let materials = vec![
            material("Chapter 1", &"a".repeat(50)),
            material("Chapter 2", "short"),
        ];
        let context = build_material_context(&materials, 10, "fallback");
        assert!(context.starts_with("--- Chapter 1 ---\naaaaaaaaaa\n\n"));
        assert!(context.ends_with("--- Chapter 2 ---\nshort"));
    }

    #[test]
    fn joined_content_concatenates_for_language_detection() {
        let materials = vec![material("A", "la célula"), material("B", "produce energía")];
        assert_eq!(joined_content(&materials), "la célula produce energía");
    }
}
