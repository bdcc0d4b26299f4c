//! Text-to-JSON-array generation with a single stricter retry.
//!
//! Flashcard and quiz generation both ask the model for a JSON array and both
//! retry the whole inference exactly once with a tightened instruction when
//! extraction fails. The second failure is terminal.

use serde_json::Value;

use kapsa_core::repair::extract_json_array;

use crate::error::AppError;
use crate::inference::ReplicateClient;

pub async fn json_array_with_retry(
    replicate: &ReplicateClient,
    system_prompt: &str,
    prompt: &str,
    retry_prompt: &str,
    max_tokens: u32,
) -> Result<Vec<Value>, AppError> {
    let raw = replicate
        .generate_text(system_prompt, prompt, max_tokens)
        .await?;
    match extract_json_array(&raw) {
        Ok(items) => Ok(items),
        Err(err) => {
            tracing::warn!(
                "First parse of model output failed ({}), retrying with stricter prompt",
                err
            );
            let raw = replicate
                .generate_text(system_prompt, retry_prompt, max_tokens)
                .await?;
            Ok(extract_json_array(&raw)?)
        }
    }
}
