//! Client for the hosted inference API (Replicate-style create-then-poll).
//!
//! A prediction is created with one POST, then polled on a fixed interval
//! until it reaches a terminal state. The poll loop is driven by an explicit
//! [`PollPolicy`] rather than a hidden counter, and the calling task is
//! suspended between polls — the HTTP request stays open for the duration, so
//! clients must budget their own timeouts accordingly.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

/// Version hash of the instruction-tuned text model used for every text
/// generation call (chat, flashcards, quiz, insights, calendar).
const TEXT_MODEL_VERSION: &str =
    "5a6809ca6288247d06daf6365557e5e429063f32a21146b2a807c682652136b8";

const TEXT_PROMPT_TEMPLATE: &str = "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{system_prompt}<|eot_id|><|start_header_id|>user<|end_header_id|>\n\n{prompt}<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n";

/// Vision model used for text extraction from captured images.
const OCR_MODEL: &str = "google-deepmind/gemma-3-27b-it";

const OCR_PROMPT: &str = "Extract ALL text from this image. Preserve the original formatting, \
     paragraphs, and structure. Return only the extracted text, nothing else. If the text is in \
     a language other than English, keep it in the original language.";

/// Speech-to-text model used for lecture recordings.
const TRANSCRIBE_MODEL: &str = "vaibhavs10/incredibly-fast-whisper";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference service returned status {status} on submission")]
    Unavailable { status: u16 },
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("prediction {id} failed: {detail}")]
    Failed { id: String, detail: String },
    #[error("prediction {id} not terminal after {attempts} polls")]
    TimedOut { id: String, attempts: u32 },
}

/// Where a prediction is created: a pinned version on the generic predictions
/// endpoint, or a named model's own endpoint.
#[derive(Debug, Clone, Copy)]
enum ModelTarget {
    Version(&'static str),
    Model(&'static str),
}

/// Bounded polling parameters. Longer-running job types poll less often.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const TEXT: PollPolicy = PollPolicy {
        interval: Duration::from_secs(1),
        max_attempts: 120,
    };
    pub const OCR: PollPolicy = PollPolicy {
        interval: Duration::from_millis(1500),
        max_attempts: 120,
    };
    pub const TRANSCRIBE: PollPolicy = PollPolicy {
        interval: Duration::from_secs(2),
        max_attempts: 120,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    urls: PredictionUrls,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

/// Input payload for text generation jobs.
#[derive(Debug, Serialize)]
struct TextGenerationInput<'a> {
    prompt: &'a str,
    system_prompt: &'a str,
    prompt_template: &'static str,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

impl<'a> TextGenerationInput<'a> {
    fn new(system_prompt: &'a str, prompt: &'a str, max_tokens: u32) -> Self {
        Self {
            prompt,
            system_prompt,
            prompt_template: TEXT_PROMPT_TEMPLATE,
            max_tokens,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

#[derive(Clone)]
pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ReplicateClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
        }
    }

    /// Run a text generation job to completion and return the joined output.
    pub async fn generate_text(
        &self,
        system_prompt: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, InferenceError> {
        let input = TextGenerationInput::new(system_prompt, prompt, max_tokens);
        self.run(
            ModelTarget::Version(TEXT_MODEL_VERSION),
            serde_json::to_value(&input).unwrap_or_default(),
            PollPolicy::TEXT,
        )
        .await
    }

    /// Extract text from an image at `image_url`.
    pub async fn extract_text_from_image(&self, image_url: &str) -> Result<String, InferenceError> {
        self.run(
            ModelTarget::Model(OCR_MODEL),
            json!({
                "image": image_url,
                "prompt": OCR_PROMPT,
                "max_new_tokens": 4096,
                "temperature": 0.1,
            }),
            PollPolicy::OCR,
        )
        .await
    }

    /// Transcribe the audio file at `audio_url`.
    pub async fn transcribe_audio(&self, audio_url: &str) -> Result<String, InferenceError> {
        self.run(
            ModelTarget::Model(TRANSCRIBE_MODEL),
            json!({
                "audio": audio_url,
                "task": "transcribe",
                "batch_size": 64,
            }),
            PollPolicy::TRANSCRIBE,
        )
        .await
    }

    async fn run(
        &self,
        target: ModelTarget,
        input: Value,
        poll: PollPolicy,
    ) -> Result<String, InferenceError> {
        let prediction = self.create(target, input).await?;
        self.wait(prediction, poll).await
    }

    async fn create(&self, target: ModelTarget, input: Value) -> Result<Prediction, InferenceError> {
        let (url, body) = match target {
            ModelTarget::Version(version) => (
                format!("{}/v1/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            ModelTarget::Model(path) => (
                format!("{}/v1/models/{}/predictions", self.base_url, path),
                json!({ "input": input }),
            ),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InferenceError::Unavailable {
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    /// Poll until the prediction is terminal or the attempt budget runs out.
    async fn wait(
        &self,
        mut prediction: Prediction,
        poll: PollPolicy,
    ) -> Result<String, InferenceError> {
        let mut attempts = 0u32;
        while !prediction.status.is_terminal() && attempts < poll.max_attempts {
            tokio::time::sleep(poll.interval).await;

            let response = self
                .http
                .get(&prediction.urls.get)
                .bearer_auth(&self.api_key)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(InferenceError::Unavailable {
                    status: response.status().as_u16(),
                });
            }

            prediction = response.json().await?;
            attempts += 1;
        }

        match prediction.status {
            PredictionStatus::Succeeded => Ok(normalize_output(prediction.output.as_ref())),
            PredictionStatus::Failed | PredictionStatus::Canceled => Err(InferenceError::Failed {
                detail: prediction
                    .error
                    .as_ref()
                    .map(describe_error)
                    .unwrap_or_else(|| "no error detail".to_string()),
                id: prediction.id,
            }),
            _ => Err(InferenceError::TimedOut {
                id: prediction.id,
                attempts,
            }),
        }
    }
}

fn describe_error(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collapse the model's output into a single string. Text models stream an
/// array of string chunks, vision models return one string, and transcription
/// jobs return an object with a `text` field.
fn normalize_output(output: Option<&Value>) -> String {
    match output {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(chunks)) => chunks
            .iter()
            .map(|chunk| match chunk {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::Object(map)) => match map.get("text") {
            Some(Value::String(text)) => text.clone(),
            _ => Value::Object(map.clone()).to_string(),
        },
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{PredictionStatus, TextGenerationInput, normalize_output};
    use serde_json::json;

    #[test]
    fn chunked_output_is_joined_in_order() {
        let output = json!(["The ", "mitochondria ", "produces ATP."]);
        assert_eq!(
            normalize_output(Some(&output)),
            "The mitochondria produces ATP."
        );
    }

    #[test]
    fn string_output_passes_through() {
        assert_eq!(normalize_output(Some(&json!("hello"))), "hello");
    }

    #[test]
    fn transcription_objects_yield_their_text_field() {
        let output = json!({"text": "lecture transcript", "chunks": []});
        assert_eq!(normalize_output(Some(&output)), "lecture transcript");
    }

    #[test]
    fn missing_output_is_empty() {
        assert_eq!(normalize_output(None), "");
        assert_eq!(normalize_output(Some(&json!(null))), "");
    }

    #[test]
    fn terminal_states_are_succeeded_failed_and_canceled() {
        assert!(PredictionStatus::Succeeded.is_terminal());
        assert!(PredictionStatus::Failed.is_terminal());
        assert!(PredictionStatus::Canceled.is_terminal());
        assert!(!PredictionStatus::Starting.is_terminal());
        assert!(!PredictionStatus::Processing.is_terminal());
    }

    #[test]
    fn unknown_statuses_deserialize_without_error() {
        let status: PredictionStatus = serde_json::from_str("\"booting\"").unwrap();
        assert_eq!(status, PredictionStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn text_input_carries_fixed_sampling_parameters() {
        let input = TextGenerationInput::new("system", "user", 2048);
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["max_tokens"], 2048);
        assert_eq!(value["temperature"], 0.7);
        assert_eq!(value["top_p"], 0.9);
        assert!(value["prompt_template"].as_str().unwrap().contains("{system_prompt}"));
    }
}
