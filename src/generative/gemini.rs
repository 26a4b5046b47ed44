//! Gemini provider implementation using the `generateContent` REST API.

use serde::{Deserialize, Serialize};

use super::{check_http_response, GenerativeError, TextGenerator};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_TEMPERATURE: f64 = 0.7;

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Gemini `generateContent` request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GeminiRequest {
    /// Conversation contents.
    pub contents: Vec<GeminiContent>,
    /// Optional system instruction.
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Generation parameters.
    #[serde(rename = "generationConfig")]
    pub generation_config: GeminiGenerationConfig,
}

/// A content block of text parts.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    /// Text parts.
    pub parts: Vec<GeminiPart>,
}

/// A single text part.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    /// The text content.
    pub text: String,
}

/// Generation parameters.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GeminiGenerationConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Response token ceiling.
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
}

/// Gemini API response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    /// Response candidates; the first one is used.
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

/// A single response candidate.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    /// Candidate content.
    pub content: Option<GeminiContent>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Gemini `generateContent` provider.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    /// Create a new Gemini provider instance.
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

/// Build a Gemini API request body.
#[doc(hidden)]
pub fn build_request(system: Option<&str>, prompt: &str, max_tokens: u32) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart {
                text: prompt.to_owned(),
            }],
        }],
        system_instruction: system.map(|s| GeminiContent {
            parts: vec![GeminiPart { text: s.to_owned() }],
        }),
        generation_config: GeminiGenerationConfig {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: max_tokens,
        },
    }
}

/// Parse a Gemini API response into the generated text.
///
/// # Errors
///
/// Returns `GenerativeError::Parse` when the body cannot be deserialized
/// or contains no text candidate.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<String, GenerativeError> {
    let resp: GeminiResponse =
        serde_json::from_str(body).map_err(|e| GenerativeError::Parse(e.to_string()))?;

    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(GenerativeError::Parse(
            "response contained no text candidate".to_owned(),
        ));
    }
    Ok(text)
}

#[async_trait::async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerativeError> {
        let api_request = build_request(system, prompt, max_tokens);
        let url = format!(
            "{GEMINI_API_BASE}/{model}:generateContent?key={key}",
            model = self.model,
            key = self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }
}
