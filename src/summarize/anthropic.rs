//! Anthropic text completion API integration.

use super::{Error, Summary};
use crate::config::AnthropicConfig;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

pub const MAX_TOKENS_TO_SAMPLE: u32 = 512;
pub const STOP_SEQUENCES: [&str; 2] = ["Human:", "Assistant:"];

const LINE_BREAK_PLACEHOLDER: &str = "<br>";
const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub prompt: String,
    pub model: &'a str,
    pub max_tokens_to_sample: u32,
    pub stop_sequences: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
pub struct Response {
    pub completion: String,
}

/// Fill in the prompt template. Line breaks are expanded before the
/// transcript goes in, so transcript text is never rewritten.
pub fn render_prompt(template: &str, transcript: &str) -> String {
    template
        .replace(LINE_BREAK_PLACEHOLDER, "\n")
        .replace(TRANSCRIPT_PLACEHOLDER, transcript)
}

pub async fn summarize(
    client: &reqwest::Client,
    config: &AnthropicConfig,
    transcript: &str,
) -> Result<Summary, Error> {
    let prompt = render_prompt(&config.prompt_template, transcript);
    debug!("Prompt: {}", prompt);

    let body = serde_json::to_vec(&Request {
        prompt,
        model: &config.model,
        max_tokens_to_sample: MAX_TOKENS_TO_SAMPLE,
        stop_sequences: &STOP_SEQUENCES,
    })?;
    let response = client
        .post(config.endpoint_url.clone())
        .header("x-api-key", &config.api_key)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?;
    debug!("API response: {}", response.status());

    let body = response.error_for_status()?.bytes().await?;
    let response: Response = serde_json::from_slice(&body)?;

    let completion = response.completion.trim();
    if completion.is_empty() {
        Ok(Summary::Empty)
    } else {
        Ok(Summary::Generated(completion.to_string()))
    }
}
