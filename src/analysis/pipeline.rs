use std::sync::OnceLock;

use regex::Regex;

use super::prompts::system_prompt;
use crate::config::settings::LlmConfig;
use crate::error::{DeskError, DeskResult};
use crate::llm::client::complete;
use crate::models::Analysis;

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"))
}

/// At most `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Raw document bytes as text. Undecodable sequences become U+FFFD.
pub fn document_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Body of the first ```json fenced block, if the reply has one.
pub fn fenced_json(reply: &str) -> Option<&str> {
    fenced_json_re()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First analysis object in a model reply. Prose before or after the
/// object is ignored, braces in that prose included.
pub fn parse_analysis(reply: &str) -> DeskResult<Analysis> {
    if reply.trim().is_empty() {
        return Err(DeskError::parse("Model returned empty response"));
    }
    if let Some(json) = fenced_json(reply) {
        if let Ok(analysis) = serde_json::from_str::<Analysis>(json) {
            return Ok(analysis);
        }
    }

    let mut first_error = None;
    for (start, _) in reply.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&reply[start..]).into_iter::<Analysis>();
        match values.next() {
            Some(Ok(analysis)) => return Ok(analysis),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }
    match first_error {
        Some(e) => Err(DeskError::parse(format!(
            "Model response is not a valid analysis: {}",
            e
        ))),
        None => Err(DeskError::parse("Model response did not contain a JSON object")),
    }
}

/// Runs the document text through the model and parses the result.
pub async fn analyze_text(config: &LlmConfig, text: &str) -> DeskResult<Analysis> {
    let input = truncate_chars(text, config.max_chars);
    tracing::info!(
        chars = input.chars().count(),
        truncated = input.len() < text.len(),
        "analyzing document"
    );
    let reply = complete(config, &system_prompt(), input).await?;
    parse_analysis(&reply)
}
