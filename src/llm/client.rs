use serde::{Deserialize, Serialize};

use crate::config::settings::{LlmConfig, LlmProvider};
use crate::error::{DeskError, DeskResult};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    text: Option<String>,
}

fn require_api_key(config: &LlmConfig, key: Option<String>) -> DeskResult<String> {
    key.ok_or_else(|| {
        DeskError::config(format!(
            "No LLM API key found. Set {} in ~/.lexdesk/env, or llm.api_key in ~/.lexdesk/config.toml",
            config.api_key_var()
        ))
    })
}

/// Sends one system prompt plus one user message and returns the reply text.
pub async fn complete(config: &LlmConfig, system: &str, user: &str) -> DeskResult<String> {
    let api_key = require_api_key(config, config.resolved_api_key())?;
    tracing::debug!(provider = ?config.provider, model = %config.model, "calling model");

    let text = match config.provider {
        LlmProvider::OpenAi => call_openai(config, &api_key, system, user).await?,
        LlmProvider::Anthropic => call_anthropic(config, &api_key, system, user).await?,
    };

    if text.trim().is_empty() {
        return Err(DeskError::parse("Model returned empty response"));
    }
    Ok(text)
}

async fn send(request: reqwest::RequestBuilder) -> DeskResult<reqwest::Response> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(DeskError::Http { status, body });
    }
    Ok(response)
}

async fn call_openai(
    config: &LlmConfig,
    api_key: &str,
    system: &str,
    user: &str,
) -> DeskResult<String> {
    let request = OpenAiRequest {
        model: &config.model,
        messages: vec![
            ChatMessage { role: "system", content: system },
            ChatMessage { role: "user", content: user },
        ],
        response_format: ResponseFormat { kind: "json_object" },
    };

    let response = send(
        reqwest::Client::new()
            .post(format!("{}/v1/chat/completions", config.resolved_base_url()))
            .bearer_auth(api_key)
            .json(&request),
    )
    .await?;

    let body: OpenAiResponse = response
        .json()
        .await
        .map_err(|e| DeskError::parse(format!("Failed to parse OpenAI response: {}", e)))?;

    Ok(body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

async fn call_anthropic(
    config: &LlmConfig,
    api_key: &str,
    system: &str,
    user: &str,
) -> DeskResult<String> {
    let request = AnthropicRequest {
        model: &config.model,
        max_tokens: 4096,
        system,
        messages: vec![ChatMessage { role: "user", content: user }],
    };

    let response = send(
        reqwest::Client::new()
            .post(format!("{}/v1/messages", config.resolved_base_url()))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request),
    )
    .await?;

    let msg: AnthropicResponse = response
        .json()
        .await
        .map_err(|e| DeskError::parse(format!("Failed to parse Anthropic response: {}", e)))?;

    Ok(msg
        .content
        .into_iter()
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config(provider: LlmProvider, base_url: String) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: Some("sk-test".to_string()),
            base_url: Some(base_url),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_openai_json_mode() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(req): Json<serde_json::Value>| async move {
                assert_eq!(req["response_format"]["type"], "json_object");
                assert_eq!(req["messages"][0]["role"], "system");
                Json(json!({ "choices": [{ "message": { "content": "{\"ok\":true}" } }] }))
            }),
        );
        let base = spawn(app).await;

        let text = complete(&config(LlmProvider::OpenAi, base), "sys", "doc")
            .await
            .unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_anthropic_joins_blocks() {
        let app = Router::new().route(
            "/v1/messages",
            post(|Json(req): Json<serde_json::Value>| async move {
                assert_eq!(req["system"], "sys");
                Json(json!({ "content": [{ "text": "{\"a\":" }, { "text": "1}" }] }))
            }),
        );
        let base = spawn(app).await;

        let text = complete(&config(LlmProvider::Anthropic, base), "sys", "doc")
            .await
            .unwrap();
        assert_eq!(text, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_empty_reply_is_parse_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [{ "message": { "content": null } }] })) }),
        );
        let base = spawn(app).await;

        let err = complete(&config(LlmProvider::OpenAi, base), "sys", "doc")
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Parse(_)));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let cfg = LlmConfig {
            provider: LlmProvider::Anthropic,
            api_key: Some(String::new()),
            ..Default::default()
        };
        // an explicit empty key falls through to the lookup
        let key = cfg.api_key_from(|_| None);
        assert_eq!(key, None);
        let err = require_api_key(&cfg, key).unwrap_err();
        assert!(matches!(err, DeskError::Config(_)));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_key_lookup_uses_provider_variable() {
        let cfg = LlmConfig {
            provider: LlmProvider::Anthropic,
            ..Default::default()
        };
        let key = cfg.api_key_from(|var| (var == "ANTHROPIC_API_KEY").then(|| "sk-ant".to_string()));
        assert_eq!(key.as_deref(), Some("sk-ant"));

        let configured = LlmConfig {
            api_key: Some("sk-file".to_string()),
            ..Default::default()
        };
        assert_eq!(
            configured.api_key_from(|_| Some("sk-env".to_string())).as_deref(),
            Some("sk-file")
        );
    }
}
