use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::settings::TelemetryConfig;

pub const TELEMETRY_PATH: &str = "/api/telemetry/error";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_stack: Option<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ErrorReport {
    /// `component` names the command that failed; the cause chain becomes the stack.
    pub fn from_error(err: &anyhow::Error, component: Option<&str>) -> Self {
        let causes: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
        Self {
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
            component_stack: component.map(str::to_string),
            timestamp: Utc::now().to_rfc3339(),
            user_agent: Some(user_agent()),
        }
    }
}

pub fn user_agent() -> String {
    format!("lexdesk/{}", env!("CARGO_PKG_VERSION"))
}

/// POSTs the report. Errors are logged and swallowed.
pub async fn send_report(endpoint: &str, report: &ErrorReport) {
    let result = reqwest::Client::new()
        .post(endpoint)
        .json(report)
        .send()
        .await
        .and_then(|r| r.error_for_status());
    match result {
        Ok(_) => tracing::debug!(endpoint, "error report delivered"),
        Err(e) => tracing::warn!(endpoint, error = %e, "telemetry dispatch failed"),
    }
}

/// Fire-and-forget dispatch. Returns the task so callers exiting right away
/// can give it a moment to finish.
pub fn report_error(
    config: &TelemetryConfig,
    report: ErrorReport,
) -> Option<tokio::task::JoinHandle<()>> {
    tracing::error!(error = %report.message, component = ?report.component_stack, "unhandled error");
    if !config.enabled {
        return None;
    }
    let endpoint = config.endpoint.clone()?;
    Some(tokio::spawn(async move {
        send_report(&endpoint, &report).await;
    }))
}

/// Generic recovery screen shown after an unhandled error.
pub fn recovery_screen(message: &str) -> String {
    format!(
        "Something went wrong\n\
         We hit a snag. An unexpected error occurred: {}\n\
         Re-run the command to try again. If the problem persists, contact support with the steps that led here.",
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use axum::{extract::State, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_report_wire_format() {
        let err = Err::<(), _>(anyhow::anyhow!("connection reset"))
            .context("Failed to upload contract.pdf")
            .unwrap_err();
        let report = ErrorReport::from_error(&err, Some("upload"));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["message"], "Failed to upload contract.pdf");
        assert_eq!(json["stack"], "connection reset");
        assert_eq!(json["componentStack"], "upload");
        assert!(json["userAgent"].as_str().unwrap().starts_with("lexdesk/"));
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_single_error_has_no_stack() {
        let report = ErrorReport::from_error(&anyhow::anyhow!("boom"), None);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("stack").is_none());
        assert!(json.get("componentStack").is_none());
    }

    #[tokio::test]
    async fn test_disabled_or_unconfigured_sends_nothing() {
        let report = ErrorReport::from_error(&anyhow::anyhow!("boom"), None);
        let disabled = TelemetryConfig {
            endpoint: Some("http://127.0.0.1:9/api/telemetry/error".to_string()),
            enabled: false,
        };
        assert!(report_error(&disabled, report.clone()).is_none());
        assert!(report_error(&TelemetryConfig::default(), report).is_none());
    }

    #[tokio::test]
    async fn test_report_is_delivered() {
        let received: Arc<Mutex<Vec<ErrorReport>>> = Arc::default();
        let app = Router::new()
            .route(
                TELEMETRY_PATH,
                post(
                    |State(r): State<Arc<Mutex<Vec<ErrorReport>>>>, Json(report): Json<ErrorReport>| async move {
                        r.lock().unwrap().push(report);
                    },
                ),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = TelemetryConfig {
            endpoint: Some(format!("http://{}{}", addr, TELEMETRY_PATH)),
            enabled: true,
        };
        let report = ErrorReport::from_error(&anyhow::anyhow!("boom"), Some("status"));
        report_error(&config, report.clone()).unwrap().await.unwrap();

        assert_eq!(received.lock().unwrap().as_slice(), &[report]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_swallowed() {
        let report = ErrorReport::from_error(&anyhow::anyhow!("boom"), None);
        send_report("http://127.0.0.1:9/api/telemetry/error", &report).await;
    }

    #[test]
    fn test_recovery_screen() {
        let screen = recovery_screen("disk full");
        assert!(screen.starts_with("Something went wrong"));
        assert!(screen.contains("disk full"));
        assert!(screen.contains("Re-run the command"));
    }
}
