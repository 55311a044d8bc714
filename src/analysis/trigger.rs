use serde::{Deserialize, Serialize};

use crate::error::{DeskError, DeskResult};
use crate::models::{Analysis, ClauseInsight, RiskLevel};
use crate::remote::RemoteClient;

/// Payload the analysis function expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub document_id: String,
    pub tenant_id: String,
    /// Object path inside the contracts bucket.
    pub storage_path: String,
}

impl AnalysisRequest {
    /// Builds a request from the path an upload reported (`<bucket>/<key>`).
    pub fn for_upload(document_id: &str, tenant_id: &str, uploaded_path: &str, bucket: &str) -> Self {
        let storage_path = uploaded_path
            .strip_prefix(bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(uploaded_path);
        Self {
            document_id: document_id.to_string(),
            tenant_id: tenant_id.to_string(),
            storage_path: storage_path.to_string(),
        }
    }
}

/// Id for an upload-triggered analysis and whether it was generated here.
/// A generated id has no document row behind it, so the backend keeps no result.
pub fn document_id_or_generated(given: Option<String>) -> (String, bool) {
    match given.filter(|id| !id.trim().is_empty()) {
        Some(id) => (id, false),
        None => (uuid::Uuid::new_v4().to_string(), true),
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    analysis: Option<Analysis>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportRequest<'a> {
    tenant_id: &'a str,
    document_id: &'a str,
}

/// Row the analysis function returns for a stored document.
#[derive(Debug, Deserialize)]
struct StoredAnalysis {
    #[serde(default)]
    summary: Option<String>,
    risk_rating: RiskLevel,
    #[serde(default)]
    clauses: Option<Vec<ClauseInsight>>,
    #[serde(default)]
    overlays: Option<Vec<ClauseInsight>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Report {
    pub signed_url: Option<String>,
    pub path: Option<String>,
}

/// Hands an uploaded document to the analysis function and returns its result.
pub async fn trigger_analysis<C: RemoteClient + ?Sized>(
    client: &C,
    function: &str,
    request: &AnalysisRequest,
    token: &str,
) -> DeskResult<Analysis> {
    tracing::info!(document = %request.document_id, function, "requesting analysis");
    let payload = serde_json::to_value(request)?;
    let value = client.call_function(function, payload, token).await?;
    let response: AnalysisResponse = serde_json::from_value(value)
        .map_err(|e| DeskError::parse(format!("Malformed analysis response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(DeskError::Http { status: 500, body: error });
    }
    match (response.status.as_deref(), response.analysis) {
        (Some("ok") | None, Some(analysis)) => Ok(analysis),
        (status, _) => Err(DeskError::parse(format!(
            "Analysis function returned no result (status: {})",
            status.unwrap_or("missing")
        ))),
    }
}

/// Reads the analysis stored for `document_id` under `tenant_id`.
/// `None` when the backend has nothing for that document.
pub async fn fetch_analysis<C: RemoteClient + ?Sized>(
    client: &C,
    function: &str,
    tenant_id: &str,
    document_id: &str,
    token: &str,
) -> DeskResult<Option<Analysis>> {
    tracing::info!(document = %document_id, function, "fetching stored analysis");
    let value = match client
        .fetch_from_function(function, document_id, tenant_id, token)
        .await
    {
        Ok(value) => value,
        Err(DeskError::Http { status: 404, .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    let stored: StoredAnalysis = serde_json::from_value(value)
        .map_err(|e| DeskError::parse(format!("Malformed stored analysis: {}", e)))?;
    Ok(Some(Analysis {
        document_id: document_id.to_string(),
        summary: stored.summary.unwrap_or_default(),
        overall_risk: stored.risk_rating,
        clauses: stored.clauses.unwrap_or_default(),
        overlays: stored.overlays.unwrap_or_default(),
    }))
}

pub async fn request_report<C: RemoteClient + ?Sized>(
    client: &C,
    function: &str,
    tenant_id: &str,
    document_id: &str,
    token: &str,
) -> DeskResult<Report> {
    tracing::info!(document = %document_id, function, "requesting report");
    let payload = serde_json::to_value(ReportRequest { tenant_id, document_id })?;
    let value = client.call_function(function, payload, token).await?;
    serde_json::from_value(value)
        .map_err(|e| DeskError::parse(format!("Malformed report response: {}", e)))
}
