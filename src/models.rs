use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credential bundle returned by the auth endpoints and kept for the current user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
}

impl Session {
    /// A session without an access token counts as signed out.
    pub fn is_valid(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.user.tenant_id()
    }
}

impl User {
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id
            .as_deref()
            .or_else(|| {
                self.user_metadata
                    .as_ref()
                    .and_then(|m| m.get("tenant_id"))
                    .and_then(|v| v.as_str())
            })
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub status: DocumentStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OverlayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClauseInsight {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub risk: RiskLevel,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub bounds: Vec<OverlayRect>,
}

/// Model output for one document. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub document_id: String,
    pub summary: String,
    pub overall_risk: RiskLevel,
    #[serde(default)]
    pub clauses: Vec<ClauseInsight>,
    #[serde(default)]
    pub overlays: Vec<ClauseInsight>,
}

impl Analysis {
    pub fn highest_risk_clauses(&self) -> impl Iterator<Item = &ClauseInsight> {
        self.clauses.iter().filter(|c| c.risk == RiskLevel::High)
    }
}

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Documents shown when no backend listing is available.
pub fn demo_documents() -> Vec<Document> {
    vec![
        Document {
            id: "doc-001".to_string(),
            name: "MSA - Contoso (Redlines).pdf".to_string(),
            status: DocumentStatus::Complete,
            updated_at: ts("2025-01-21T10:00:00Z"),
            risk: Some(RiskLevel::Medium),
            storage_path: Some("contracts/doc-001.pdf".to_string()),
        },
        Document {
            id: "doc-002".to_string(),
            name: "DPA - Vendor X.pdf".to_string(),
            status: DocumentStatus::Processing,
            updated_at: ts("2025-01-22T09:00:00Z"),
            risk: None,
            storage_path: Some("contracts/doc-002.pdf".to_string()),
        },
        Document {
            id: "doc-003".to_string(),
            name: "NDA - Candidate.docx".to_string(),
            status: DocumentStatus::Pending,
            updated_at: ts("2025-01-23T08:30:00Z"),
            risk: None,
            storage_path: None,
        },
    ]
}

pub fn demo_analysis(document_id: &str) -> Option<Analysis> {
    if document_id != "doc-001" {
        return None;
    }
    let clause = |id: &str, title: &str, risk, explanation: &str, recommendation: &str, page, rect| {
        ClauseInsight {
            id: id.to_string(),
            title: title.to_string(),
            risk,
            explanation: explanation.to_string(),
            recommendation: recommendation.to_string(),
            page,
            bounds: vec![rect],
        }
    };
    Some(Analysis {
        document_id: document_id.to_string(),
        summary: "The agreement is commercially reasonable with several negotiable items in liability and data processing sections.".to_string(),
        overall_risk: RiskLevel::Medium,
        clauses: vec![
            clause(
                "c1",
                "Limitation of Liability",
                RiskLevel::High,
                "Cap is 1x fees with exclusion for indirect damages missing.",
                "Introduce mutual exclusion for consequential damages and increase cap to 2x fees.",
                4,
                OverlayRect { x: 120.0, y: 320.0, width: 380.0, height: 70.0 },
            ),
            clause(
                "c2",
                "Data Processing",
                RiskLevel::Medium,
                "DPA references obsolete sub-processor list.",
                "Request updated list and 30-day notice with termination right.",
                7,
                OverlayRect { x: 80.0, y: 500.0, width: 420.0, height: 60.0 },
            ),
            clause(
                "c3",
                "Governing Law",
                RiskLevel::Low,
                "New York law with JAMS arbitration is acceptable.",
                "No change required.",
                10,
                OverlayRect { x: 100.0, y: 650.0, width: 360.0, height: 40.0 },
            ),
        ],
        overlays: vec![],
    })
}
