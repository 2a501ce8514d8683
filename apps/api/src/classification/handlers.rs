//! Axum route handlers for the Classification API.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classification::catalog::RoleKey;
use crate::classification::customizer::CustomizedDocument;
use crate::classification::pipeline::Classification;
use crate::classification::selector::{FallbackStep, RoleBreakdownEntry};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub jd_text: String,
}

/// API-facing summary of a classification.
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    /// "matched" or "no_signal".
    pub outcome: &'static str,
    pub analysis_id: Uuid,
    pub role: RoleKey,
    pub display_name: String,
    pub percentages: BTreeMap<RoleKey, f64>,
    pub breakdown: Vec<RoleBreakdownEntry>,
    pub template_path: String,
    pub confidence: f64,
    pub mixed_role: bool,
    pub fallback_used: bool,
    pub fallback_steps: Vec<FallbackStep>,
    pub hint_applied: bool,
}

impl From<&Classification> for ClassifyResponse {
    fn from(classification: &Classification) -> Self {
        match classification {
            Classification::Matched(result) => ClassifyResponse {
                outcome: "matched",
                analysis_id: result.analysis_id,
                role: result.template.role,
                display_name: result.template.display_name.clone(),
                percentages: result.percentages.iter().map(|(k, v)| (*k, *v)).collect(),
                breakdown: result.breakdown.clone(),
                template_path: result.template.template_path.display().to_string(),
                confidence: result.template.confidence,
                mixed_role: result.mixed_role,
                fallback_used: result.fallback_used,
                fallback_steps: result.fallback_steps.clone(),
                hint_applied: result.hint_applied,
            },
            Classification::NoSignal(result) => ClassifyResponse {
                outcome: "no_signal",
                analysis_id: result.analysis_id,
                role: result.template.role,
                display_name: result.template.display_name.clone(),
                percentages: result.percentages.iter().map(|(k, v)| (*k, *v)).collect(),
                breakdown: Vec::new(),
                template_path: result.template.template_path.display().to_string(),
                confidence: 0.0,
                mixed_role: false,
                fallback_used: false,
                fallback_steps: Vec::new(),
                hint_applied: false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomizeRequest {
    pub jd_text: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    /// Additional placeholder values; `company` / `job_title` take precedence.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl CustomizeRequest {
    fn placeholder_values(&self) -> BTreeMap<String, String> {
        let mut values = self.extra.clone();
        if let Some(company) = &self.company {
            values.insert("company".to_string(), company.clone());
        }
        if let Some(job_title) = &self.job_title {
            values.insert("job_title".to_string(), job_title.clone());
        }
        values
    }
}

#[derive(Debug, Serialize)]
pub struct CustomizeResponse {
    pub classification: ClassifyResponse,
    pub document: CustomizedDocument,
}

#[derive(Debug, Serialize)]
pub struct RoleSummary {
    pub key: RoleKey,
    pub display_name: String,
    pub priority: u32,
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub default_role: RoleKey,
    pub guarded_role: Option<RoleKey>,
    pub roles: Vec<RoleSummary>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/roles
///
/// Lists the role catalog the classifier scores against.
pub async fn handle_list_roles(State(state): State<AppState>) -> Json<RolesResponse> {
    let catalog = state.classifier.catalog();
    Json(RolesResponse {
        default_role: catalog.default_role(),
        guarded_role: catalog.guarded_role(),
        roles: catalog
            .categories()
            .iter()
            .map(|c| RoleSummary {
                key: c.key,
                display_name: c.display_name.clone(),
                priority: c.priority,
                keywords: c.keywords.clone(),
            })
            .collect(),
    })
}

/// POST /api/v1/classify
///
/// Classifies a job description and returns the selected role template.
pub async fn handle_classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let classification = state
        .classifier
        .classify_enriched(
            &request.jd_text,
            state.analyzer.as_ref(),
            state.config.ai_timeout,
        )
        .await?;

    Ok(Json(ClassifyResponse::from(&classification)))
}

/// POST /api/v1/templates/customize
///
/// Classifies, then fills the selected template with company / title values.
pub async fn handle_customize(
    State(state): State<AppState>,
    Json(request): Json<CustomizeRequest>,
) -> Result<Json<CustomizeResponse>, AppError> {
    let classification = state
        .classifier
        .classify_enriched(
            &request.jd_text,
            state.analyzer.as_ref(),
            state.config.ai_timeout,
        )
        .await?;

    let document = state
        .classifier
        .customize(classification.template(), &request.placeholder_values())?;

    Ok(Json(CustomizeResponse {
        classification: ClassifyResponse::from(&classification),
        document,
    }))
}
