//! Health probes against the stage services' `/health` endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// The service is up but its model is not loaded
    ModelUnavailable,
    Unhealthy,
    /// No answer within the probe budget
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageHealth {
    pub stage: Stage,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StageHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    fn unreachable(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: HealthStatus::Unreachable,
            model: None,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: Option<String>,
    model: Option<String>,
    error: Option<String>,
}

/// Probe `url` and classify the answer. Never fails; unreachable services
/// are reported as such.
pub(crate) async fn probe(
    http: &reqwest::Client,
    stage: Stage,
    url: &str,
    timeout: Duration,
) -> StageHealth {
    let response = match http.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(stage = %stage, error = %e, "Health probe failed");
            return StageHealth::unreachable(stage, e.to_string());
        }
    };

    let http_status = response.status();
    let body = match response.json::<HealthBody>().await {
        Ok(body) => body,
        Err(e) => {
            return StageHealth {
                stage,
                status: HealthStatus::Unhealthy,
                model: None,
                detail: Some(format!("HTTP {}: unreadable health body: {}", http_status.as_u16(), e)),
            };
        }
    };

    let status = match body.status.as_deref() {
        Some("healthy") if http_status.is_success() => HealthStatus::Healthy,
        Some("model_unavailable") => HealthStatus::ModelUnavailable,
        _ => HealthStatus::Unhealthy,
    };
    let detail = body.error.or_else(|| match body.status.as_deref() {
        None => Some(format!("HTTP {}: health body has no status", http_status.as_u16())),
        Some(_) if !http_status.is_success() => Some(format!("HTTP {}", http_status.as_u16())),
        Some(_) => None,
    });

    StageHealth {
        stage,
        status,
        model: body.model,
        detail,
    }
}
