//! Interpretation stage client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::health::{probe, StageHealth};
use crate::models::{InterpretationResult, PatientMetadata, Stage, VisionFindings};
use crate::transport::{build_client, read_json, unavailable, with_timeout};
use crate::{schema, Error, Result};

/// Wire body of `POST /interpret`.
#[derive(Debug, Serialize)]
struct InterpretRequest<'a> {
    llava_findings: &'a VisionFindings,
    user_metadata: &'a PatientMetadata,
}

/// The second pipeline stage.
///
/// Callers must only pass findings that already satisfied the findings
/// contract; implementations do not re-check them.
#[async_trait]
pub trait InterpretationStage: Send + Sync {
    async fn interpret(
        &self,
        findings: &VisionFindings,
        metadata: &PatientMetadata,
    ) -> Result<InterpretationResult>;

    async fn health(&self) -> StageHealth;
}

/// HTTP client for the interpretation service.
#[derive(Debug, Clone)]
pub struct InterpretationClient {
    http: reqwest::Client,
    interpret_url: String,
    health_url: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl InterpretationClient {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::with_client(build_client()?, config))
    }

    pub fn with_client(http: reqwest::Client, config: &PipelineConfig) -> Self {
        Self {
            http,
            interpret_url: config.interpretation_url("interpret"),
            health_url: config.interpretation_url("health"),
            timeout: config.interpretation_timeout,
            health_timeout: config.health_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.interpret_url
    }
}

#[async_trait]
impl InterpretationStage for InterpretationClient {
    async fn interpret(
        &self,
        findings: &VisionFindings,
        metadata: &PatientMetadata,
    ) -> Result<InterpretationResult> {
        let payload = InterpretRequest {
            llava_findings: findings,
            user_metadata: metadata,
        };
        debug!(endpoint = %self.interpret_url, "Submitting findings to interpretation stage");

        let body = with_timeout(Stage::Interpretation, self.timeout, async {
            let response = self
                .http
                .post(&self.interpret_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| unavailable(Stage::Interpretation, &self.interpret_url, e))?;
            read_json(Stage::Interpretation, &self.interpret_url, response).await
        })
        .await?;

        schema::validate_interpretation(body).map_err(|violations| Error::StageContractViolation {
            stage: Stage::Interpretation,
            violations,
        })
    }

    async fn health(&self) -> StageHealth {
        probe(&self.http, Stage::Interpretation, &self.health_url, self.health_timeout).await
    }
}
