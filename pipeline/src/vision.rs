//! Vision stage client.
//!
//! Uploads the photographs to the vision service as a multipart form and
//! returns validated [`VisionFindings`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::health::{probe, StageHealth};
use crate::models::{ImageUpload, Stage, ValidatedRequest, VisionFindings};
use crate::transport::{build_client, read_json, unavailable, with_timeout};
use crate::{schema, Error, Result};

/// The first pipeline stage.
#[async_trait]
pub trait VisionStage: Send + Sync {
    /// Submit the images and return findings that satisfy the findings contract.
    async fn analyze(&self, request: &ValidatedRequest) -> Result<VisionFindings>;

    async fn health(&self) -> StageHealth;
}

/// HTTP client for the vision service.
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    analyze_url: String,
    health_url: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl VisionClient {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::with_client(build_client()?, config))
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(http: reqwest::Client, config: &PipelineConfig) -> Self {
        Self {
            http,
            analyze_url: config.vision_url("analyze"),
            health_url: config.vision_url("health"),
            timeout: config.vision_timeout,
            health_timeout: config.health_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.analyze_url
    }

    fn image_part(&self, image: &ImageUpload) -> Result<Part> {
        Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.content_type())
            .map_err(|e| Error::Config(format!("Invalid image content type: {}", e)))
    }

    fn form(&self, request: &ValidatedRequest) -> Result<Form> {
        let mut form = Form::new().part("frontal", self.image_part(request.frontal())?);
        if let Some(image) = request.left_profile() {
            form = form.part("left_profile", self.image_part(image)?);
        }
        if let Some(image) = request.right_profile() {
            form = form.part("right_profile", self.image_part(image)?);
        }

        let metadata = request.metadata();
        if let Some(age) = metadata.chronological_age {
            form = form.text("chronological_age", age.to_string());
        }
        if let Some(sex) = metadata.sex {
            form = form.text("sex", sex.as_str());
        }
        if let Some(skin_type) = metadata.skin_type {
            form = form.text("skin_type", skin_type.as_str());
        }
        Ok(form)
    }
}

#[async_trait]
impl VisionStage for VisionClient {
    async fn analyze(&self, request: &ValidatedRequest) -> Result<VisionFindings> {
        let form = self.form(request)?;
        debug!(endpoint = %self.analyze_url, views = ?request.views(), "Submitting images to vision stage");

        let body = with_timeout(Stage::Vision, self.timeout, async {
            let response = self
                .http
                .post(&self.analyze_url)
                .multipart(form)
                .send()
                .await
                .map_err(|e| unavailable(Stage::Vision, &self.analyze_url, e))?;
            read_json(Stage::Vision, &self.analyze_url, response).await
        })
        .await?;

        schema::validate_findings(body).map_err(|violations| Error::StageContractViolation {
            stage: Stage::Vision,
            violations,
        })
    }

    async fn health(&self) -> StageHealth {
        probe(&self.http, Stage::Vision, &self.health_url, self.health_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_part_accepts_every_sniffed_type() {
        let client = VisionClient::with_client(reqwest::Client::new(), &PipelineConfig::default());
        for bytes in [
            vec![0xFF, 0xD8, 0xFF, 0xE0],
            b"\x89PNG\r\n\x1a\n".to_vec(),
            b"RIFF\x10\x00\x00\x00WEBPVP8 ".to_vec(),
            b"GIF89a".to_vec(),
        ] {
            let image = ImageUpload::new("face", bytes);
            assert!(client.image_part(&image).is_ok(), "{}", image.content_type());
        }
    }
}
