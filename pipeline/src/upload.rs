//! JSON upload body accepted by the `POST /analyze` Lambda.
//!
//! Images arrive base64 encoded, optionally as `data:` URLs:
//!
//! ```json
//! {
//!   "frontal": { "filename": "face.jpg", "data": "/9j/4AAQ..." },
//!   "left_profile": { "data": "data:image/jpeg;base64,/9j/..." },
//!   "chronological_age": 38,
//!   "sex": "F",
//!   "skin_type": "combo"
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::models::{AnalysisRequest, ImageUpload, PatientMetadata};
use crate::schema::Violation;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct EncodedImage {
    #[serde(default)]
    pub filename: Option<String>,
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeUpload {
    #[serde(default)]
    pub frontal: Option<EncodedImage>,
    #[serde(default)]
    pub left_profile: Option<EncodedImage>,
    #[serde(default)]
    pub right_profile: Option<EncodedImage>,
    #[serde(flatten)]
    pub metadata: PatientMetadata,
}

impl AnalyzeUpload {
    /// Decode every image, reporting all undecodable ones at once.
    pub fn into_request(self) -> Result<AnalysisRequest> {
        let mut violations = Vec::new();
        let frontal = decode(self.frontal, "frontal", &mut violations);
        let left_profile = decode(self.left_profile, "left_profile", &mut violations);
        let right_profile = decode(self.right_profile, "right_profile", &mut violations);

        if !violations.is_empty() {
            return Err(Error::InvalidRequest(violations));
        }
        Ok(AnalysisRequest {
            frontal,
            left_profile,
            right_profile,
            metadata: self.metadata,
        })
    }
}

fn decode(
    image: Option<EncodedImage>,
    view: &str,
    violations: &mut Vec<Violation>,
) -> Option<ImageUpload> {
    let image = image?;
    let payload = match image.data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => image.data.as_str(),
    };

    match STANDARD.decode(payload.trim()) {
        Ok(bytes) => {
            let file_name = image.filename.unwrap_or_else(|| format!("{}.jpg", view));
            Some(ImageUpload::new(file_name, bytes))
        }
        Err(e) => {
            violations.push(Violation::invalid(
                format!("{}.data", view),
                format!("not valid base64: {}", e),
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sex;
    use crate::schema::ViolationKind;

    #[test]
    fn test_decodes_images_and_metadata() {
        let upload: AnalyzeUpload = serde_json::from_str(
            r#"{
                "frontal": {"filename": "face.jpg", "data": "/9j/4A=="},
                "right_profile": {"data": "data:image/jpeg;base64,/9j/4A=="},
                "chronological_age": 38,
                "sex": "female"
            }"#,
        )
        .unwrap();

        let request = upload.into_request().unwrap();
        let frontal = request.frontal.as_ref().unwrap();
        assert_eq!(frontal.file_name, "face.jpg");
        assert_eq!(frontal.bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(request.right_profile.as_ref().unwrap().file_name, "right_profile.jpg");
        assert!(request.left_profile.is_none());
        assert_eq!(request.metadata.chronological_age, Some(38));
        assert_eq!(request.metadata.sex, Some(Sex::Female));
    }

    #[test]
    fn test_missing_frontal_is_left_to_validation() {
        let upload: AnalyzeUpload = serde_json::from_str("{}").unwrap();
        let request = upload.into_request().unwrap();
        assert!(request.frontal.is_none());
    }

    #[test]
    fn test_reports_every_undecodable_image() {
        let upload: AnalyzeUpload = serde_json::from_str(
            r#"{"frontal": {"data": "not base64!"}, "left_profile": {"data": "%%%"}}"#,
        )
        .unwrap();

        let err = upload.into_request().unwrap_err();
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["frontal.data", "left_profile.data"]);
        assert!(matches!(err.violations()[0].kind, ViolationKind::Invalid { .. }));
    }
}
