//! Inbound analysis request and patient metadata.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Biological sex as accepted by the interpretation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "F", alias = "female")]
    Female,
    #[serde(rename = "M", alias = "male")]
    Male,
    #[serde(rename = "X", alias = "other")]
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "F",
            Sex::Male => "M",
            Sex::Other => "X",
        }
    }
}

/// Self-reported skin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinType {
    Normal,
    Dry,
    Oily,
    #[serde(alias = "combination")]
    Combo,
    Sensitive,
}

impl SkinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkinType::Normal => "normal",
            SkinType::Dry => "dry",
            SkinType::Oily => "oily",
            SkinType::Combo => "combo",
            SkinType::Sensitive => "sensitive",
        }
    }
}

/// Optional patient metadata forwarded to both stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PatientMetadata {
    /// Chronological age in years
    #[validate(range(min = 1, max = 150))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chronological_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_type: Option<SkinType>,
}

/// An uploaded photograph.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type sniffed from the leading magic bytes.
    pub fn content_type(&self) -> &'static str {
        match self.bytes.as_slice() {
            [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
            [0x89, b'P', b'N', b'G', ..] => "image/png",
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

// Keep image payloads out of log lines.
impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type())
            .finish()
    }
}

/// A request as received from the caller, before validation.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub frontal: Option<ImageUpload>,
    pub left_profile: Option<ImageUpload>,
    pub right_profile: Option<ImageUpload>,
    pub metadata: PatientMetadata,
}

impl AnalysisRequest {
    pub fn new(frontal: ImageUpload) -> Self {
        Self {
            frontal: Some(frontal),
            ..Default::default()
        }
    }

    pub fn with_left_profile(mut self, image: ImageUpload) -> Self {
        self.left_profile = Some(image);
        self
    }

    pub fn with_right_profile(mut self, image: ImageUpload) -> Self {
        self.right_profile = Some(image);
        self
    }

    pub fn with_metadata(mut self, metadata: PatientMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn views(&self) -> ViewsSubmitted {
        ViewsSubmitted {
            frontal: self.frontal.is_some(),
            left_profile: self.left_profile.is_some(),
            right_profile: self.right_profile.is_some(),
        }
    }
}

/// A request that passed pre-flight validation.
///
/// Only [`crate::schema::validate_request`] constructs this, so holding one
/// proves the frontal image is present and within the size limit.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub(crate) frontal: ImageUpload,
    pub(crate) left_profile: Option<ImageUpload>,
    pub(crate) right_profile: Option<ImageUpload>,
    pub(crate) metadata: PatientMetadata,
}

impl ValidatedRequest {
    pub fn frontal(&self) -> &ImageUpload {
        &self.frontal
    }

    pub fn left_profile(&self) -> Option<&ImageUpload> {
        self.left_profile.as_ref()
    }

    pub fn right_profile(&self) -> Option<&ImageUpload> {
        self.right_profile.as_ref()
    }

    pub fn metadata(&self) -> &PatientMetadata {
        &self.metadata
    }

    pub fn views(&self) -> ViewsSubmitted {
        ViewsSubmitted {
            frontal: true,
            left_profile: self.left_profile.is_some(),
            right_profile: self.right_profile.is_some(),
        }
    }
}

/// Which views the caller uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewsSubmitted {
    pub frontal: bool,
    pub left_profile: bool,
    pub right_profile: bool,
}
