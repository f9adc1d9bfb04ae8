//! Shared data models.

mod findings;
mod interpretation;
mod request;

use serde::Serialize;

pub use findings::{
    AgingSignNotes, QualityAssessment, SkinConditionNotes, VisionFindings, ZoneObservation,
    FACIAL_ZONES,
};
pub use interpretation::{
    AgingScores, CarePlan, ConditionScores, EndocrineCue, EnvironmentalDamage, GlogauType,
    HormonalAcne, HormonalCues, InterpretationResult, LifestyleMarkers, Score, StructuredData,
    ViewsReceived, ZonedScore,
};
pub use request::{
    AnalysisRequest, ImageUpload, PatientMetadata, Sex, SkinType, ValidatedRequest, ViewsSubmitted,
};

/// One of the two sequential remote inference calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Vision,
    Interpretation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Vision => "vision",
            Stage::Interpretation => "interpretation",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
