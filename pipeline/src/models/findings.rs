//! Stage-1 output: purely visual observations, no scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Anatomical zones visible from a frontal view. Every one must be reported.
pub const FACIAL_ZONES: [&str; 12] = [
    "forehead",
    "temple_left",
    "temple_right",
    "periorbital",
    "nose",
    "cheek_left",
    "cheek_right",
    "perioral",
    "chin",
    "jawline_left",
    "jawline_right",
    "neck",
];

/// Clinical descriptions for one anatomical zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneObservation {
    pub fine_lines_wrinkles: String,
    pub texture_coarseness: String,
    pub pigment_spots: String,
    pub redness_erythema: String,
    pub pore_visibility: String,
    pub sebum_shine: String,
    pub hydration_dryness: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinConditionNotes {
    pub acne: String,
    pub pigmentation: String,
    pub texture: String,
    pub pores: String,
    pub sebum: String,
    pub wrinkles: String,
    pub redness: String,
    pub dark_circles: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingSignNotes {
    pub sagging: String,
    pub elasticity_loss: String,
    pub photoaging_cues: String,
}

/// How usable the photograph was for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub lighting: String,
    pub blur: String,
    pub occlusions: String,
    pub angle: String,
    pub makeup_filters: String,
    pub color_cast: String,
}

/// Validated output of the vision stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionFindings {
    pub age_estimation: String,
    /// Zone name to observations, ordered by zone name
    pub zone_analysis: BTreeMap<String, ZoneObservation>,
    pub skin_conditions: SkinConditionNotes,
    pub aging_signs: AgingSignNotes,
    pub quality_assessment: QualityAssessment,
}
