//! Stage-2 output: scores, classifications, care plan and narrative report.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Score tuple without zone attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Score {
    #[validate(range(min = 0, max = 4))]
    pub severity_0_4: i64,
    #[validate(range(min = 0, max = 100))]
    pub marker_0_100: i64,
    #[validate(range(min = 0, max = 100))]
    pub confidence_0_100: i64,
}

/// Score tuple with the zones it was observed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ZonedScore {
    #[validate(range(min = 0, max = 4))]
    pub severity_0_4: i64,
    #[validate(range(min = 0, max = 100))]
    pub marker_0_100: i64,
    #[validate(range(min = 0, max = 100))]
    pub confidence_0_100: i64,
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConditionScores {
    #[validate(nested)]
    pub acne: ZonedScore,
    #[validate(nested)]
    pub pigmentation: ZonedScore,
    #[validate(nested)]
    pub redness: ZonedScore,
    #[validate(nested)]
    pub texture: ZonedScore,
    #[validate(nested)]
    pub pores: ZonedScore,
    #[validate(nested)]
    pub sebum: ZonedScore,
    #[validate(nested)]
    pub barrier: Score,
    #[validate(nested)]
    pub hydration: Score,
    #[validate(nested)]
    pub dark_circles: Score,
}

/// Glogau photoaging classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlogauType {
    I,
    II,
    III,
    IV,
}

impl GlogauType {
    pub const NAMES: [&'static str; 4] = ["I", "II", "III", "IV"];

    pub fn description(&self) -> &'static str {
        match self {
            GlogauType::I => "Minimal photoaging",
            GlogauType::II => "Early photoaging, wrinkles in motion",
            GlogauType::III => "Moderate photoaging, wrinkles at rest",
            GlogauType::IV => "Advanced photoaging",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AgingScores {
    #[validate(range(min = 0, max = 150))]
    pub skin_age_years: i64,
    pub chronological_age_years: Option<i64>,
    pub delta_years: Option<i64>,
    pub glogau_type: GlogauType,
    #[validate(nested)]
    pub wrinkles: ZonedScore,
    #[validate(nested)]
    pub sagging: ZonedScore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LifestyleMarkers {
    #[validate(nested)]
    pub stress_markers: Score,
    #[validate(nested)]
    pub screen_fatigue: Score,
    #[validate(nested)]
    pub lip_health: Score,
    #[validate(nested)]
    pub smoking_damage: Score,
    #[validate(nested)]
    pub sleep_deficit: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct HormonalAcne {
    pub present: bool,
    #[validate(range(min = 0, max = 4))]
    pub severity_0_4: i64,
    #[validate(range(min = 0, max = 100))]
    pub confidence_0_100: i64,
    pub notes: String,
}

/// A yes/no endocrine or nutritional cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EndocrineCue {
    pub suggestive: bool,
    #[validate(range(min = 0, max = 100))]
    pub confidence_0_100: i64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct HormonalCues {
    #[validate(nested)]
    pub hormonal_acne: HormonalAcne,
    #[validate(nested)]
    pub pcos_thyroid: EndocrineCue,
    #[validate(nested)]
    pub nutrient_def: EndocrineCue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EnvironmentalDamage {
    #[validate(nested)]
    pub uv_damage: Score,
    #[validate(nested)]
    pub pollution: Score,
    #[validate(nested)]
    pub oxidative: Score,
    #[validate(nested)]
    pub thermal_flushing: Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewsReceived {
    pub frontal: bool,
    pub left_profile: bool,
    pub right_profile: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarePlan {
    pub morning: Vec<String>,
    pub night: Vec<String>,
    pub weekly: Vec<String>,
}

/// The structured record produced by the interpretation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StructuredData {
    pub usable: bool,
    pub quality_notes: Vec<String>,
    pub views_received: ViewsReceived,
    pub zones_visible: Vec<String>,
    #[validate(nested)]
    pub skin_condition: ConditionScores,
    #[validate(nested)]
    pub aging: AgingScores,
    #[validate(nested)]
    pub lifestyle: LifestyleMarkers,
    #[validate(nested)]
    pub hormonal_cues: HormonalCues,
    #[validate(nested)]
    pub environmental_damage: EnvironmentalDamage,
    pub referral_flags: Vec<String>,
    pub care_plan: CarePlan,
}

/// Validated output of the interpretation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretationResult {
    /// Markdown narrative for the patient
    pub markdown_report: String,
    pub structured_data: StructuredData,
}
