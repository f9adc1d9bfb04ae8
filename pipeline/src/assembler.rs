//! Merges the two stage outputs into the final, read-only result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    GlogauType, InterpretationResult, PatientMetadata, ViewsSubmitted, VisionFindings,
};

pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wall-clock time spent in each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub vision_ms: u64,
    pub interpretation_ms: u64,
    pub total_ms: u64,
}

impl StageTimings {
    pub fn new(vision: Duration, interpretation: Duration, total: Duration) -> Self {
        Self {
            vision_ms: vision.as_millis() as u64,
            interpretation_ms: interpretation.as_millis() as u64,
            total_ms: total.as_millis() as u64,
        }
    }
}

/// Request-level facts carried into the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub metadata: PatientMetadata,
    pub views: ViewsSubmitted,
    pub completed_at: DateTime<Utc>,
}

/// Final output of a successful run. Fields are read-only once assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledResult {
    run_id: Uuid,
    pipeline_version: &'static str,
    completed_at: DateTime<Utc>,
    metadata: PatientMetadata,
    views_submitted: ViewsSubmitted,
    vision_findings: VisionFindings,
    interpretation: InterpretationResult,
    timings: StageTimings,
}

impl AssembledResult {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pipeline_version(&self) -> &str {
        self.pipeline_version
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn metadata(&self) -> &PatientMetadata {
        &self.metadata
    }

    pub fn views_submitted(&self) -> ViewsSubmitted {
        self.views_submitted
    }

    pub fn vision_findings(&self) -> &VisionFindings {
        &self.vision_findings
    }

    pub fn interpretation(&self) -> &InterpretationResult {
        &self.interpretation
    }

    pub fn timings(&self) -> StageTimings {
        self.timings
    }

    pub fn report(&self) -> &str {
        &self.interpretation.markdown_report
    }

    pub fn skin_age_years(&self) -> i64 {
        self.interpretation.structured_data.aging.skin_age_years
    }

    pub fn glogau_type(&self) -> GlogauType {
        self.interpretation.structured_data.aging.glogau_type
    }
}

/// Pure merge of already-validated stage outputs.
pub fn assemble(
    context: RunContext,
    findings: VisionFindings,
    interpretation: InterpretationResult,
    timings: StageTimings,
) -> AssembledResult {
    AssembledResult {
        run_id: context.run_id,
        pipeline_version: PIPELINE_VERSION,
        completed_at: context.completed_at,
        metadata: context.metadata,
        views_submitted: context.views,
        vision_findings: findings,
        interpretation,
        timings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, SkinType};
    use crate::schema;
    use chrono::TimeZone;

    fn inputs() -> (RunContext, VisionFindings, InterpretationResult, StageTimings) {
        let findings = schema::validate_findings(
            serde_json::from_str(include_str!("../tests/fixtures/vision_findings.json")).unwrap(),
        )
        .unwrap();
        let interpretation = schema::validate_interpretation(
            serde_json::from_str(include_str!("../tests/fixtures/interpretation.json")).unwrap(),
        )
        .unwrap();
        let context = RunContext {
            run_id: Uuid::from_u128(0x5eed),
            metadata: PatientMetadata {
                chronological_age: Some(38),
                sex: Some(Sex::Female),
                skin_type: Some(SkinType::Combo),
            },
            views: ViewsSubmitted {
                frontal: true,
                left_profile: false,
                right_profile: false,
            },
            completed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        let timings = StageTimings::new(
            Duration::from_millis(1200),
            Duration::from_millis(3400),
            Duration::from_millis(4650),
        );
        (context, findings, interpretation, timings)
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let (context, findings, interpretation, timings) = inputs();
        let first = assemble(context.clone(), findings.clone(), interpretation.clone(), timings);
        let second = assemble(context, findings, interpretation, timings);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_assembly_carries_every_input() {
        let (context, findings, interpretation, timings) = inputs();
        let result = assemble(context.clone(), findings.clone(), interpretation.clone(), timings);

        assert_eq!(result.run_id(), context.run_id);
        assert_eq!(result.metadata(), &context.metadata);
        assert_eq!(result.vision_findings(), &findings);
        assert_eq!(result.interpretation(), &interpretation);
        assert_eq!(result.timings().total_ms, 4650);
        assert_eq!(result.skin_age_years(), 42);
        assert_eq!(result.glogau_type(), GlogauType::II);
        assert_eq!(result.pipeline_version(), PIPELINE_VERSION);
    }

    #[test]
    fn test_serialized_shape() {
        let (context, findings, interpretation, timings) = inputs();
        let json = serde_json::to_value(assemble(context, findings, interpretation, timings)).unwrap();

        assert_eq!(json["metadata"]["sex"], "F");
        assert_eq!(json["timings"]["vision_ms"], 1200);
        assert_eq!(json["interpretation"]["structured_data"]["aging"]["glogau_type"], "II");
        assert!(json["vision_findings"]["zone_analysis"]["forehead"].is_object());
        assert_eq!(json["completed_at"], "2024-05-01T12:00:00Z");
    }
}
