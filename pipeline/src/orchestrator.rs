//! Two-stage pipeline orchestrator.
//!
//! A [`Pipeline`] owns the two stage clients and is shared across requests.
//! Each request gets its own [`AnalysisRun`], which walks the state machine
//!
//! ```text
//! Idle -> ValidatingInput -> RunningVision -> RunningInterpretation -> Assembling -> Succeeded
//! ```
//!
//! and ends in `Failed` from any non-terminal state. `execute` consumes the
//! run, so a run can never be re-entered or resumed; resubmitting a request
//! starts again from validation.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::{assemble, AssembledResult, RunContext, StageTimings};
use crate::config::PipelineConfig;
use crate::error::FailureKind;
use crate::health::StageHealth;
use crate::interpretation::{InterpretationClient, InterpretationStage};
use crate::models::{AnalysisRequest, Stage};
use crate::transport::build_client;
use crate::vision::{VisionClient, VisionStage};
use crate::{schema, Error, Result};

/// Observable progress of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    ValidatingInput,
    RunningVision,
    RunningInterpretation,
    Assembling,
    Succeeded,
    Failed {
        stage: Option<Stage>,
        kind: FailureKind,
    },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed { .. })
    }
}

/// Caller side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Run side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the paired handle cancels.
    pub async fn cancelled(&mut self) {
        loop {
            let cancelled = *self.0.borrow_and_update();
            if cancelled {
                return;
            }
            if self.0.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), CancelSignal(rx))
}

/// Health of both stage services.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineHealth {
    pub vision: StageHealth,
    pub interpretation: StageHealth,
}

impl PipelineHealth {
    pub fn is_healthy(&self) -> bool {
        self.vision.is_healthy() && self.interpretation.is_healthy()
    }
}

/// Sequences the vision and interpretation stages.
pub struct Pipeline<V = VisionClient, I = InterpretationClient> {
    vision: V,
    interpretation: I,
    max_image_bytes: usize,
}

impl Pipeline {
    /// Build a pipeline with HTTP clients for both stages sharing one
    /// connection pool.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let http = build_client()?;
        Ok(Self::new(
            VisionClient::with_client(http.clone(), config),
            InterpretationClient::with_client(http, config),
            config.max_image_bytes,
        ))
    }
}

impl<V: VisionStage, I: InterpretationStage> Pipeline<V, I> {
    pub fn new(vision: V, interpretation: I, max_image_bytes: usize) -> Self {
        Self {
            vision,
            interpretation,
            max_image_bytes,
        }
    }

    /// Create a run for `request` in the `Idle` state.
    pub fn begin(&self, request: AnalysisRequest) -> AnalysisRun<'_, V, I> {
        let (state, _) = watch::channel(RunState::Idle);
        AnalysisRun {
            pipeline: self,
            run_id: Uuid::new_v4(),
            request,
            state,
        }
    }

    /// Run analysis end to end.
    pub async fn run(&self, request: AnalysisRequest) -> Result<AssembledResult> {
        self.begin(request).execute(CancelSignal::never()).await
    }

    /// Run analysis end to end, aborting when `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        request: AnalysisRequest,
        cancel: CancelSignal,
    ) -> Result<AssembledResult> {
        self.begin(request).execute(cancel).await
    }

    pub async fn health(&self) -> PipelineHealth {
        let (vision, interpretation) = tokio::join!(self.vision.health(), self.interpretation.health());
        PipelineHealth {
            vision,
            interpretation,
        }
    }
}

/// One end-to-end execution of the pipeline for a single request.
pub struct AnalysisRun<'p, V, I> {
    pipeline: &'p Pipeline<V, I>,
    run_id: Uuid,
    request: AnalysisRequest,
    state: watch::Sender<RunState>,
}

impl<'p, V: VisionStage, I: InterpretationStage> AnalysisRun<'p, V, I> {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Watch state transitions. The run never waits on subscribers.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub async fn execute(self, mut cancel: CancelSignal) -> Result<AssembledResult> {
        let AnalysisRun {
            pipeline,
            run_id,
            request,
            state,
        } = self;
        let transition = |next: RunState| {
            debug!(run_id = %run_id, state = ?next, "Run state transition");
            state.send_replace(next);
        };

        info!(run_id = %run_id, views = ?request.views(), "Analysis run started");
        let result = drive(pipeline, run_id, request, &mut cancel, &transition).await;

        match &result {
            Ok(assembled) => {
                transition(RunState::Succeeded);
                info!(
                    run_id = %run_id,
                    total_ms = assembled.timings().total_ms,
                    "Analysis run succeeded"
                );
            }
            Err(e) => {
                transition(RunState::Failed {
                    stage: e.stage(),
                    kind: e.kind(),
                });
                warn!(
                    run_id = %run_id,
                    stage = e.stage().map(|s| s.as_str()).unwrap_or("none"),
                    kind = e.kind().as_str(),
                    error = %e,
                    "Analysis run failed"
                );
            }
        }
        result
    }
}

async fn drive<V, I, T>(
    pipeline: &Pipeline<V, I>,
    run_id: Uuid,
    request: AnalysisRequest,
    cancel: &mut CancelSignal,
    transition: &T,
) -> Result<AssembledResult>
where
    V: VisionStage,
    I: InterpretationStage,
    T: Fn(RunState),
{
    let started = Instant::now();

    transition(RunState::ValidatingInput);
    let request =
        schema::validate_request(request, pipeline.max_image_bytes).map_err(Error::InvalidRequest)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { stage: None });
    }

    transition(RunState::RunningVision);
    let vision_started = Instant::now();
    let findings = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled { stage: Some(Stage::Vision) }),
        findings = pipeline.vision.analyze(&request) => findings?,
    };
    let vision_elapsed = vision_started.elapsed();
    info!(run_id = %run_id, stage = %Stage::Vision, elapsed_ms = vision_elapsed.as_millis() as u64, "Stage completed");

    transition(RunState::RunningInterpretation);
    let interpretation_started = Instant::now();
    let interpretation = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled { stage: Some(Stage::Interpretation) }),
        result = pipeline.interpretation.interpret(&findings, request.metadata()) => result?,
    };
    let interpretation_elapsed = interpretation_started.elapsed();
    info!(
        run_id = %run_id,
        stage = %Stage::Interpretation,
        elapsed_ms = interpretation_elapsed.as_millis() as u64,
        "Stage completed"
    );

    transition(RunState::Assembling);
    let views = request.views();
    let context = RunContext {
        run_id,
        metadata: request.metadata,
        views,
        completed_at: Utc::now(),
    };
    let timings = StageTimings::new(vision_elapsed, interpretation_elapsed, started.elapsed());
    Ok(assemble(context, findings, interpretation, timings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;
    use crate::models::{
        ImageUpload, InterpretationResult, PatientMetadata, ValidatedRequest, VisionFindings,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn findings_fixture() -> VisionFindings {
        schema::validate_findings(
            serde_json::from_str(include_str!("../tests/fixtures/vision_findings.json")).unwrap(),
        )
        .unwrap()
    }

    fn interpretation_fixture() -> InterpretationResult {
        schema::validate_interpretation(
            serde_json::from_str(include_str!("../tests/fixtures/interpretation.json")).unwrap(),
        )
        .unwrap()
    }

    fn healthy(stage: Stage) -> StageHealth {
        StageHealth {
            stage,
            status: HealthStatus::Healthy,
            model: None,
            detail: None,
        }
    }

    /// Vision stand-in that echoes the requested age into the findings.
    struct FakeVision {
        calls: AtomicUsize,
        delay: Duration,
        fail_with: Option<fn() -> Error>,
    }

    impl FakeVision {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl VisionStage for FakeVision {
        async fn analyze(&self, request: &ValidatedRequest) -> Result<VisionFindings> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            let mut findings = findings_fixture();
            findings.age_estimation = format!("{:?}", request.metadata().chronological_age);
            Ok(findings)
        }

        async fn health(&self) -> StageHealth {
            healthy(Stage::Vision)
        }
    }

    #[derive(Default)]
    struct FakeInterpretation {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InterpretationStage for FakeInterpretation {
        async fn interpret(
            &self,
            findings: &VisionFindings,
            _metadata: &PatientMetadata,
        ) -> Result<InterpretationResult> {
            self.seen.lock().unwrap().push(findings.age_estimation.clone());
            Ok(interpretation_fixture())
        }

        async fn health(&self) -> StageHealth {
            StageHealth {
                status: HealthStatus::ModelUnavailable,
                ..healthy(Stage::Interpretation)
            }
        }
    }

    fn request(age: u32) -> AnalysisRequest {
        AnalysisRequest::new(ImageUpload::new("face.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0])).with_metadata(
            PatientMetadata {
                chronological_age: Some(age),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_missing_frontal_fails_before_any_stage() {
        let pipeline = Pipeline::new(FakeVision::ok(), FakeInterpretation::default(), 1024);
        let run = pipeline.begin(AnalysisRequest::default());
        let states = run.subscribe();

        let err = run.execute(CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(err.missing_fields(), vec!["frontal"]);
        assert_eq!(pipeline.vision.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.interpretation.seen.lock().unwrap().is_empty());
        assert_eq!(
            *states.borrow(),
            RunState::Failed {
                stage: None,
                kind: FailureKind::InvalidRequest
            }
        );
    }

    #[tokio::test]
    async fn test_vision_failure_skips_interpretation() {
        let vision = FakeVision {
            fail_with: Some(|| Error::StageTimeout {
                stage: Stage::Vision,
                limit: Duration::from_secs(90),
            }),
            ..FakeVision::ok()
        };
        let pipeline = Pipeline::new(vision, FakeInterpretation::default(), 1024);

        let err = pipeline.run(request(40)).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Vision));
        assert_eq!(err.kind(), FailureKind::StageTimeout);
        assert!(pipeline.interpretation.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_run_reaches_succeeded() {
        let pipeline = Pipeline::new(FakeVision::ok(), FakeInterpretation::default(), 1024);
        let run = pipeline.begin(request(38));
        let run_id = run.run_id();
        let states = run.subscribe();

        let result = run.execute(CancelSignal::never()).await.unwrap();
        assert_eq!(result.run_id(), run_id);
        assert_eq!(result.metadata().chronological_age, Some(38));
        assert_eq!(result.vision_findings().age_estimation, "Some(38)");
        assert_eq!(*states.borrow(), RunState::Succeeded);
        assert!(states.borrow().is_terminal());
    }

    #[tokio::test]
    async fn test_concurrent_runs_stay_independent() {
        let pipeline = Pipeline::new(FakeVision::ok(), FakeInterpretation::default(), 1024);

        let (a, b) = tokio::join!(pipeline.run(request(25)), pipeline.run(request(61)));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.metadata().chronological_age, Some(25));
        assert_eq!(b.metadata().chronological_age, Some(61));
        assert_eq!(a.vision_findings().age_estimation, "Some(25)");
        assert_eq!(b.vision_findings().age_estimation, "Some(61)");
    }

    #[tokio::test]
    async fn test_cancel_during_vision_aborts_run() {
        let vision = FakeVision {
            delay: Duration::from_secs(30),
            ..FakeVision::ok()
        };
        let pipeline = Pipeline::new(vision, FakeInterpretation::default(), 1024);
        let (handle, signal) = cancellation();

        let canceller = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        };
        let started = Instant::now();
        let (result, _) = tokio::join!(pipeline.run_with_cancel(request(30), signal), canceller);

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Cancelled { stage: Some(Stage::Vision) }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(pipeline.vision.calls.load(Ordering::SeqCst), 1);
        assert!(pipeline.interpretation.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let pipeline = Pipeline::new(FakeVision::ok(), FakeInterpretation::default(), 1024);
        let (handle, signal) = cancellation();
        handle.cancel();

        let err = pipeline.run_with_cancel(request(30), signal).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { stage: None }));
        assert_eq!(pipeline.vision.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_reports_both_stages() {
        let pipeline = Pipeline::new(FakeVision::ok(), FakeInterpretation::default(), 1024);
        let health = pipeline.health().await;
        assert!(health.vision.is_healthy());
        assert_eq!(health.interpretation.status, HealthStatus::ModelUnavailable);
        assert!(!health.is_healthy());
    }
}
