//! DermAging analysis pipeline.
//!
//! Sequences two remote model services: a vision stage that turns facial
//! photographs into structured findings, and an interpretation stage that
//! turns those findings into scores and a written report. The orchestrator
//! validates everything crossing a stage boundary, enforces per-stage
//! timeouts, and classifies failures so callers can decide whether to retry.

pub mod assembler;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod interpretation;
pub mod models;
pub mod orchestrator;
pub mod schema;
pub mod transport;
pub mod upload;
pub mod vision;

pub use assembler::{AssembledResult, StageTimings, PIPELINE_VERSION};
pub use config::PipelineConfig;
pub use error::{Error, FailureKind, Result, TransportFailure};
pub use health::{HealthStatus, StageHealth};
pub use interpretation::{InterpretationClient, InterpretationStage};
pub use models::{AnalysisRequest, ImageUpload, PatientMetadata, Stage};
pub use orchestrator::{
    cancellation, AnalysisRun, CancelHandle, CancelSignal, Pipeline, PipelineHealth, RunState,
};
pub use schema::{Violation, ViolationKind};
pub use upload::AnalyzeUpload;
pub use vision::{VisionClient, VisionStage};
