//! Error types for the analysis pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::models::Stage;
use crate::schema::{Violation, ViolationKind};

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// How a stage call failed at the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The service could not be reached at all (refused, DNS, TLS).
    Connect(String),
    /// The service answered with a non-2xx status.
    Status { status: u16, body: String },
    /// The connection broke while sending or reading the body.
    Io(String),
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportFailure::Connect(detail) => write!(f, "connection failed: {}", detail),
            TransportFailure::Status { status, body } if body.is_empty() => {
                write!(f, "HTTP {}", status)
            }
            TransportFailure::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            TransportFailure::Io(detail) => write!(f, "transport error: {}", detail),
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportFailure::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            TransportFailure::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            TransportFailure::Io(err.to_string())
        }
    }
}

/// Coarse failure category, used for run-state reporting and API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    StageTimeout,
    StageUnavailable,
    StageContractViolation,
    Cancelled,
    Config,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::StageTimeout => "stage_timeout",
            FailureKind::StageUnavailable => "stage_unavailable",
            FailureKind::StageContractViolation => "stage_contract_violation",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Config => "config",
        }
    }
}

/// Errors that terminate an analysis run.
#[derive(Error, Debug)]
pub enum Error {
    /// The inbound request failed pre-flight validation
    #[error("Invalid request: {}", join_violations(.0))]
    InvalidRequest(Vec<Violation>),

    /// A stage call exceeded its allotted duration
    #[error("{stage} stage timed out after {}s", .limit.as_secs_f64())]
    StageTimeout { stage: Stage, limit: Duration },

    /// A stage could not be reached or answered with a failure status
    #[error("{stage} stage unavailable at {endpoint}: {failure}")]
    StageUnavailable {
        stage: Stage,
        endpoint: String,
        failure: TransportFailure,
    },

    /// A stage answered successfully but its body broke the output contract
    #[error("{stage} stage returned an invalid response: {}", join_violations(.violations))]
    StageContractViolation {
        stage: Stage,
        violations: Vec<Violation>,
    },

    /// The caller aborted the run
    #[error("Analysis cancelled{}", stage_suffix(.stage))]
    Cancelled { stage: Option<Stage> },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn stage_suffix(stage: &Option<Stage>) -> String {
    stage
        .map(|stage| format!(" during {} stage", stage))
        .unwrap_or_default()
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::InvalidRequest(_) => FailureKind::InvalidRequest,
            Error::StageTimeout { .. } => FailureKind::StageTimeout,
            Error::StageUnavailable { .. } => FailureKind::StageUnavailable,
            Error::StageContractViolation { .. } => FailureKind::StageContractViolation,
            Error::Cancelled { .. } => FailureKind::Cancelled,
            Error::Config(_) => FailureKind::Config,
        }
    }

    /// The stage the failure belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::StageTimeout { stage, .. }
            | Error::StageUnavailable { stage, .. }
            | Error::StageContractViolation { stage, .. } => Some(*stage),
            Error::Cancelled { stage } => *stage,
            Error::InvalidRequest(_) | Error::Config(_) => None,
        }
    }

    /// Whether resubmitting the same request may succeed.
    ///
    /// Timeouts and unreachable services are transient. Contract violations
    /// point at a version mismatch between the pipeline and a stage service,
    /// and invalid requests will fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StageTimeout { .. } | Error::StageUnavailable { .. } | Error::Cancelled { .. }
        )
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Error::InvalidRequest(violations)
            | Error::StageContractViolation { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Paths of every field reported as missing.
    pub fn missing_fields(&self) -> Vec<&str> {
        self.violations()
            .iter()
            .filter(|v| matches!(v.kind, ViolationKind::Missing))
            .map(|v| v.path.as_str())
            .collect()
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) => 400,
            Error::Cancelled { .. } => 499,
            Error::StageContractViolation { .. } => 502,
            Error::StageUnavailable { .. } => 503,
            Error::StageTimeout { .. } => 504,
            Error::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failures_carry_stage() {
        let err = Error::StageTimeout {
            stage: Stage::Vision,
            limit: Duration::from_secs(90),
        };
        assert_eq!(err.stage(), Some(Stage::Vision));
        assert_eq!(err.kind(), FailureKind::StageTimeout);
        assert_eq!(err.status_code(), 504);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "vision stage timed out after 90s");
    }

    #[test]
    fn test_contract_violation_is_not_retryable() {
        let err = Error::StageContractViolation {
            stage: Stage::Interpretation,
            violations: vec![
                Violation::missing("hormonal_cues"),
                Violation::wrong_type("usable", "boolean"),
            ],
        };
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.missing_fields(), vec!["hormonal_cues"]);
        assert!(err.to_string().contains("hormonal_cues: missing"));
    }

    #[test]
    fn test_invalid_request_has_no_stage() {
        let err = Error::InvalidRequest(vec![Violation::missing("frontal")]);
        assert_eq!(err.stage(), None);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Invalid request: frontal: missing");
    }

    #[test]
    fn test_transport_failure_display() {
        let failure = TransportFailure::Status {
            status: 500,
            body: "model crashed".to_string(),
        };
        assert_eq!(failure.to_string(), "HTTP 500: model crashed");

        let err = Error::StageUnavailable {
            stage: Stage::Interpretation,
            endpoint: "http://localhost:8002/interpret".to_string(),
            failure,
        };
        assert_eq!(
            err.to_string(),
            "interpretation stage unavailable at http://localhost:8002/interpret: HTTP 500: model crashed"
        );
    }

    #[test]
    fn test_cancelled_message() {
        let err = Error::Cancelled {
            stage: Some(Stage::Vision),
        };
        assert_eq!(err.to_string(), "Analysis cancelled during vision stage");
        assert_eq!(Error::Cancelled { stage: None }.to_string(), "Analysis cancelled");
    }
}
