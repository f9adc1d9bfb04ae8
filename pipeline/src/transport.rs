//! HTTP plumbing shared by both stage clients.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::TransportFailure;
use crate::models::Stage;
use crate::schema::Violation;
use crate::{Error, Result};

/// Error bodies are echoed into errors and logs; keep them short.
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("dermaging-pipeline/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Run a stage call under its time budget. The call future is dropped on
/// expiry, which aborts the underlying connection.
pub(crate) async fn with_timeout<T, F>(stage: Stage, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(stage = %stage, limit_ms = limit.as_millis() as u64, "Stage call timed out");
            Err(Error::StageTimeout { stage, limit })
        }
    }
}

pub(crate) fn unavailable(stage: Stage, endpoint: &str, failure: impl Into<TransportFailure>) -> Error {
    Error::StageUnavailable {
        stage,
        endpoint: endpoint.to_string(),
        failure: failure.into(),
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

/// Read a stage response as JSON.
///
/// Non-2xx statuses are transport failures; a 2xx body that is not JSON is a
/// contract violation.
pub(crate) async fn read_json(stage: Stage, endpoint: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(unavailable(
            stage,
            endpoint,
            TransportFailure::Status {
                status: status.as_u16(),
                body: truncate(body),
            },
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| unavailable(stage, endpoint, e))?;

    serde_json::from_slice(&bytes).map_err(|e| Error::StageContractViolation {
        stage,
        violations: vec![Violation::invalid("", format!("body is not valid JSON: {}", e))],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(400);
        let cut = truncate(body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_BODY + 3);

        assert_eq!(truncate("short".to_string()), "short");
    }

    #[tokio::test]
    async fn test_with_timeout_maps_expiry() {
        let err = with_timeout(Stage::Vision, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::StageTimeout { stage: Stage::Vision, .. }));
    }
}
