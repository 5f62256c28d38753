//! Deadline and cancellation race shared by external collaborators.

use std::future::Future;
use std::time::Duration;

use huewatch_pipeline::AnalysisError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    /// Wrap any displayable error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Await `work`, giving up after `deadline` or when `cancel` fires.
///
/// Cancellation wins over a simultaneously ready result.
///
/// # Errors
///
/// - [`AnalysisError::Cancelled`] if `cancel` fired first.
/// - [`AnalysisError::ExternalServiceTimeout`] if `deadline` elapsed.
/// - [`AnalysisError::ExternalServiceFailure`] if `work` failed.
pub async fn race<T, F>(
    service: &str,
    deadline: Duration,
    cancel: &CancellationToken,
    work: F,
) -> Result<T, AnalysisError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AnalysisError::Cancelled),
        outcome = tokio::time::timeout(deadline, work) => match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(service, error = %err, "collaborator failed");
                Err(AnalysisError::ExternalServiceFailure {
                    service: service.to_owned(),
                    message: err.0,
                })
            }
            Err(_elapsed) => {
                let deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
                warn!(service, deadline_ms, "collaborator timed out");
                Err(AnalysisError::ExternalServiceTimeout {
                    service: service.to_owned(),
                    deadline_ms,
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_work_succeeds() {
        let cancel = CancellationToken::new();
        let result = race("test", Duration::from_secs(1), &cancel, async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_times_out() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> = race("ocr", Duration::from_secs(5), &cancel, async {
            tokio::time::sleep(Duration::from_secs(6)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            result,
            Err(AnalysisError::ExternalServiceTimeout {
                service: "ocr".to_owned(),
                deadline_ms: 5000,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> = race("ocr", Duration::from_secs(5), &cancel, async {
            Err(CollaboratorError::new("engine crashed"))
        })
        .await;
        assert_eq!(
            result,
            Err(AnalysisError::ExternalServiceFailure {
                service: "ocr".to_owned(),
                message: "engine crashed".to_owned(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_preempts() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = race("ocr", Duration::from_secs(5), &cancel, async { Ok(1) }).await;
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }
}
