use std::time::Duration;

use medex_core::error::{MedexError, Result};
use medex_core::ocr::{BatchOcrService, BatchProcessMetadata, JobHandle, JobState};

/// How a wait ended before the final state was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    TimedOut,
    /// A transient error cut the wait short; the job may still finish remotely.
    Abandoned(String),
}

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(400),
            poll_interval: Duration::from_secs(10),
        }
    }
}

async fn poll_until_done(
    ocr: &dyn BatchOcrService,
    handle: &JobHandle,
    poll_interval: Duration,
) -> Result<()> {
    loop {
        let snapshot = ocr.poll(handle).await?;
        if snapshot.done || snapshot.metadata.state.is_terminal() {
            return Ok(());
        }
        tracing::debug!(operation = %handle, state = ?snapshot.metadata.state, "Job still running");
        tokio::time::sleep(poll_interval).await;
    }
}

/// Suspends until the job completes, a transient error occurs, or the
/// timeout elapses. Transient errors are logged, never returned. Timing out
/// does not cancel the remote job.
pub async fn wait_for_completion(
    ocr: &dyn BatchOcrService,
    handle: &JobHandle,
    options: WaitOptions,
) -> Result<WaitOutcome> {
    tracing::info!(operation = %handle, timeout_secs = options.timeout.as_secs(), "Waiting for operation to complete");

    match tokio::time::timeout(options.timeout, poll_until_done(ocr, handle, options.poll_interval)).await {
        Ok(Ok(())) => Ok(WaitOutcome::Completed),
        Ok(Err(e)) if e.is_transient() => {
            let error = MedexError::JobWaitTransient(e.to_string());
            tracing::warn!(operation = %handle, error = %error, "Wait abandoned, checking job state");
            Ok(WaitOutcome::Abandoned(e.to_string()))
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            tracing::warn!(
                operation = %handle,
                timeout_secs = options.timeout.as_secs(),
                "Timed out waiting for operation; remote job keeps running"
            );
            Ok(WaitOutcome::TimedOut)
        }
    }
}

/// Waits, then reads the job state explicitly. Only that final read decides
/// the outcome: anything but success fails with the provider's message.
pub async fn await_job(
    ocr: &dyn BatchOcrService,
    handle: &JobHandle,
    options: WaitOptions,
) -> Result<BatchProcessMetadata> {
    let outcome = wait_for_completion(ocr, handle, options).await?;
    let snapshot = ocr.poll(handle).await?;
    let metadata = snapshot.metadata;

    if metadata.state != JobState::Succeeded {
        tracing::error!(
            operation = %handle,
            state = ?metadata.state,
            outcome = ?outcome,
            message = %metadata.state_message,
            "Batch process did not succeed"
        );
        return Err(MedexError::BatchProcessingFailed(metadata.state_message));
    }

    tracing::info!(
        operation = %handle,
        outputs = metadata.individual_process_statuses.len(),
        "Batch process succeeded"
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use medex_core::ocr::{BatchProcessRequest, JobSnapshot};

    use super::*;

    /// Replays scripted poll results; the last entry repeats forever.
    struct Scripted {
        polls: Mutex<VecDeque<Result<JobSnapshot>>>,
        last: JobSnapshot,
    }

    impl Scripted {
        fn new(polls: Vec<Result<JobSnapshot>>, last: JobSnapshot) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                last,
            }
        }
    }

    #[async_trait]
    impl BatchOcrService for Scripted {
        async fn submit(&self, _request: &BatchProcessRequest) -> Result<JobHandle> {
            Ok(JobHandle("operations/1".into()))
        }

        async fn poll(&self, _handle: &JobHandle) -> Result<JobSnapshot> {
            let next = self.polls.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.last.clone()))
        }
    }

    fn snapshot(done: bool, state: JobState, message: &str) -> JobSnapshot {
        JobSnapshot {
            done,
            metadata: BatchProcessMetadata {
                state,
                state_message: message.into(),
                individual_process_statuses: vec![],
            },
        }
    }

    fn fast() -> WaitOptions {
        WaitOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn handle() -> JobHandle {
        JobHandle("operations/1".into())
    }

    #[tokio::test]
    async fn succeeds_after_running_polls() {
        let ocr = Scripted::new(
            vec![Ok(snapshot(false, JobState::Running, "")), Ok(snapshot(false, JobState::Running, ""))],
            snapshot(true, JobState::Succeeded, "done"),
        );
        let metadata = await_job(&ocr, &handle(), fast()).await.unwrap();
        assert_eq!(metadata.state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn failed_state_carries_provider_message() {
        let ocr = Scripted::new(vec![], snapshot(true, JobState::Failed, "quota exceeded"));
        let err = await_job(&ocr, &handle(), fast()).await.unwrap_err();
        match err {
            MedexError::BatchProcessingFailed(msg) => assert_eq!(msg, "quota exceeded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn transient_error_is_tolerated_and_state_rechecked() {
        let ocr = Scripted::new(
            vec![Err(MedexError::Api {
                service: "documentai".into(),
                status: 503,
                message: "unavailable".into(),
            })],
            snapshot(true, JobState::Succeeded, ""),
        );

        let outcome = wait_for_completion(&ocr, &handle(), fast()).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::Abandoned(_)));
    }

    #[tokio::test]
    async fn transient_error_then_success_is_not_fatal() {
        let ocr = Scripted::new(
            vec![Err(MedexError::JobWaitTransient("retry deadline".into()))],
            snapshot(true, JobState::Succeeded, ""),
        );
        assert!(await_job(&ocr, &handle(), fast()).await.is_ok());
    }

    #[tokio::test]
    async fn permanent_error_propagates() {
        let ocr = Scripted::new(
            vec![Err(MedexError::Api {
                service: "documentai".into(),
                status: 403,
                message: "permission denied".into(),
            })],
            snapshot(true, JobState::Succeeded, ""),
        );
        let err = await_job(&ocr, &handle(), fast()).await.unwrap_err();
        assert!(matches!(err, MedexError::Api { status: 403, .. }));
    }

    #[tokio::test]
    async fn timeout_then_still_running_fails() {
        let ocr = Scripted::new(vec![], snapshot(false, JobState::Running, "still running"));
        let options = WaitOptions {
            timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
        };

        let outcome = wait_for_completion(&ocr, &handle(), options).await.unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);

        let err = await_job(&ocr, &handle(), options).await.unwrap_err();
        assert!(matches!(err, MedexError::BatchProcessingFailed(ref m) if m == "still running"));
    }
}
