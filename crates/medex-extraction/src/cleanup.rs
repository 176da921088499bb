use medex_core::{ObjectStore, OutputArtifact};

/// Outcome of a cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: Vec<String>,
}

/// Deletes every recorded artifact. Failures are logged and counted, never
/// returned: the extracted text is already held in memory.
pub async fn cleanup(store: &dyn ObjectStore, artifacts: &[OutputArtifact]) -> CleanupReport {
    let mut report = CleanupReport::default();

    for artifact in artifacts {
        match store.delete(artifact).await {
            Ok(()) => {
                report.deleted += 1;
                tracing::info!(artifact = %artifact.name, bucket = %artifact.bucket, "Output file deleted");
            }
            Err(e) => {
                tracing::warn!(artifact = %artifact.uri(), error = %e, "Failed to delete output file");
                report.failed.push(artifact.uri());
            }
        }
    }

    report
}
