use std::sync::Arc;

use tokio::sync::RwLock;

use medex_core::api_types::{ExtractionRunState, ExtractionRunStatus};
use medex_core::{AppConfig, ExtractionPipeline, ObjectStore, TransformService};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn ObjectStore>,
    pub pipeline: Arc<dyn ExtractionPipeline>,
    pub analysis: Arc<dyn TransformService>,
    pub runs: Arc<RwLock<Vec<ExtractionRunStatus>>>,
}

/// Runs kept in memory. Only finished runs are dropped, oldest first.
pub const MAX_RUNS: usize = 50;

impl AppState {
    pub async fn record_run(&self, run: ExtractionRunStatus) {
        let mut runs = self.runs.write().await;
        runs.push(run);
        trim_runs(&mut runs, MAX_RUNS);
    }
}

fn trim_runs(runs: &mut Vec<ExtractionRunStatus>, max: usize) {
    let mut excess = runs.len().saturating_sub(max);
    runs.retain(|run| {
        if excess > 0 && run.status != ExtractionRunState::Running {
            excess -= 1;
            false
        } else {
            true
        }
    });
}
