//! In-memory collaborators for exercising the extraction pipeline end to end.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use medex_core::error::{MedexError, Result};
use medex_core::ocr::{
    BatchOcrService, BatchProcessMetadata, BatchProcessRequest, IndividualProcessStatus, JobHandle,
    JobSnapshot, JobState,
};
use medex_core::{ObjectStore, OutputArtifact};

pub const BUCKET: &str = "records";

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Uploaded(String),
    Listed(String),
    Downloaded(String),
    Deleted(String),
}

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Object store that records every call with a sequence number.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    events: Mutex<Vec<(u64, StoreEvent)>>,
    clock: AtomicU64,
    fail_deletes: bool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delete fails, after being recorded.
    pub fn with_failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn put(&self, bucket: &str, name: &str, content_type: Option<&str>, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), name.to_string()),
            StoredObject {
                content_type: content_type.map(str::to_string),
                bytes,
            },
        );
    }

    pub fn put_json(&self, name: &str, document: &Value) {
        self.put(BUCKET, name, Some("application/json"), document.to_string().into_bytes());
    }

    pub fn contains(&self, bucket: &str, name: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), name.to_string()))
    }

    fn record(&self, event: StoreEvent) {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push((tick, event));
    }

    pub fn events(&self) -> Vec<(u64, StoreEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|(_, e)| match e {
                StoreEvent::Downloaded(uri) => Some(uri),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|(_, e)| match e {
                StoreEvent::Deleted(uri) => Some(uri),
                _ => None,
            })
            .collect()
    }

    /// Tick at which `wanted` was first recorded.
    pub fn tick_of(&self, wanted: &StoreEvent) -> Option<u64> {
        self.events()
            .into_iter()
            .find(|(_, e)| e == wanted)
            .map(|(tick, _)| tick)
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.put(BUCKET, key, Some(content_type), bytes);
        let uri = format!("gs://{BUCKET}/{key}");
        self.record(StoreEvent::Uploaded(uri.clone()));
        Ok(uri)
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<OutputArtifact>> {
        self.record(StoreEvent::Listed(format!("gs://{bucket}/{prefix}")));
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|((b, name), _)| b == bucket && name.starts_with(prefix))
            .map(|((b, name), object)| OutputArtifact {
                bucket: b.clone(),
                name: name.clone(),
                content_type: object.content_type.clone(),
                size: Some(object.bytes.len() as u64),
            })
            .collect())
    }

    async fn download(&self, artifact: &OutputArtifact) -> Result<Vec<u8>> {
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(&(artifact.bucket.clone(), artifact.name.clone()))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| MedexError::NotFound(artifact.uri()))?;
        self.record(StoreEvent::Downloaded(artifact.uri()));
        Ok(bytes)
    }

    async fn delete(&self, artifact: &OutputArtifact) -> Result<()> {
        self.record(StoreEvent::Deleted(artifact.uri()));
        if self.fail_deletes {
            return Err(MedexError::Api {
                service: "storage".into(),
                status: 403,
                message: "delete not permitted".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(artifact.bucket.clone(), artifact.name.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Batch OCR service
// ---------------------------------------------------------------------------

/// How a job for one input document behaves.
#[derive(Debug, Clone)]
pub struct JobScript {
    /// Polls answered with RUNNING before the job finishes.
    pub running_polls: usize,
    /// Polls answered with a 503 before anything else.
    pub transient_errors: usize,
    pub final_state: JobState,
    pub message: String,
    pub destinations: Vec<String>,
}

impl JobScript {
    pub fn succeeded(destinations: &[&str]) -> Self {
        Self {
            running_polls: 1,
            transient_errors: 0,
            final_state: JobState::Succeeded,
            message: String::new(),
            destinations: destinations.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            running_polls: 0,
            transient_errors: 0,
            final_state: JobState::Failed,
            message: message.to_string(),
            destinations: Vec::new(),
        }
    }

    pub fn with_transient_errors(mut self, count: usize) -> Self {
        self.transient_errors = count;
        self
    }
}

struct JobProgress {
    script: JobScript,
    polls: usize,
    errors_sent: usize,
}

/// OCR service driven by per-input [`JobScript`]s.
#[derive(Default)]
pub struct FakeOcr {
    scripts: HashMap<String, JobScript>,
    jobs: Mutex<HashMap<JobHandle, JobProgress>>,
    submitted: Mutex<Vec<BatchProcessRequest>>,
}

impl FakeOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, input_uri: &str, script: JobScript) -> Self {
        self.scripts.insert(input_uri.to_string(), script);
        self
    }

    pub fn submitted(&self) -> Vec<BatchProcessRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchOcrService for FakeOcr {
    async fn submit(&self, request: &BatchProcessRequest) -> Result<JobHandle> {
        let script = self
            .scripts
            .get(&request.input.uri)
            .cloned()
            .ok_or_else(|| MedexError::NotFound(request.input.uri.clone()))?;

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        let handle = JobHandle(format!("projects/1/locations/us/operations/{}", submitted.len()));

        self.jobs.lock().unwrap().insert(
            handle.clone(),
            JobProgress {
                script,
                polls: 0,
                errors_sent: 0,
            },
        );
        Ok(handle)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(handle)
            .ok_or_else(|| MedexError::NotFound(handle.to_string()))?;

        if job.errors_sent < job.script.transient_errors {
            job.errors_sent += 1;
            return Err(MedexError::Api {
                service: "documentai".into(),
                status: 503,
                message: "service unavailable".into(),
            });
        }

        job.polls += 1;
        if job.polls <= job.script.running_polls {
            return Ok(JobSnapshot {
                done: false,
                metadata: BatchProcessMetadata {
                    state: JobState::Running,
                    ..Default::default()
                },
            });
        }

        Ok(JobSnapshot {
            done: true,
            metadata: BatchProcessMetadata {
                state: job.script.final_state,
                state_message: job.script.message.clone(),
                individual_process_statuses: job
                    .script
                    .destinations
                    .iter()
                    .map(|d| IndividualProcessStatus {
                        input_gcs_source: String::new(),
                        output_gcs_destination: d.clone(),
                    })
                    .collect(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Provider output documents
// ---------------------------------------------------------------------------

fn regions(texts: &[&str], cursor: &mut usize) -> Vec<Value> {
    texts
        .iter()
        .map(|t| {
            let start = *cursor;
            *cursor += t.chars().count();
            json!({"layout": {"textAnchor": {"textSegments": [
                {"startIndex": start.to_string(), "endIndex": cursor.to_string()}
            ]}}})
        })
        .collect()
}

/// A provider output document whose pages hold the given line texts. Each
/// page's single block and paragraph span all of that page's lines.
pub fn document_with_lines(pages: &[(i32, &[&str])]) -> Value {
    let mut text = String::new();
    let mut cursor = 0usize;
    let mut json_pages = Vec::new();

    for (page_number, lines) in pages {
        let page_start = cursor;
        let line_regions = regions(lines, &mut cursor);
        for line in *lines {
            text.push_str(line);
        }

        let mut page = json!({"pageNumber": page_number, "lines": line_regions});
        if cursor > page_start {
            let span = json!([{"layout": {"textAnchor": {"textSegments": [
                {"startIndex": page_start.to_string(), "endIndex": cursor.to_string()}
            ]}}}]);
            page["blocks"] = span.clone();
            page["paragraphs"] = span;
        }
        json_pages.push(page);
    }

    json!({"text": text, "pages": json_pages, "mimeType": "application/pdf"})
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Records the level and message of every event.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.events
                .lock()
                .unwrap()
                .push((*event.metadata().level(), message));
        }
    }
}

impl LogCapture {
    /// Captures events on the current thread until the guard drops.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    /// Number of events at `level` whose message is exactly `message`.
    pub fn count(&self, level: Level, message: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, m)| *l == level && m == message)
            .count()
    }
}
