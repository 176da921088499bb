use std::sync::Arc;
use std::time::Duration;

use medex_core::error::MedexError;
use medex_core::{ExtractionPipeline, InputDocument, PageText};
use medex_extraction::{BatchExtractionPipeline, PipelineOptions, SubmitTarget, WaitOptions};
use medex_tests::{document_with_lines, FakeOcr, FakeStore, JobScript, LogCapture, StoreEvent, BUCKET};
use tracing::Level;

fn options() -> PipelineOptions {
    PipelineOptions {
        target: SubmitTarget {
            project_id: "demo".into(),
            location: "us".into(),
            processor_id: "proc-1".into(),
            output_bucket: BUCKET.into(),
            results_prefix: "results".into(),
            field_mask: None,
        },
        wait: WaitOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        },
        parallel: false,
        persist_dir: None,
    }
}

fn pipeline(ocr: &Arc<FakeOcr>, store: &Arc<FakeStore>, options: PipelineOptions) -> BatchExtractionPipeline {
    BatchExtractionPipeline::new(ocr.clone(), store.clone(), options)
}

fn page(page: i32, data: &[&str]) -> PageText {
    PageText {
        page,
        data: data.iter().map(|s| s.to_string()).collect(),
    }
}

const CHART: &str = "gs://records/uploads/chart.pdf";
const INTAKE: &str = "gs://records/uploads/intake.pdf";

// ---------------------------------------------------------------------------
// Single document
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_page_document_yields_page_tagged_lines() {
    let store = Arc::new(FakeStore::new());
    store.put_json(
        "results/op1/0/chart-0.json",
        &document_with_lines(&[(1, &["Name: Jane Doe\n", "Age: 42\n"]), (2, &[])]),
    );
    let ocr = Arc::new(FakeOcr::new().script(CHART, JobScript::succeeded(&["gs://records/results/op1/0"])));

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .expect("extraction should succeed");

    assert_eq!(
        result.lines,
        vec![page(1, &["Name: Jane Doe\n", "Age: 42\n"]), page(2, &[])]
    );
    assert_eq!(result.paragraphs, vec![page(1, &["Name: Jane Doe\nAge: 42\n"]), page(2, &[])]);
    assert_eq!(result.blocks.len(), 2);

    // Outputs are cleaned up once parsed.
    assert_eq!(store.deleted(), vec!["gs://records/results/op1/0/chart-0.json"]);
    assert!(!store.contains(BUCKET, "results/op1/0/chart-0.json"));
}

#[tokio::test]
async fn one_job_per_document_with_distinct_output_prefixes() {
    let store = Arc::new(FakeStore::new());
    let ocr = Arc::new(
        FakeOcr::new()
            .script(CHART, JobScript::succeeded(&[]))
            .script(INTAKE, JobScript::succeeded(&[])),
    );

    pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART), InputDocument::pdf(INTAKE)])
        .await
        .unwrap();

    let submitted = ocr.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0].input.uri, CHART);
    assert_eq!(submitted[1].input.uri, INTAKE);
    assert_eq!(submitted[0].processor_path, "projects/demo/locations/us/processors/proc-1");
    assert!(submitted[0].output_uri_prefix.starts_with("gs://records/results/"));
    assert_ne!(submitted[0].output_uri_prefix, submitted[1].output_uri_prefix);
}

// ---------------------------------------------------------------------------
// Job failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_job_raises_batch_processing_failed() {
    let store = Arc::new(FakeStore::new());
    store.put_json("results/op1/0/chart-0.json", &document_with_lines(&[(1, &["x"])]));
    let ocr = Arc::new(FakeOcr::new().script(CHART, JobScript::failed("quota exceeded")));

    let err = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .unwrap_err();

    match err {
        MedexError::BatchProcessingFailed(message) => assert_eq!(message, "quota exceeded"),
        other => panic!("unexpected error: {other}"),
    }
    // Nothing fetched, nothing cleaned up.
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn later_failure_aborts_batch_without_cleanup() {
    let store = Arc::new(FakeStore::new());
    store.put_json("results/op1/0/chart-0.json", &document_with_lines(&[(1, &["ok"])]));
    let ocr = Arc::new(
        FakeOcr::new()
            .script(CHART, JobScript::succeeded(&["gs://records/results/op1/0"]))
            .script(INTAKE, JobScript::failed("document is corrupt")),
    );

    let err = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART), InputDocument::pdf(INTAKE)])
        .await
        .unwrap_err();

    assert!(matches!(err, MedexError::BatchProcessingFailed(ref m) if m == "document is corrupt"));
    assert_eq!(store.downloaded().len(), 1);
    assert!(store.deleted().is_empty());
    assert!(store.contains(BUCKET, "results/op1/0/chart-0.json"));
}

#[tokio::test]
async fn transient_wait_error_then_success_continues() {
    let (logs, _guard) = LogCapture::install();
    let store = Arc::new(FakeStore::new());
    store.put_json("results/op1/0/chart-0.json", &document_with_lines(&[(1, &["line"])]));
    // The wait gives up on the 503; the job has finished by the state check.
    let script = JobScript {
        running_polls: 0,
        ..JobScript::succeeded(&["gs://records/results/op1/0"]).with_transient_errors(1)
    };
    let ocr = Arc::new(FakeOcr::new().script(CHART, script));

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .expect("transient wait errors are not fatal");

    assert_eq!(result.lines, vec![page(1, &["line"])]);
    assert_eq!(logs.count(Level::WARN, "Wait abandoned, checking job state"), 1);
}

// ---------------------------------------------------------------------------
// Output locating and filtering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_json_artifact_is_deleted_but_not_parsed() {
    let (logs, _guard) = LogCapture::install();
    let store = Arc::new(FakeStore::new());
    store.put_json("results/op1/0/chart-0.json", &document_with_lines(&[(1, &["kept"])]));
    store.put(BUCKET, "results/op1/0/readme.txt", Some("text/plain"), b"not a document".to_vec());
    let ocr = Arc::new(FakeOcr::new().script(CHART, JobScript::succeeded(&["gs://records/results/op1/0"])));

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .unwrap();

    assert_eq!(result.lines, vec![page(1, &["kept"])]);
    assert_eq!(store.downloaded(), vec!["gs://records/results/op1/0/chart-0.json"]);

    let mut deleted = store.deleted();
    deleted.sort();
    assert_eq!(
        deleted,
        vec![
            "gs://records/results/op1/0/chart-0.json",
            "gs://records/results/op1/0/readme.txt",
        ]
    );
    assert_eq!(logs.count(Level::WARN, "Skipping non-supported file"), 1);
}

#[tokio::test]
async fn unparseable_destination_is_skipped() {
    let (logs, _guard) = LogCapture::install();
    let store = Arc::new(FakeStore::new());
    store.put_json("results/op1/1/chart-0.json", &document_with_lines(&[(1, &["good"])]));
    let ocr = Arc::new(FakeOcr::new().script(
        CHART,
        JobScript::succeeded(&["not-a-storage-uri", "gs://records/results/op1/1"]),
    ));

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .unwrap();

    assert_eq!(result.lines, vec![page(1, &["good"])]);
    let listed: Vec<StoreEvent> = store
        .events()
        .into_iter()
        .map(|(_, e)| e)
        .filter(|e| matches!(e, StoreEvent::Listed(_)))
        .collect();
    assert_eq!(listed, vec![StoreEvent::Listed("gs://records/results/op1/1".into())]);
    assert_eq!(logs.count(Level::WARN, "Skipping output entry"), 1);
}

#[tokio::test]
async fn destination_with_reserved_characters_stays_in_its_prefix() {
    let store = Arc::new(FakeStore::new());
    store.put_json("results/a#b/0/chart-0.json", &document_with_lines(&[(1, &["mine"])]));
    store.put_json("results/a-other/0/intake-0.json", &document_with_lines(&[(1, &["theirs"])]));
    let ocr = Arc::new(FakeOcr::new().script(CHART, JobScript::succeeded(&["gs://records/results/a#b/0"])));

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .unwrap();

    assert_eq!(result.lines, vec![page(1, &["mine"])]);
    assert_eq!(store.deleted(), vec!["gs://records/results/a#b/0/chart-0.json"]);
    assert!(store.contains(BUCKET, "results/a-other/0/intake-0.json"));
}

#[tokio::test]
async fn sharded_outputs_keep_duplicate_page_numbers() {
    let store = Arc::new(FakeStore::new());
    store.put_json("results/op1/0/chart-0.json", &document_with_lines(&[(1, &["a"]), (2, &["b"])]));
    store.put_json("results/op1/0/chart-1.json", &document_with_lines(&[(1, &["c"])]));
    let ocr = Arc::new(FakeOcr::new().script(CHART, JobScript::succeeded(&["gs://records/results/op1/0"])));

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .unwrap();

    assert_eq!(
        result.lines,
        vec![page(1, &["a"]), page(2, &["b"]), page(1, &["c"])]
    );
}

// ---------------------------------------------------------------------------
// Aggregation and cleanup ordering
// ---------------------------------------------------------------------------

fn two_document_fixture() -> (Arc<FakeOcr>, Arc<FakeStore>) {
    let store = Arc::new(FakeStore::new());
    store.put_json(
        "results/op1/0/chart-0.json",
        &document_with_lines(&[(1, &["c1", "c2"]), (2, &["c3"])]),
    );
    store.put(BUCKET, "results/op1/0/manifest.txt", Some("text/plain"), b"-".to_vec());
    store.put_json("results/op2/0/intake-0.json", &document_with_lines(&[(1, &["i1"])]));
    store.put_json("results/op2/0/intake-1.json", &document_with_lines(&[(2, &["i2", "i3"])]));

    let ocr = Arc::new(
        FakeOcr::new()
            .script(CHART, JobScript::succeeded(&["gs://records/results/op1/0"]))
            .script(INTAKE, JobScript::succeeded(&["gs://records/results/op2/0"])),
    );
    (ocr, store)
}

#[tokio::test]
async fn aggregates_documents_in_submission_order() {
    let (ocr, store) = two_document_fixture();

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART), InputDocument::pdf(INTAKE)])
        .await
        .unwrap();

    assert_eq!(
        result.lines,
        vec![
            page(1, &["c1", "c2"]),
            page(2, &["c3"]),
            page(1, &["i1"]),
            page(2, &["i2", "i3"]),
        ]
    );
    assert_eq!(result.blocks.len(), 4);
    assert_eq!(result.paragraphs.len(), 4);
}

#[tokio::test]
async fn artifacts_deleted_only_after_every_download() {
    let (ocr, store) = two_document_fixture();

    pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART), InputDocument::pdf(INTAKE)])
        .await
        .unwrap();

    let downloaded = store.downloaded();
    let deleted = store.deleted();
    assert_eq!(downloaded.len(), 3);
    assert_eq!(deleted.len(), 4);

    let last_download = downloaded
        .iter()
        .filter_map(|uri| store.tick_of(&StoreEvent::Downloaded(uri.clone())))
        .max()
        .unwrap();
    for uri in &deleted {
        let deleted_at = store.tick_of(&StoreEvent::Deleted(uri.clone())).unwrap();
        assert!(deleted_at > last_download, "{uri} deleted before parsing finished");
        if let Some(parsed_at) = store.tick_of(&StoreEvent::Downloaded(uri.clone())) {
            assert!(deleted_at > parsed_at);
        }
    }
}

#[tokio::test]
async fn parallel_mode_preserves_submission_order() {
    let (ocr, store) = two_document_fixture();
    let mut options = options();
    options.parallel = true;

    let result = pipeline(&ocr, &store, options)
        .extract_batch(&[InputDocument::pdf(CHART), InputDocument::pdf(INTAKE)])
        .await
        .unwrap();

    let pages: Vec<(i32, usize)> = result.lines.iter().map(|p| (p.page, p.data.len())).collect();
    assert_eq!(pages, vec![(1, 2), (2, 1), (1, 1), (2, 2)]);
    assert_eq!(store.deleted().len(), 4);
}

#[tokio::test]
async fn parallel_mode_fails_whole_batch() {
    let store = Arc::new(FakeStore::new());
    let ocr = Arc::new(
        FakeOcr::new()
            .script(CHART, JobScript::succeeded(&[]))
            .script(INTAKE, JobScript::failed("quota exceeded")),
    );
    let mut options = options();
    options.parallel = true;

    let err = pipeline(&ocr, &store, options)
        .extract_batch(&[InputDocument::pdf(CHART), InputDocument::pdf(INTAKE)])
        .await
        .unwrap_err();
    assert!(matches!(err, MedexError::BatchProcessingFailed(_)));
}

#[tokio::test]
async fn failed_deletes_do_not_fail_extraction() {
    let (logs, _guard) = LogCapture::install();
    let store = Arc::new(FakeStore::with_failing_deletes());
    store.put_json("results/op1/0/chart-0.json", &document_with_lines(&[(1, &["still here"])]));
    let ocr = Arc::new(FakeOcr::new().script(CHART, JobScript::succeeded(&["gs://records/results/op1/0"])));

    let result = pipeline(&ocr, &store, options())
        .extract_batch(&[InputDocument::pdf(CHART)])
        .await
        .expect("cleanup failures are advisory");

    assert_eq!(result.lines, vec![page(1, &["still here"])]);
    assert_eq!(store.deleted().len(), 1);
    assert!(store.contains(BUCKET, "results/op1/0/chart-0.json"));
    assert_eq!(logs.count(Level::WARN, "Failed to delete output file"), 1);
}

#[tokio::test]
async fn empty_batch_returns_empty_result() {
    let store = Arc::new(FakeStore::new());
    let ocr = Arc::new(FakeOcr::new());

    let result = pipeline(&ocr, &store, options()).extract_batch(&[]).await.unwrap();
    assert!(result.is_empty());
    assert!(store.events().is_empty());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persists_collections_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let (ocr, store) = two_document_fixture();
    let mut options = options();
    options.persist_dir = Some(dir.path().to_path_buf());

    let result = pipeline(&ocr, &store, options)
        .extract_batch(&[InputDocument::pdf(CHART), InputDocument::pdf(INTAKE)])
        .await
        .unwrap();

    let saved: Vec<PageText> = serde_json::from_slice(
        &std::fs::read(dir.path().join("extracted_paragraphs.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved, result.paragraphs);
    assert!(dir.path().join("extracted_blocks.json").exists());
    assert!(dir.path().join("extracted_lines.json").exists());
}
