//! Transfer tests: chunked upload, update and download through the client.

use crate::{init_tracing, with_timeout, TEST_TIMEOUT};
use baas_sdk::prelude::*;
use baas_sdk::testing::{MockHttpExecutor, MockResponse, RecordingCallbacks};
use baas_sdk::{http::Method, MIN_BUFFER_SIZE};
use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn client(executor: &MockHttpExecutor) -> BaasClient {
    BaasClient::builder()
        .api_url("https://api.example.com")
        .organization("org")
        .application("app")
        .http_executor(Arc::new(executor.clone()))
        .token_provider(Arc::new(StaticToken("secret".to_string())))
        .build()
        .expect("client")
}

fn write_source(dir: &tempfile::TempDir, name: &str, len: usize) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

#[tokio::test]
async fn test_upload_streams_file_in_chunks() {
    init_tracing();
    with_timeout(TEST_TIMEOUT, "test_upload_streams_file_in_chunks", async {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(&dir, "report.bin", 10_000);

        let executor = MockHttpExecutor::new();
        executor.respond(MockResponse::json(
            200,
            &json!({"entities": [{"uuid": "file-1"}]}),
        ));
        let client = client(&executor);

        let (callbacks, recorded) = RecordingCallbacks::create();
        let handle = client
            .transfers()
            .upload(UploadRequest::new(&source, "docs/2024"), callbacks)
            .unwrap();

        let response = recorded.outcome().await.unwrap();
        assert_eq!(response.entity_uuid(), Some("file-1"));
        assert_eq!(handle.wait().await, TaskStatus::Completed);

        assert_eq!(recorded.transferred(), vec![4096, 8192, 10_000]);
        assert!(recorded
            .progress()
            .iter()
            .all(|p| p.total_bytes() == Some(10_000)));
        assert_eq!(recorded.terminal_count(), 1);

        let request = executor.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            request.url,
            "https://api.example.com/org/app/files/docs/2024/report.bin"
        );
        assert_eq!(request.header_value("authorization"), Some("Bearer secret"));
        assert_eq!(request.header_value("content-length"), Some("10000"));
        assert_eq!(request.body_chunks, vec![4096, 4096, 1808]);
        assert_eq!(request.body.len(), 10_000);
        assert_eq!(request.timeout, None);
    })
    .await;
}

#[tokio::test]
async fn test_upload_server_rejection() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, "a.txt", 10);

    let executor = MockHttpExecutor::new();
    executor.respond(MockResponse::json(
        409,
        &json!({"error": "duplicate", "error_description": "file exists"}),
    ));
    let client = client(&executor);

    let (callbacks, recorded) = RecordingCallbacks::create();
    client
        .transfers()
        .upload(UploadRequest::new(&source, "docs"), callbacks)
        .unwrap();

    match recorded.outcome().await {
        Err(BaasError::Server { status, message }) => {
            assert_eq!(status, Some(409));
            assert_eq!(message, "file exists");
        }
        other => panic!("Expected Server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upload_invalid_arguments_fail_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let executor = MockHttpExecutor::new();
    let client = client(&executor);

    let missing = client.transfers().upload(
        UploadRequest::new(dir.path().join("missing.bin"), "docs"),
        TaskCallbacks::new(),
    );
    assert!(matches!(missing, Err(BaasError::InvalidInput(_))));

    let source = write_source(&dir, "a.bin", 1);
    let no_dest = client
        .transfers()
        .upload(UploadRequest::new(&source, " "), TaskCallbacks::new());
    assert!(matches!(no_dest, Err(BaasError::InvalidInput(_))));

    assert!(executor.requests().is_empty());
}

#[tokio::test]
async fn test_cancel_before_upload_starts() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, "big.bin", 50_000);
    let executor = MockHttpExecutor::new();
    let client = client(&executor);

    let (callbacks, recorded) = RecordingCallbacks::create();
    let handle = client
        .transfers()
        .upload(UploadRequest::new(&source, "docs"), callbacks)
        .unwrap();
    assert!(handle.cancel());

    assert!(matches!(recorded.outcome().await, Err(BaasError::Cancelled)));
    assert_eq!(handle.wait().await, TaskStatus::Cancelled);
    assert!(recorded.progress().is_empty());
    assert!(executor.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_upload() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, "big.bin", 5 * 4096);
    let executor = MockHttpExecutor::new().with_body_delay(Duration::from_millis(100));
    executor.respond(MockResponse::json(200, &json!({"entities": [{"uuid": "f-1"}]})));
    let client = client(&executor);

    let first_progress = Arc::new(Notify::new());
    let cancel_sent = Arc::new(AtomicBool::new(false));
    let after_cancel = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = tokio::sync::oneshot::channel();
    let callbacks = TaskCallbacks::new()
        .on_progress({
            let first_progress = Arc::clone(&first_progress);
            let cancel_sent = Arc::clone(&cancel_sent);
            let after_cancel = Arc::clone(&after_cancel);
            move |_: ProgressSample| {
                if cancel_sent.load(Ordering::SeqCst) {
                    after_cancel.fetch_add(1, Ordering::SeqCst);
                }
                first_progress.notify_one();
            }
        })
        .on_result(|_| panic!("upload should not complete"))
        .on_error(move |e| {
            let _ = tx.send(e);
        });

    let handle = client
        .transfers()
        .upload(UploadRequest::new(&source, "docs"), callbacks)
        .unwrap();

    first_progress.notified().await;
    assert!(handle.cancel());
    cancel_sent.store(true, Ordering::SeqCst);

    let err = rx.await.unwrap();
    assert!(matches!(err, BaasError::Cancelled), "got {:?}", err);
    assert_eq!(handle.wait().await, TaskStatus::Cancelled);
    assert_eq!(after_cancel.load(Ordering::SeqCst), 0);

    // The transport saw the body end early
    let request = executor.last_request().unwrap();
    assert!(request.body.len() < 5 * 4096);
}

#[tokio::test]
async fn test_update_replaces_content() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, "new.bin", 5000);
    let executor = MockHttpExecutor::new();
    executor.respond(MockResponse::json(200, &json!({"entities": [{"uuid": "f-9"}]})));
    let client = client(&executor);

    let (callbacks, recorded) = RecordingCallbacks::create();
    client
        .transfers()
        .update(UpdateRequest::new("f-9", &source).inline(true), callbacks)
        .unwrap();
    let response = recorded.outcome().await.unwrap();
    assert_eq!(response.status, 200);

    let request = executor.last_request().unwrap();
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.url, "https://api.example.com/org/app/files/f-9");
    assert_eq!(request.header_value("content-disposition"), Some("inline"));
    assert_eq!(recorded.transferred(), vec![4096, 5000]);
}

#[tokio::test]
async fn test_download_writes_file_with_progress() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let executor = MockHttpExecutor::new();
    executor.respond(
        MockResponse::new(200)
            .with_header("Content-Length", "9000")
            .with_chunks(vec![
                Bytes::from(vec![7u8; 6000]),
                Bytes::from(vec![8u8; 3000]),
            ]),
    );
    let client = client(&executor);

    let (callbacks, recorded) = RecordingCallbacks::create();
    client
        .transfers()
        .download(
            DownloadRequest::new("docs/My%20Report.pdf", dir.path().join("out")),
            callbacks,
        )
        .unwrap();

    let file = recorded.outcome().await.unwrap();
    assert_eq!(file.bytes, 9000);
    assert_eq!(file.path, dir.path().join("out").join("My Report.pdf"));
    assert_eq!(std::fs::metadata(&file.path).unwrap().len(), 9000);
    assert_eq!(recorded.transferred(), vec![4096, 6000, 9000]);

    let request = executor.last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.timeout, None);
    assert_eq!(
        request.url,
        "https://api.example.com/org/app/files/docs/My%20Report.pdf"
    );
}

#[tokio::test]
async fn test_download_error_status_does_not_write_body() {
    let dir = tempfile::tempdir().unwrap();
    let executor = MockHttpExecutor::new();
    executor.respond(MockResponse::json(404, &json!({"error": "not_found"})));
    let client = client(&executor);

    let (callbacks, recorded) = RecordingCallbacks::create();
    client
        .transfers()
        .download(DownloadRequest::new("docs/x.bin", dir.path()), callbacks)
        .unwrap();

    let err = recorded.outcome().await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!dir.path().join("x.bin").exists());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_download_keeps_partial_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let executor = MockHttpExecutor::new().with_chunk_delay(Duration::from_millis(100));
    executor.respond(
        MockResponse::new(200)
            .with_header("Content-Length", "15000")
            .with_chunks(vec![
                Bytes::from(vec![1u8; 5000]),
                Bytes::from(vec![2u8; 5000]),
                Bytes::from(vec![3u8; 5000]),
            ]),
    );
    let client = client(&executor);

    let first_progress = Arc::new(Notify::new());
    let samples = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let (tx, rx) = tokio::sync::oneshot::channel();
    let callbacks = TaskCallbacks::new()
        .on_progress({
            let first_progress = Arc::clone(&first_progress);
            let samples = Arc::clone(&samples);
            move |p: ProgressSample| {
                samples.lock().push(p.transferred_bytes().unwrap_or(0));
                first_progress.notify_one();
            }
        })
        .on_result(|_| panic!("download should not complete"))
        .on_error(move |e| {
            let _ = tx.send(e);
        });

    let handle = client
        .transfers()
        .download(DownloadRequest::new("docs/big.bin", dir.path()), callbacks)
        .unwrap();

    first_progress.notified().await;
    handle.cancel();

    let err = rx.await.unwrap();
    assert!(err.is_cancelled());
    assert_eq!(handle.wait().await, TaskStatus::Cancelled);

    let seen = samples.lock().clone();
    assert!(seen.iter().all(|b| *b <= 5000));
    let partial = std::fs::metadata(dir.path().join("big.bin")).unwrap().len();
    assert!(partial < 15_000);
}

#[tokio::test]
async fn test_chunk_size_change_affects_later_transfers_only() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(&dir, "c.bin", 16_384);
    let executor = MockHttpExecutor::new();
    let client = client(&executor);
    let chunk = client.transfers().transfer_config().upload_chunk_size.clone();

    let (callbacks, first) = RecordingCallbacks::create();
    client
        .transfers()
        .upload(UploadRequest::new(&source, "docs"), callbacks)
        .unwrap();
    chunk.set(8192).unwrap();
    first.outcome().await.unwrap();

    assert!(chunk.set(MIN_BUFFER_SIZE - 1).is_err());
    assert_eq!(chunk.get(), 8192);

    let (callbacks, second) = RecordingCallbacks::create();
    client
        .transfers()
        .upload(UploadRequest::new(&source, "docs"), callbacks)
        .unwrap();
    second.outcome().await.unwrap();

    let requests = executor.requests();
    assert_eq!(requests[0].body_chunks, vec![4096; 4]);
    assert_eq!(requests[1].body_chunks, vec![8192, 8192]);
}
