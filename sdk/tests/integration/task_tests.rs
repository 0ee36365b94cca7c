//! Task tests: callback delivery, notification contexts and composition.

use crate::{init_tracing, with_timeout, TEST_TIMEOUT};
use baas_sdk::prelude::*;
use baas_sdk::task::queued;
use baas_sdk::testing::{MockHttpExecutor, MockResponse, RecordingCallbacks};
use baas_sdk::NotificationContext;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_queued_callbacks_run_on_caller_loop() {
    init_tracing();
    with_timeout(TEST_TIMEOUT, "test_queued_callbacks_run_on_caller_loop", async {
        let (notifier, mut queue) = queued();
        let notifier: Arc<dyn NotificationContext> = Arc::new(notifier);
        let runner = TaskRunner::default().with_notifier(notifier);

        let delivered = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let events = Arc::clone(&delivered);
        let result_events = Arc::clone(&delivered);
        let callbacks = TaskCallbacks::new()
            .on_progress(move |p: ProgressSample| {
                events
                    .lock()
                    .push(format!("progress {}", p.transferred_bytes().unwrap_or(0)))
            })
            .on_result(move |v: u32| result_events.lock().push(format!("result {v}")));

        let handle = runner.run(
            |ctx| async move {
                ctx.report_bytes(Some(2), 1)?;
                ctx.report_bytes(Some(2), 2)?;
                Ok(7u32)
            },
            callbacks,
        );
        assert_eq!(handle.wait().await, TaskStatus::Completed);

        // Nothing ran until the application drains its queue
        while delivered.lock().len() < 3 {
            assert!(queue.run_next().await);
        }
        assert_eq!(
            *delivered.lock(),
            vec!["progress 1", "progress 2", "result 7"]
        );
        assert_eq!(queue.run_pending(), 0);
    })
    .await;
}

#[tokio::test]
async fn test_panicking_operation_reports_exactly_once() {
    let runner = TaskRunner::default();
    let (callbacks, recorded) = RecordingCallbacks::create::<()>();

    let handle = runner.run(
        |ctx| async move {
            ctx.report_bytes(None, 10)?;
            if ctx.task_id().is_nil() {
                return Ok(());
            }
            panic!("operation exploded");
        },
        callbacks,
    );

    let err = recorded.outcome().await.unwrap_err();
    assert!(matches!(err, BaasError::TaskPanicked(ref m) if m.contains("exploded")));
    assert_eq!(handle.wait().await, TaskStatus::Failed);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(recorded.terminal_count(), 1);
    assert_eq!(recorded.late_progress(), 0);
}

#[tokio::test]
async fn test_panicking_callback_does_not_break_delivery() {
    let runner = TaskRunner::default();
    let (tx, rx) = tokio::sync::oneshot::channel();
    let callbacks = TaskCallbacks::new()
        .on_progress(|_| panic!("bad progress handler"))
        .on_result(move |v: u8| {
            let _ = tx.send(v);
        });

    runner.run(
        |ctx| async move {
            ctx.report_bytes(Some(1), 1)?;
            Ok(1u8)
        },
        callbacks,
    );
    assert_eq!(rx.await.unwrap(), 1);
}

#[tokio::test]
async fn test_operations_compose_in_one_task() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.bin");
    std::fs::write(&source, vec![0u8; 6000]).unwrap();

    let executor = MockHttpExecutor::new();
    executor.respond(MockResponse::json(200, &json!({"entities": [{"uuid": "f-1"}]})));
    executor.respond(MockResponse::bytes(200, vec![9u8; 6000]));
    let client = BaasClient::builder()
        .organization("org")
        .application("app")
        .http_executor(Arc::new(executor.clone()))
        .build()
        .unwrap();

    let transfers = client.transfers().clone();
    let dest = dir.path().join("copy");
    let (callbacks, recorded) = RecordingCallbacks::create();
    client.runner().run(
        move |ctx| async move {
            let uploaded = transfers
                .upload_in(&ctx, UploadRequest::new(&source, "docs"))
                .await?;
            let uuid = uploaded.entity_uuid().unwrap_or_default().to_string();
            transfers
                .download_in(&ctx, DownloadRequest::new(format!("docs/{uuid}"), dest))
                .await
        },
        callbacks,
    );

    let file = recorded.outcome().await.unwrap();
    assert_eq!(file.bytes, 6000);
    assert!(file.path.ends_with("f-1"));
    // upload progress then download progress, each reaching 6000
    assert_eq!(recorded.transferred(), vec![4096, 6000, 4096, 6000]);
}

#[tokio::test]
async fn test_bounded_runner_queues_tasks() {
    let runner = TaskRunner::new(TaskRunnerConfig::bounded(2).unwrap());
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<TaskHandle> = (0..6)
        .map(|_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            runner.run(
                move |_ctx| async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                TaskCallbacks::<()>::new(),
            )
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.wait().await, TaskStatus::Completed);
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}
