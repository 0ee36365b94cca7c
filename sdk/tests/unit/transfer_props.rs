//! Property-based tests for chunked transfer progress

use baas_sdk::prelude::*;
use baas_sdk::testing::{MockHttpExecutor, MockResponse, RecordingCallbacks};
use bytes::Bytes;
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn client(executor: &MockHttpExecutor, chunk_size: usize) -> BaasClient {
    BaasClient::builder()
        .organization("org")
        .application("app")
        .http_executor(Arc::new(executor.clone()))
        .chunk_size(ChunkSize::new(chunk_size).unwrap())
        .build()
        .unwrap()
}

fn assert_progress(transferred: &[u64], total: u64) -> std::result::Result<(), TestCaseError> {
    prop_assert!(transferred.windows(2).all(|w| w[0] <= w[1]));
    if total > 0 {
        prop_assert_eq!(transferred.last().copied(), Some(total));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_upload_progress_is_monotonic(len in 0usize..40_000, chunk in 4096usize..12_000) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.bin");
        std::fs::write(&source, vec![5u8; len]).unwrap();

        let (transferred, chunks) = runtime().block_on(async {
            let executor = MockHttpExecutor::new();
            let client = client(&executor, chunk);
            let (callbacks, recorded) = RecordingCallbacks::create();
            client
                .transfers()
                .upload(UploadRequest::new(&source, "docs"), callbacks)
                .unwrap();
            recorded.outcome().await.unwrap();
            (recorded.transferred(), executor.last_request().unwrap().body_chunks)
        });

        assert_progress(&transferred, len as u64)?;
        prop_assert!(chunks.iter().all(|c| *c <= chunk));
        prop_assert_eq!(chunks.iter().sum::<usize>(), len);
    }

    #[test]
    fn prop_download_progress_is_monotonic(
        pieces in prop::collection::vec(1usize..10_000, 0..6),
        chunk in 4096usize..12_000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let total: usize = pieces.iter().sum();

        let transferred = runtime().block_on(async {
            let executor = MockHttpExecutor::new();
            executor.respond(
                MockResponse::new(200)
                    .with_header("Content-Length", total.to_string())
                    .with_chunks(pieces.iter().map(|n| Bytes::from(vec![1u8; *n])).collect()),
            );
            let client = client(&executor, chunk);
            let (callbacks, recorded) = RecordingCallbacks::create();
            client
                .transfers()
                .download(DownloadRequest::new("docs/out.bin", dir.path()), callbacks)
                .unwrap();
            let file = recorded.outcome().await.unwrap();
            assert_eq!(file.bytes, total as u64);
            recorded.transferred()
        });

        assert_progress(&transferred, total as u64)?;
        prop_assert!(transferred.windows(2).all(|w| w[1] - w[0] <= chunk as u64));
    }
}
