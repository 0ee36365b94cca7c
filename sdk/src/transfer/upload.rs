//! Streaming upload: the file is read in chunks and fed to the request body

use super::{PreparedUpload, TransferResponse};
use crate::error::{BaasError, Result};
use crate::http::{ByteStream, HttpExecutor, HttpRequest, RequestBody};
use crate::task::TaskContext;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Send the prepared file and wait for the server's answer.
pub(crate) async fn send_file(
    executor: &dyn HttpExecutor,
    access_token: &str,
    ctx: &TaskContext,
    plan: PreparedUpload,
) -> Result<TransferResponse> {
    ctx.check_cancellation()?;

    let file = tokio::fs::File::open(&plan.source).await?;
    let content_type = sniff_content_type(plan.source.clone()).await;

    // Capacity 1: reading stays at most one chunk ahead of the transport
    let (tx, rx) = mpsc::channel::<Result<Bytes>>(1);
    let body: ByteStream = Box::pin(ReceiverStream::new(rx));

    let mut request = HttpRequest::new(plan.method, plan.url.as_str())
        .bearer(access_token)
        .header("Content-Length", plan.file_size.to_string());
    if let Some(content_type) = content_type {
        request = request.header("Content-Type", content_type);
    }
    if plan.inline {
        request = request.header("Content-Disposition", "inline");
    }
    let request = request.body(RequestBody::Stream(body));

    tracing::info!(
        method = %plan.method,
        url = %plan.url,
        bytes = plan.file_size,
        chunk_size = plan.chunk_size,
        "Uploading file"
    );

    let (pumped, response) = tokio::join!(
        pump(ctx, file, plan.file_size, plan.chunk_size, tx),
        executor.execute(request)
    );

    // Cancellation wins over whatever the transport made of the aborted body
    if matches!(pumped, Err(BaasError::Cancelled)) || ctx.is_cancelled() {
        tracing::info!(url = %plan.url, "Upload cancelled");
        return Err(BaasError::Cancelled);
    }
    let sent = pumped?;
    let response = response?;

    let status = response.status;
    let body = response.json_or_null().await?;
    if !(200..300).contains(&status) {
        let message = body
            .get("error_description")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Http Status code is {status}"));
        tracing::warn!(status, %message, "Upload rejected");
        return Err(BaasError::Server {
            status: Some(status),
            message,
        });
    }

    tracing::info!(status, bytes = sent, "Upload finished");
    Ok(TransferResponse { status, body })
}

/// Copy `reader` into `tx` in `chunk_size` pieces, emitting progress after
/// each piece. Returns the number of bytes handed to the body.
pub(crate) async fn pump<R>(
    ctx: &TaskContext,
    mut reader: R,
    total: u64,
    chunk_size: usize,
    tx: mpsc::Sender<Result<Bytes>>,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent: u64 = 0;

    loop {
        if ctx.is_cancelled() {
            let _ = tx.send(Err(BaasError::Cancelled)).await;
            return Err(BaasError::Cancelled);
        }

        let n = match read_full(&mut reader, &mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = tx
                    .send(Err(BaasError::Transport(format!("upload source read failed: {e}"))))
                    .await;
                return Err(e.into());
            }
        };

        if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
            // The transport stopped reading; its own result tells what happened
            tracing::debug!(sent, "Request body dropped by transport");
            return Ok(sent);
        }
        sent += n as u64;
        tracing::trace!(sent, total, "Upload chunk sent");

        ctx.report_bytes(Some(total.max(sent)), sent)?;

        if ctx.is_cancelled() {
            let _ = tx.send(Err(BaasError::Cancelled)).await;
            return Err(BaasError::Cancelled);
        }
    }

    Ok(sent)
}

/// Content type from the file's leading bytes, when recognised.
///
/// `infer` reads the file synchronously, so it runs on the blocking pool.
async fn sniff_content_type(source: PathBuf) -> Option<String> {
    let sniffed = tokio::task::spawn_blocking(move || {
        infer::get_from_path(&source).map_err(|e| (source, e))
    })
    .await;
    match sniffed {
        Ok(Ok(kind)) => kind.map(|k| k.mime_type().to_string()),
        Ok(Err((source, e))) => {
            tracing::debug!(path = %source.display(), error = %e, "Content type detection failed");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "Content type detection task failed");
            None
        }
    }
}

/// Read until `buf` is full or the reader is exhausted.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
