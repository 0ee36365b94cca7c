//! Streaming download into a local file

use super::{DownloadedFile, PreparedDownload};
use crate::error::{BaasError, Result};
use crate::http::{ByteStream, HttpExecutor, HttpRequest, Method};
use crate::task::TaskContext;
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

pub(crate) async fn fetch_file(
    executor: &dyn HttpExecutor,
    access_token: &str,
    ctx: &TaskContext,
    plan: PreparedDownload,
) -> Result<DownloadedFile> {
    ctx.check_cancellation()?;

    tracing::info!(url = %plan.url, path = %plan.path.display(), "Downloading file");

    let request = HttpRequest::new(Method::Get, plan.url.as_str()).bearer(access_token);
    let response = tokio::select! {
        response = executor.execute(request) => response?,
        _ = ctx.cancelled() => return Err(BaasError::Cancelled),
    };

    let response = response.error_for_status().map_err(|e| {
        tracing::warn!(error = %e, url = %plan.url, "Download rejected");
        e
    })?;

    let total = response.content_length();

    tokio::fs::create_dir_all(&plan.dest_dir).await?;
    let file = tokio::fs::File::create(&plan.path).await?;
    let mut writer = BufWriter::with_capacity(plan.chunk_size, file);

    let copied = copy_body(ctx, response.body, &mut writer, total, plan.chunk_size).await;
    // Flush and close on every exit path
    let closed = writer.shutdown().await;

    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(close_err) = closed {
                tracing::warn!(error = %close_err, "Failed to close partial download");
            }
            if e.is_cancelled() {
                tracing::info!(path = %plan.path.display(), "Download cancelled, partial file kept");
            }
            return Err(e);
        }
    };
    closed?;

    tracing::info!(path = %plan.path.display(), bytes, "Download finished");
    Ok(DownloadedFile {
        path: plan.path,
        bytes,
    })
}

/// Write `body` to `writer` in pieces of at most `chunk_size` bytes.
///
/// Cancellation is checked before each piece; progress is emitted after it.
pub(crate) async fn copy_body<W>(
    ctx: &TaskContext,
    mut body: ByteStream,
    writer: &mut W,
    total: Option<u64>,
    chunk_size: usize,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let chunk_size = chunk_size.max(1);
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for piece in chunk.chunks(chunk_size) {
            ctx.check_cancellation()?;
            writer.write_all(piece).await?;
            written += piece.len() as u64;
            tracing::trace!(written, ?total, "Download chunk written");

            // A server sending more than it declared loses its total
            let known_total = total.filter(|t| *t >= written);
            ctx.report_bytes(known_total, written)?;
        }
    }

    ctx.check_cancellation()?;
    Ok(written)
}
