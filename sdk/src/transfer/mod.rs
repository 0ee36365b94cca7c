//! File transfers: chunked upload, content replacement and download with
//! progress and cancellation.
//!
//! Every operation validates its arguments before any task is created, so
//! argument errors come back from the call itself rather than through
//! `on_error`. The chunk size is read when the transfer is prepared; changing
//! it later only affects transfers started afterwards.

mod download;
pub mod naming;
mod upload;

use crate::config::{ClientConfig, TransferConfig};
use crate::error::{BaasError, Result};
use crate::http::{HttpExecutor, Method, TokenProvider};
use crate::task::{TaskCallbacks, TaskContext, TaskHandle, TaskRunner};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Server answer to an upload or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub status: u16,
    /// JSON response body, `Null` when empty or not JSON
    pub body: Value,
}

impl TransferResponse {
    /// `entities[0].uuid` of the response, if present
    pub fn entity_uuid(&self) -> Option<&str> {
        self.body
            .get("entities")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("uuid"))
            .and_then(Value::as_str)
    }
}

/// Result of a finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Upload a local file to `files/{dest_path}/{file_name}`
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: PathBuf,
    pub dest_path: String,
    /// Remote file name; defaults to the source file's name
    pub file_name: Option<String>,
    /// Send `Content-Disposition: inline`
    pub inline: bool,
}

impl UploadRequest {
    pub fn new(source: impl Into<PathBuf>, dest_path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest_path: dest_path.into(),
            file_name: None,
            inline: false,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }
}

/// Replace the content of an existing remote file
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub file_uuid: String,
    pub source: PathBuf,
    pub inline: bool,
}

impl UpdateRequest {
    pub fn new(file_uuid: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            file_uuid: file_uuid.into(),
            source: source.into(),
            inline: false,
        }
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }
}

/// Download `files/{remote_path}` into `dest_dir`
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub remote_path: String,
    pub dest_dir: PathBuf,
    /// Local file name; defaults to the decoded last segment of `remote_path`
    pub file_name: Option<String>,
}

impl DownloadRequest {
    pub fn new(remote_path: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote_path: remote_path.into(),
            dest_dir: dest_dir.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// A validated upload or update, ready to run
#[derive(Debug, Clone)]
pub(crate) struct PreparedUpload {
    pub method: Method,
    pub url: String,
    pub source: PathBuf,
    pub file_size: u64,
    pub inline: bool,
    pub chunk_size: usize,
}

/// A validated download, ready to run
#[derive(Debug, Clone)]
pub(crate) struct PreparedDownload {
    pub url: String,
    pub dest_dir: PathBuf,
    pub path: PathBuf,
    pub chunk_size: usize,
}

/// File transfer service
#[derive(Clone)]
pub struct Transfers {
    executor: Arc<dyn HttpExecutor>,
    tokens: Arc<dyn TokenProvider>,
    config: Arc<ClientConfig>,
    transfer: TransferConfig,
    runner: TaskRunner,
}

impl Transfers {
    pub fn new(
        executor: Arc<dyn HttpExecutor>,
        tokens: Arc<dyn TokenProvider>,
        config: Arc<ClientConfig>,
        transfer: TransferConfig,
        runner: TaskRunner,
    ) -> Self {
        Self {
            executor,
            tokens,
            config,
            transfer,
            runner,
        }
    }

    pub fn transfer_config(&self) -> &TransferConfig {
        &self.transfer
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.config.app_url())
    }

    // ------------------------------------------------------------------
    // Background variants
    // ------------------------------------------------------------------

    /// Start an upload in the background.
    pub fn upload(
        &self,
        request: UploadRequest,
        callbacks: TaskCallbacks<TransferResponse>,
    ) -> Result<TaskHandle> {
        let plan = self.prepare_upload(&request)?;
        let this = self.clone();
        Ok(self.runner.run_with_kind(
            "upload",
            move |ctx| async move { this.run_upload(&ctx, plan).await },
            callbacks,
        ))
    }

    /// Start replacing a remote file's content in the background.
    pub fn update(
        &self,
        request: UpdateRequest,
        callbacks: TaskCallbacks<TransferResponse>,
    ) -> Result<TaskHandle> {
        let plan = self.prepare_update(&request)?;
        let this = self.clone();
        Ok(self.runner.run_with_kind(
            "update",
            move |ctx| async move { this.run_upload(&ctx, plan).await },
            callbacks,
        ))
    }

    /// Start a download in the background.
    pub fn download(
        &self,
        request: DownloadRequest,
        callbacks: TaskCallbacks<DownloadedFile>,
    ) -> Result<TaskHandle> {
        let plan = self.prepare_download(&request)?;
        let this = self.clone();
        Ok(self.runner.run_with_kind(
            "download",
            move |ctx| async move { this.run_download(&ctx, plan).await },
            callbacks,
        ))
    }

    // ------------------------------------------------------------------
    // In-context variants
    // ------------------------------------------------------------------

    /// Upload within an existing task context.
    pub async fn upload_in(
        &self,
        ctx: &TaskContext,
        request: UploadRequest,
    ) -> Result<TransferResponse> {
        let plan = self.prepare_upload(&request)?;
        self.run_upload(ctx, plan).await
    }

    /// Replace a remote file's content within an existing task context.
    pub async fn update_in(
        &self,
        ctx: &TaskContext,
        request: UpdateRequest,
    ) -> Result<TransferResponse> {
        let plan = self.prepare_update(&request)?;
        self.run_upload(ctx, plan).await
    }

    /// Download within an existing task context.
    pub async fn download_in(
        &self,
        ctx: &TaskContext,
        request: DownloadRequest,
    ) -> Result<DownloadedFile> {
        let plan = self.prepare_download(&request)?;
        self.run_download(ctx, plan).await
    }

    async fn run_upload(&self, ctx: &TaskContext, plan: PreparedUpload) -> Result<TransferResponse> {
        let token = self.tokens.access_token();
        upload::send_file(self.executor.as_ref(), &token, ctx, plan).await
    }

    async fn run_download(&self, ctx: &TaskContext, plan: PreparedDownload) -> Result<DownloadedFile> {
        let token = self.tokens.access_token();
        download::fetch_file(self.executor.as_ref(), &token, ctx, plan).await
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub(crate) fn prepare_upload(&self, request: &UploadRequest) -> Result<PreparedUpload> {
        let dest_path = request.dest_path.trim().trim_matches('/');
        if dest_path.is_empty() {
            return Err(BaasError::InvalidInput(
                "destination path must not be empty".to_string(),
            ));
        }
        let file_size = source_file_size(&request.source)?;

        let file_name = match &request.file_name {
            Some(name) => name.clone(),
            None => request
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    BaasError::InvalidInput(format!(
                        "cannot derive a file name from {}",
                        request.source.display()
                    ))
                })?,
        };
        naming::validate_file_name(&file_name)?;

        let url = format!(
            "{}/{}/{}",
            self.files_url(),
            naming::encode_path(dest_path)?,
            naming::encode_segment(&file_name)
        );

        Ok(PreparedUpload {
            method: Method::Post,
            url,
            source: request.source.clone(),
            file_size,
            inline: request.inline,
            chunk_size: self.transfer.upload_chunk_size.get(),
        })
    }

    pub(crate) fn prepare_update(&self, request: &UpdateRequest) -> Result<PreparedUpload> {
        let file_uuid = request.file_uuid.trim();
        if file_uuid.is_empty() {
            return Err(BaasError::InvalidInput(
                "file uuid must not be empty".to_string(),
            ));
        }
        let file_size = source_file_size(&request.source)?;

        Ok(PreparedUpload {
            method: Method::Put,
            url: format!("{}/{}", self.files_url(), naming::encode_segment(file_uuid)),
            source: request.source.clone(),
            file_size,
            inline: request.inline,
            chunk_size: self.transfer.upload_chunk_size.get(),
        })
    }

    pub(crate) fn prepare_download(&self, request: &DownloadRequest) -> Result<PreparedDownload> {
        let remote_path = request.remote_path.trim().trim_matches('/');
        if remote_path.is_empty() {
            return Err(BaasError::InvalidInput(
                "remote path must not be empty".to_string(),
            ));
        }
        if request.dest_dir.as_os_str().is_empty() {
            return Err(BaasError::InvalidInput(
                "destination directory must not be empty".to_string(),
            ));
        }
        if request.dest_dir.is_file() {
            return Err(BaasError::InvalidInput(format!(
                "destination {} is a file",
                request.dest_dir.display()
            )));
        }

        let file_name = match &request.file_name {
            Some(name) => {
                naming::validate_file_name(name)?;
                name.clone()
            }
            None => naming::file_name_from_remote_path(remote_path)?,
        };

        Ok(PreparedDownload {
            url: format!("{}/{}", self.files_url(), naming::encode_path(remote_path)?),
            dest_dir: request.dest_dir.clone(),
            path: request.dest_dir.join(file_name),
            chunk_size: self.transfer.download_chunk_size.get(),
        })
    }
}

impl std::fmt::Debug for Transfers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfers")
            .field("app_url", &self.config.app_url())
            .field("transfer", &self.transfer)
            .finish()
    }
}

fn source_file_size(source: &Path) -> Result<u64> {
    if source.as_os_str().is_empty() {
        return Err(BaasError::InvalidInput(
            "source path must not be empty".to_string(),
        ));
    }
    let metadata = std::fs::metadata(source).map_err(|e| {
        BaasError::InvalidInput(format!("cannot read {}: {e}", source.display()))
    })?;
    if !metadata.is_file() {
        return Err(BaasError::InvalidInput(format!(
            "{} is not a regular file",
            source.display()
        )));
    }
    Ok(metadata.len())
}
