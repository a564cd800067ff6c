//! Conversion dispatch
//!
//! Runs one conversion job: resolve the capability, download the upload into
//! a scoped job directory, convert, check the output, send it back. Every
//! exit path releases the job's files, and every failure is classified once
//! into a `FailureKind`.

use crate::artifacts::ScopedArtifacts;
use crate::converters::{Converter, ConverterError, ConverterSet};
use crate::formats::{Capability, Format, FormatRegistry};
use crate::messages::DOCUMENT_CAPTION;
use crate::runtime::{BlobResolver, ProgressStage, ReplySink, TransportError, TransportErrorKind};
use crate::state_machine::{ConversationId, Limits, UploadedFile};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// User-facing failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UploadTooLarge,
    UnsupportedInputFormat,
    UnsupportedConversion,
    ConversionFailed,
    OutputTooLarge,
    TransportPayloadTooLarge,
    TransportTimedOut,
    Internal,
}

/// Why a conversion job failed
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: u64 },
    #[error("No conversion from '{input}' to {target}")]
    UnsupportedConversion { input: String, target: Format },
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
    #[error("Converted file is {size} bytes, limit is {limit}")]
    OutputTooLarge { size: u64, limit: u64 },
    #[error("Converter still running after {0:?}")]
    TimedOut(Duration),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConversionError {
    /// The one place failures are classified
    pub fn kind(&self) -> FailureKind {
        match self {
            ConversionError::UploadTooLarge { .. } => FailureKind::UploadTooLarge,
            ConversionError::UnsupportedConversion { .. } => FailureKind::UnsupportedConversion,
            ConversionError::ConversionFailed(_) => FailureKind::ConversionFailed,
            ConversionError::OutputTooLarge { .. } => FailureKind::OutputTooLarge,
            ConversionError::Transport(e) => match e.kind {
                TransportErrorKind::PayloadTooLarge => FailureKind::TransportPayloadTooLarge,
                TransportErrorKind::TimedOut => FailureKind::TransportTimedOut,
                TransportErrorKind::Other => FailureKind::Internal,
            },
            ConversionError::TimedOut(_) | ConversionError::Internal(_) => FailureKind::Internal,
        }
    }
}

impl From<ConverterError> for ConversionError {
    fn from(e: ConverterError) -> Self {
        ConversionError::ConversionFailed(e.to_string())
    }
}

/// Runs conversion jobs for every conversation
pub struct ConversionDispatcher<B: BlobResolver> {
    registry: Arc<FormatRegistry>,
    converters: ConverterSet,
    blobs: B,
    temp_root: PathBuf,
    limits: Limits,
    /// Unbounded unless configured
    job_timeout: Option<Duration>,
}

impl<B: BlobResolver> ConversionDispatcher<B> {
    pub fn new(
        registry: Arc<FormatRegistry>,
        converters: ConverterSet,
        blobs: B,
        temp_root: PathBuf,
    ) -> Self {
        Self {
            registry,
            converters,
            blobs,
            temp_root,
            limits: Limits::default(),
            job_timeout: None,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_job_timeout(mut self, job_timeout: Option<Duration>) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn registry(&self) -> &Arc<FormatRegistry> {
        &self.registry
    }

    /// Convert `file` to `target` and deliver it through `sink`
    pub async fn convert<R: ReplySink + ?Sized>(
        &self,
        conversation: ConversationId,
        file: &UploadedFile,
        target: Format,
        sink: &R,
    ) -> Result<(), ConversionError> {
        let input_ext = FormatRegistry::lookup_extension(file);
        let unsupported = || ConversionError::UnsupportedConversion {
            input: input_ext.clone(),
            target,
        };

        let capability = self
            .registry
            .resolve(&input_ext, target.extension())
            .ok_or_else(unsupported)?;
        let converter = self.converters.get(capability).ok_or_else(|| {
            tracing::warn!(capability = capability.name(), "No converter installed");
            unsupported()
        })?;

        let mut artifacts = ScopedArtifacts::create(&self.temp_root)
            .await
            .map_err(|e| ConversionError::Internal(format!("Cannot create job directory: {e}")))?;

        let result = self
            .run_job(
                conversation,
                file,
                target,
                capability,
                converter.as_ref(),
                &mut artifacts,
                sink,
            )
            .await;

        artifacts.release().await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_job<R: ReplySink + ?Sized>(
        &self,
        conversation: ConversationId,
        file: &UploadedFile,
        target: Format,
        capability: Capability,
        converter: &dyn Converter,
        artifacts: &mut ScopedArtifacts,
        sink: &R,
    ) -> Result<(), ConversionError> {
        notify(sink, conversation, ProgressStage::Downloading).await;
        let input = artifacts.track(&file.display_name);
        let downloaded = self.materialize(&file.file_id, &input).await?;
        tracing::debug!(conv_id = %conversation, bytes = downloaded, path = %input.display(), "Upload materialized");

        notify(sink, conversation, ProgressStage::Converting).await;
        let variant = capability.takes_variant().then_some(target);
        let output = match self.job_timeout {
            // Dropping the future on timeout kills any child process it spawned
            Some(limit) => tokio::time::timeout(limit, converter.convert(&input, variant))
                .await
                .map_err(|_| ConversionError::TimedOut(limit))??,
            None => converter.convert(&input, variant).await?,
        };
        artifacts.adopt(output.clone());

        let size = check_output(&output, self.limits.max_output_bytes).await?;

        notify(sink, conversation, ProgressStage::Sending).await;
        let filename = file.output_name(target);
        sink.send_document(conversation, &output, &filename, DOCUMENT_CAPTION)
            .await?;

        tracing::info!(
            conv_id = %conversation,
            capability = capability.name(),
            file = %filename,
            bytes = size,
            "Converted file delivered"
        );
        Ok(())
    }

    /// Stream the upload to `dest`, enforcing the upload limit on the bytes
    /// actually received
    async fn materialize(&self, file_id: &str, dest: &Path) -> Result<u64, ConversionError> {
        let limit = self.limits.max_upload_bytes;
        let blob = self.blobs.fetch(file_id).await.map_err(|e| match e.kind {
            // The source refused to hand over a file this big
            TransportErrorKind::PayloadTooLarge => ConversionError::UploadTooLarge { limit },
            _ => e.into(),
        })?;
        if blob.size.is_some_and(|size| size > limit) {
            return Err(ConversionError::UploadTooLarge { limit });
        }

        let io_error =
            |e: std::io::Error| ConversionError::Internal(format!("Cannot write upload: {e}"));
        let mut out = tokio::fs::File::create(dest).await.map_err(io_error)?;
        let mut chunks = blob.chunks;
        let mut written: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > limit {
                return Err(ConversionError::UploadTooLarge { limit });
            }
            out.write_all(&chunk).await.map_err(io_error)?;
        }
        out.flush().await.map_err(io_error)?;
        Ok(written)
    }
}

/// A produced file must exist, be non-empty and fit the output limit
async fn check_output(path: &Path, limit: u64) -> Result<u64, ConversionError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        ConversionError::ConversionFailed(format!("No output at {}: {e}", path.display()))
    })?;

    if !metadata.is_file() || metadata.len() == 0 {
        return Err(ConversionError::ConversionFailed(format!(
            "Empty output at {}",
            path.display()
        )));
    }
    if metadata.len() > limit {
        return Err(ConversionError::OutputTooLarge {
            size: metadata.len(),
            limit,
        });
    }
    Ok(metadata.len())
}

async fn notify<R: ReplySink + ?Sized>(
    sink: &R,
    conversation: ConversationId,
    stage: ProgressStage,
) {
    if let Err(e) = sink.notify_progress(conversation, stage).await {
        tracing::debug!(conv_id = %conversation, ?stage, error = %e, "Progress notification failed");
    }
}
