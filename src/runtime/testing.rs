//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::converters::{Converter, ConverterError, ConverterSet};
use crate::dispatch::{ConversionDispatcher, FailureKind};
use crate::formats::{Capability, Format, FormatRegistry};
use crate::messages::failure_text;
use crate::runtime::ConversationRuntime;
use crate::state_machine::{ConvContext, ConversationId, Event, UploadEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Mock Blob Resolver
// ============================================================================

/// Serves uploads from memory, two chunks per blob
pub struct MockBlobResolver {
    blobs: HashMap<String, Vec<u8>>,
    announce_sizes: bool,
    refusal: Option<TransportError>,
    fetched: Mutex<Vec<String>>,
}

impl MockBlobResolver {
    pub fn new() -> Self {
        Self {
            blobs: HashMap::new(),
            announce_sizes: true,
            refusal: None,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_blob(mut self, file_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.blobs.insert(file_id.into(), bytes);
        self
    }

    /// Behave like a source that does not report sizes up front
    pub fn without_announced_sizes(mut self) -> Self {
        self.announce_sizes = false;
        self
    }

    /// Fail every fetch with `error`
    pub fn refusing(mut self, error: TransportError) -> Self {
        self.refusal = Some(error);
        self
    }

    /// File ids requested so far
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobResolver for MockBlobResolver {
    async fn fetch(&self, file_id: &str) -> Result<BlobStream, TransportError> {
        self.fetched.lock().unwrap().push(file_id.to_string());
        if let Some(error) = &self.refusal {
            return Err(error.clone());
        }
        let bytes = self
            .blobs
            .get(file_id)
            .cloned()
            .ok_or_else(|| TransportError::other(format!("unknown file id {file_id}")))?;

        let size = self.announce_sizes.then_some(bytes.len() as u64);
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        let chunks = vec![Ok(head.to_vec()), Ok(tail.to_vec())];
        Ok(BlobStream {
            size,
            chunks: Box::pin(futures::stream::iter(chunks)),
        })
    }
}

// ============================================================================
// Recording Sink
// ============================================================================

/// Everything a sink was asked to deliver
#[derive(Debug, Clone, PartialEq)]
pub enum SentItem {
    Text {
        conversation: ConversationId,
        text: String,
        markup: ReplyMarkup,
    },
    Document {
        conversation: ConversationId,
        filename: String,
        caption: String,
        size: u64,
    },
    Progress {
        conversation: ConversationId,
        stage: ProgressStage,
    },
}

/// Reply sink that records instead of sending
pub struct RecordingSink {
    items: Mutex<Vec<SentItem>>,
    fail_documents: Option<TransportError>,
    fail_menus: Option<TransportError>,
    fail_progress: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            fail_documents: None,
            fail_menus: None,
            fail_progress: false,
        }
    }

    pub fn failing_documents(mut self, error: TransportError) -> Self {
        self.fail_documents = Some(error);
        self
    }

    pub fn failing_menus(mut self, error: TransportError) -> Self {
        self.fail_menus = Some(error);
        self
    }

    pub fn failing_progress(mut self) -> Self {
        self.fail_progress = true;
        self
    }

    pub fn items(&self) -> Vec<SentItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                SentItem::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Button labels of every menu shown
    pub fn menus(&self) -> Vec<Vec<String>> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                SentItem::Text {
                    markup: ReplyMarkup::Choices(labels),
                    ..
                } => Some(labels),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<SentItem> {
        self.items()
            .into_iter()
            .filter(|item| matches!(item, SentItem::Document { .. }))
            .collect()
    }

    /// Texts that are one of the failure messages
    pub fn failure_count(&self) -> usize {
        let kinds = [
            FailureKind::UploadTooLarge,
            FailureKind::UnsupportedInputFormat,
            FailureKind::UnsupportedConversion,
            FailureKind::ConversionFailed,
            FailureKind::OutputTooLarge,
            FailureKind::TransportPayloadTooLarge,
            FailureKind::TransportTimedOut,
            FailureKind::Internal,
        ];
        self.texts()
            .iter()
            .filter(|text| kinds.iter().any(|kind| failure_text(*kind) == text.as_str()))
            .count()
    }

    fn record(&self, item: SentItem) {
        self.items.lock().unwrap().push(item);
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), TransportError> {
        if let (Some(error), ReplyMarkup::Choices(_)) = (&self.fail_menus, &markup) {
            return Err(error.clone());
        }
        self.record(SentItem::Text {
            conversation,
            text: text.to_string(),
            markup,
        });
        Ok(())
    }

    async fn send_document(
        &self,
        conversation: ConversationId,
        path: &Path,
        filename: &str,
        caption: &str,
    ) -> Result<(), TransportError> {
        if let Some(error) = &self.fail_documents {
            return Err(error.clone());
        }
        let size = std::fs::metadata(path)
            .map_err(|e| TransportError::other(format!("cannot read {}: {e}", path.display())))?
            .len();
        self.record(SentItem::Document {
            conversation,
            filename: filename.to_string(),
            caption: caption.to_string(),
            size,
        });
        Ok(())
    }

    async fn notify_progress(
        &self,
        conversation: ConversationId,
        stage: ProgressStage,
    ) -> Result<(), TransportError> {
        if self.fail_progress {
            return Err(TransportError::other("chat action refused"));
        }
        self.record(SentItem::Progress {
            conversation,
            stage,
        });
        Ok(())
    }
}

// ============================================================================
// Mock Converter
// ============================================================================

/// One recorded converter invocation
#[derive(Debug, Clone)]
pub struct ConverterCall {
    pub input: PathBuf,
    pub variant: Option<Format>,
    /// Whether the input was on disk when the converter ran
    pub input_existed: bool,
}

#[derive(Debug, Clone)]
enum MockOutput {
    /// Sparse file of this size beside the input
    Sized(u64),
    /// Sparse file of this size at a fixed path
    At(PathBuf, u64),
    Empty,
    Fail(String),
    Panic,
}

/// Converter with a scripted result; clones share the call log
#[derive(Debug, Clone)]
pub struct MockConverter {
    output: MockOutput,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<ConverterCall>>>,
}

impl MockConverter {
    fn with_output(output: MockOutput) -> Self {
        Self {
            output,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn output(size: u64) -> Self {
        Self::with_output(MockOutput::Sized(size))
    }

    pub fn output_at(path: PathBuf, size: u64) -> Self {
        Self::with_output(MockOutput::At(path, size))
    }

    pub fn empty() -> Self {
        Self::with_output(MockOutput::Empty)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_output(MockOutput::Fail(message.into()))
    }

    pub fn panicking() -> Self {
        Self::with_output(MockOutput::Panic)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ConverterCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn sparse_file(path: &Path, size: u64) -> Result<PathBuf, ConverterError> {
    let file = std::fs::File::create(path)?;
    file.set_len(size)?;
    Ok(path.to_path_buf())
}

#[async_trait]
impl Converter for MockConverter {
    async fn convert(
        &self,
        input: &Path,
        variant: Option<Format>,
    ) -> Result<PathBuf, ConverterError> {
        self.calls.lock().unwrap().push(ConverterCall {
            input: input.to_path_buf(),
            variant,
            input_existed: input.exists(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.output {
            MockOutput::Sized(size) => sparse_file(&input.with_extension("out"), *size),
            MockOutput::At(path, size) => sparse_file(path, *size),
            MockOutput::Empty => sparse_file(&input.with_extension("out"), 0),
            MockOutput::Fail(message) => Err(ConverterError::External(message.clone())),
            MockOutput::Panic => panic!("converter crashed on {}", input.display()),
        }
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Conversation id every test runtime uses
pub const TEST_CONVERSATION: ConversationId = ConversationId(42);

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub sink: Arc<RecordingSink>,
    pub blobs: Arc<MockBlobResolver>,
    pub event_tx: mpsc::Sender<Event>,
    temp_root: tempfile::TempDir,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> TestRuntimeBuilder {
        TestRuntimeBuilder::new()
    }
}

pub struct TestRuntimeBuilder {
    converters: ConverterSet,
    blobs: MockBlobResolver,
    sink: RecordingSink,
    job_timeout: Option<Duration>,
}

impl TestRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            converters: ConverterSet::new(),
            blobs: MockBlobResolver::new(),
            sink: RecordingSink::new(),
            job_timeout: None,
        }
    }

    pub fn converter(mut self, capability: Capability, converter: MockConverter) -> Self {
        self.converters = self.converters.with(capability, converter);
        self
    }

    pub fn blob(mut self, file_id: &str, bytes: Vec<u8>) -> Self {
        self.blobs = self.blobs.with_blob(file_id, bytes);
        self
    }

    pub fn failing_documents(mut self, error: TransportError) -> Self {
        self.sink = self.sink.failing_documents(error);
        self
    }

    pub fn failing_menus(mut self, error: TransportError) -> Self {
        self.sink = self.sink.failing_menus(error);
        self
    }

    pub fn job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = Some(job_timeout);
        self
    }

    pub fn build(self) -> TestRuntime {
        let temp_root = tempfile::tempdir().unwrap();
        let registry = Arc::new(FormatRegistry::builtin());
        let blobs = Arc::new(self.blobs);
        let sink = Arc::new(self.sink);

        let mut dispatcher = ConversionDispatcher::new(
            registry.clone(),
            self.converters,
            blobs.clone(),
            temp_root.path().to_path_buf(),
        );
        if let Some(job_timeout) = self.job_timeout {
            dispatcher = dispatcher.with_job_timeout(Some(job_timeout));
        }
        let context = ConvContext::new(TEST_CONVERSATION, registry);
        let (event_tx, event_rx) = mpsc::channel(32);

        let runtime = ConversationRuntime::new(
            context,
            Arc::new(dispatcher),
            sink.clone(),
            event_rx,
            event_tx.downgrade(),
        );
        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            sink,
            blobs,
            event_tx,
            temp_root,
            _runtime_handle: handle,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRuntime {
    pub async fn send(&self, event: Event) {
        self.event_tx
            .send(event)
            .await
            .expect("Failed to send event");
    }

    pub async fn upload(&self, upload: UploadEvent) {
        self.send(Event::Upload(upload)).await;
    }

    pub async fn choose(&self, text: &str) {
        self.send(Event::Choice {
            raw_text: text.to_string(),
        })
        .await;
    }

    /// Poll `condition` until it holds or `timeout` passes
    pub async fn wait_for(&self, timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    pub async fn wait_for_text(&self, text: &str, timeout: Duration) -> bool {
        self.wait_for(timeout, || self.sink.texts().iter().any(|t| t == text))
            .await
    }

    pub async fn wait_for_menu(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, || !self.sink.menus().is_empty())
            .await
    }

    /// Entries left in the temp root
    pub fn residue(&self) -> usize {
        std::fs::read_dir(self.temp_root.path())
            .map(Iterator::count)
            .unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_blob_resolver() {
        let blobs = MockBlobResolver::new().with_blob("a", b"hello".to_vec());

        let stream = blobs.fetch("a").await.unwrap();
        assert_eq!(stream.size, Some(5));
        let chunks: Vec<_> = stream.chunks.collect().await;
        let bytes: Vec<u8> = chunks.into_iter().flat_map(Result::unwrap).collect();
        assert_eq!(bytes, b"hello");

        assert!(blobs.fetch("missing").await.is_err());
        assert_eq!(blobs.fetched(), vec!["a".to_string(), "missing".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_converter_writes_sparse_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        std::fs::write(&input, b"x").unwrap();

        let converter = MockConverter::output(5 * 1024 * 1024);
        let output = converter.convert(&input, None).await.unwrap();

        assert_eq!(std::fs::metadata(&output).unwrap().len(), 5 * 1024 * 1024);
        let calls = converter.clone().calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].input_existed);
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.send_text(TEST_CONVERSATION, "hi", ReplyMarkup::RemoveKeyboard)
            .await
            .unwrap();
        sink.send_text(
            TEST_CONVERSATION,
            "pick",
            ReplyMarkup::Choices(vec!["a".to_string()]),
        )
        .await
        .unwrap();
        sink.send_text(
            TEST_CONVERSATION,
            failure_text(FailureKind::Internal),
            ReplyMarkup::RemoveKeyboard,
        )
        .await
        .unwrap();

        assert_eq!(sink.texts().len(), 3);
        assert_eq!(sink.menus(), vec![vec!["a".to_string()]]);
        assert_eq!(sink.failure_count(), 1);
    }
}
