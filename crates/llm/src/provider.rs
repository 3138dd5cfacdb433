use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

use super::model::Model;

/// Monotonic identifier for one streaming generation.
///
/// This must change on every send/edit/refresh so stale events can be
/// rejected, even when generations are only logically concurrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationId(pub u64);

impl GenerationId {
    /// Creates a typed generation identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Speaker role understood by the provider boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub default_model: Option<String>,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        default_model: Option<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            default_model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One tool-result record yielded by the capability after the text
/// stream has drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub output: String,
}

impl ToolOutcome {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub generation: GenerationId,
    pub model_id: String,
    pub messages: Vec<ProviderMessage>,
    /// Host-supplied page context, folded into the provider preamble.
    pub context: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    /// Names of host tools enabled for this generation.
    pub tools: Vec<String>,
}

impl StreamRequest {
    pub fn new(
        generation: GenerationId,
        model_id: impl Into<String>,
        messages: Vec<ProviderMessage>,
    ) -> Self {
        Self {
            generation,
            model_id: model_id.into(),
            messages,
            context: None,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }
}

/// Event emitted by a provider worker, tagged with its generation.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub generation: GenerationId,
    pub payload: StreamEventPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventPayload {
    /// One chunk of streamed assistant text, in production order.
    Delta(String),
    /// Terminal success. Tool results, if any, arrive here after the
    /// text stream has fully drained.
    Done { tool_results: Vec<ToolOutcome> },
    /// Terminal failure with a human-readable description.
    Error(String),
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("provider '{provider_id}' has no API key configured"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("no adapter registered for provider '{provider_id}'"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("stream request for {generation:?} has no messages"))]
    EmptyMessageSet {
        stage: &'static str,
        generation: GenerationId,
    },
    #[snafu(display("http client error during `{stage}`: {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completion stream failed during `{stage}`: {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
}

/// Receiver half of one generation's event pipeline.
///
/// Dropping the stream signals cancellation to the worker, so an
/// abandoned generation never keeps provider IO alive.
pub struct ProviderEventStream {
    generation: GenerationId,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl ProviderEventStream {
    pub(crate) fn new(
        generation: GenerationId,
        events: mpsc::UnboundedReceiver<StreamEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            generation,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ProviderEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// The external chat capability consumed by the session controller.
pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn default_model(&self) -> &str;
    fn fallback_models(&self) -> &[Model];
    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle>;
}

/// Builds the sender/receiver/cancel triple for one generation's events.
///
/// Public so alternate providers (and test fakes) can assemble a
/// `ProviderStreamHandle` without reimplementing the channel discipline.
pub fn make_event_stream(
    generation: GenerationId,
) -> (
    mpsc::UnboundedSender<StreamEvent>,
    ProviderEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        ProviderEventStream::new(generation, event_rx, cancel_tx),
        cancel_rx,
    )
}
