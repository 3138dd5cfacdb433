use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};

use super::model::{DEFAULT_OPENAI_MODEL, Model, default_openai_models};
use super::provider::{
    CompletionsFailedSnafu, EmptyMessageSetSnafu, GenerationId, HttpClientSnafu, LlmProvider,
    MissingApiKeySnafu, ProviderConfig, ProviderError, ProviderMessage, ProviderResult,
    ProviderStreamHandle, ProviderWorker, Role, StreamEvent, StreamEventPayload, StreamRequest,
    make_event_stream,
};

pub const RIG_OPENAI_PROVIDER_ID: &str = "openai";

type RigStreamingResponse = rig::streaming::StreamingCompletionResponse<
    rig::providers::openai::responses_api::streaming::StreamingCompletionResponse,
>;

/// Rig-backed OpenAI adapter for the chat capability.
pub struct RigOpenAiAdapter {
    config: ProviderConfig,
    fallback_models: Vec<Model>,
}

impl RigOpenAiAdapter {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self {
            config,
            fallback_models: default_openai_models(),
        })
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_rig_message(message: &ProviderMessage) -> Option<RigMessage> {
        match message.role {
            Role::System => None,
            Role::User => Some(RigMessage::user(message.content.clone())),
            Role::Assistant => Some(RigMessage::assistant(message.content.clone())),
        }
    }

    fn merged_preamble(request: &StreamRequest) -> Option<String> {
        // Rig takes one preamble string, so the host context and any
        // system-role turns are joined into it; user/assistant turns
        // still travel as chat messages.
        let mut parts = Vec::new();

        if let Some(context) = &request.context
            && !context.trim().is_empty()
        {
            parts.push(context.clone());
        }

        parts.extend(
            request
                .messages
                .iter()
                .filter(|message| {
                    matches!(message.role, Role::System) && !message.content.trim().is_empty()
                })
                .map(|message| message.content.clone()),
        );

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    async fn open_stream(
        config: &ProviderConfig,
        request: &StreamRequest,
    ) -> ProviderResult<RigStreamingResponse> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(request.model_id.clone());

        let mut messages = request
            .messages
            .iter()
            .filter_map(Self::to_rig_message)
            .collect::<Vec<_>>();

        // System turns were folded into the preamble; if nothing else
        // remains there is no prompt to send.
        let Some(prompt) = messages.pop() else {
            tracing::warn!(
                generation = ?request.generation,
                model_id = %request.model_id,
                "no chat turns left after preamble folding"
            );
            return EmptyMessageSetSnafu {
                stage: "open-stream-prompt",
                generation: request.generation,
            }
            .fail();
        };
        let mut builder = model.completion_request(prompt).messages(messages);

        if let Some(preamble) = Self::merged_preamble(request) {
            builder = builder.preamble(preamble);
        }

        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        })
    }

    fn emit_error_event(
        event_tx: &mpsc::UnboundedSender<StreamEvent>,
        generation: GenerationId,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEvent {
            generation,
            payload: StreamEventPayload::Error(error.to_string()),
        });
    }

    fn map_stream_item<R>(
        generation: GenerationId,
        item: StreamedAssistantContent<R>,
    ) -> Option<StreamEvent>
    where
        R: Clone + Unpin,
    {
        let payload = match item {
            StreamedAssistantContent::Text(text) => StreamEventPayload::Delta(text.text),
            // Reasoning fragments and tool-call items are provider-internal
            // here; the session core only consumes visible assistant text.
            StreamedAssistantContent::Reasoning(_)
            | StreamedAssistantContent::ReasoningDelta { .. }
            | StreamedAssistantContent::ToolCall { .. }
            | StreamedAssistantContent::ToolCallDelta { .. }
            | StreamedAssistantContent::Final(_) => return None,
        };

        Some(StreamEvent {
            generation,
            payload,
        })
    }

    async fn run_stream_worker(
        config: ProviderConfig,
        request: StreamRequest,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let generation = request.generation;
        let mut stream = match Self::open_stream(&config, &request).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(
                    generation = ?generation,
                    provider_id = %config.provider_id,
                    model_id = %request.model_id,
                    error = %error,
                    "opening the provider stream failed"
                );
                Self::emit_error_event(&event_tx, generation, error);
                return;
            }
        };

        enum Outcome {
            Drained,
            Cancelled,
            Failed,
        }

        let outcome = loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    // Stop upstream IO as soon as the session cancels.
                    tracing::debug!(generation = ?generation, "generation cancelled by session");
                    stream.cancel();
                    break Outcome::Cancelled;
                }
                next_item = stream.next() => {
                    match next_item {
                        Some(Ok(item)) => {
                            if let Some(mapped) = Self::map_stream_item(generation, item)
                                && event_tx.send(mapped).is_err()
                            {
                                // Receiver dropped; nobody is listening.
                                return;
                            }
                        }
                        Some(Err(source)) => {
                            tracing::warn!(
                                generation = ?generation,
                                error = %source,
                                "provider stream produced an error item"
                            );
                            let error = ProviderError::CompletionsFailed {
                                stage: "stream-chunk",
                                source,
                            };
                            Self::emit_error_event(&event_tx, generation, error);
                            break Outcome::Failed;
                        }
                        None => break Outcome::Drained,
                    }
                }
            }
        };

        if matches!(outcome, Outcome::Drained) {
            let _ = event_tx.send(StreamEvent {
                generation,
                payload: StreamEventPayload::Done {
                    tool_results: Vec::new(),
                },
            });
        }
    }
}

impl LlmProvider for RigOpenAiAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        "Rig OpenAI"
    }

    fn default_model(&self) -> &str {
        self.config
            .default_model
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_MODEL)
    }

    fn fallback_models(&self) -> &[Model] {
        &self.fallback_models
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.messages.is_empty(),
            EmptyMessageSetSnafu {
                stage: "stream-chat",
                generation: request.generation,
            }
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.generation);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.config.clone(),
            request,
            event_tx,
            cancel_rx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }
}
