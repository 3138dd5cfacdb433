use std::sync::Arc;

use pagetalk_llm::{
    GenerationId, LlmProvider, ProviderEventStream, ProviderMessage, Role as ProviderRole,
    StreamEvent, StreamEventPayload, StreamRequest,
};
use tokio::task::JoinHandle;

use crate::message::{Message, MessageId, MessagePayload, MessageStatus};
use crate::selector::ModelSelection;
use crate::state::{StreamState, StreamTransition};
use crate::store::Transcript;

/// Per-generation bookkeeping kept outside the domain model.
struct ActiveGeneration {
    generation: GenerationId,
    assistant_id: MessageId,
    buffer: String,
    events: ProviderEventStream,
    worker: Option<JoinHandle<()>>,
}

/// Sampling/context knobs the session passes to each generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub context: Option<String>,
    pub tools: Vec<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

/// Drives at most one generation at a time against the chat capability.
///
/// Chunk accumulation happens here: the stored assistant message is
/// always replaced with the full buffer, never patched with a raw
/// delta, so any reader sees a consistent frame. Every event is guarded
/// by its generation id before it may touch the transcript.
pub struct StreamingCoordinator {
    provider: Arc<dyn LlmProvider>,
    next_generation: u64,
    active: Option<ActiveGeneration>,
}

impl StreamingCoordinator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            next_generation: 1,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_generation(&self) -> Option<GenerationId> {
        self.active.as_ref().map(|active| active.generation)
    }

    /// Starts a new generation, superseding any active one.
    ///
    /// The caller must have already placed the full prompt history in
    /// `transcript`; no user message is appended here, so edit and
    /// refresh reuse this path without duplicating their user turn.
    pub fn begin(
        &mut self,
        transcript: &mut Transcript,
        state: &mut StreamState,
        selection: &ModelSelection,
        options: &GenerationOptions,
    ) {
        if self.active.is_some() {
            // Supersede: the prior generation is cancelled before the new
            // one reaches Submitting.
            self.cancel(transcript, state);
        }

        let generation = GenerationId::new(self.next_generation);
        self.next_generation = self.next_generation.saturating_add(1);

        match state.apply(StreamTransition::Start(generation)) {
            Ok(next) => *state = next,
            Err(rejection) => {
                tracing::warn!(?generation, ?rejection, "start transition rejected");
                return;
            }
        }

        let history = Self::provider_messages(transcript);

        let (next, assistant_id) = transcript.append(MessagePayload::Assistant {
            content: String::new(),
            status: MessageStatus::Streaming(generation),
        });
        *transcript = next;

        let mut request = StreamRequest::new(generation, selection.model_id.clone(), history)
            .with_tools(options.tools.clone());
        if let Some(context) = &options.context {
            request = request.with_context(context.clone());
        }
        if let Some(temperature) = options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        tracing::debug!(
            ?generation,
            provider_id = %selection.provider_id,
            model_id = %selection.model_id,
            history_len = transcript.len() - 1,
            "starting generation"
        );

        match self.provider.stream_chat(request) {
            Ok(handle) => {
                let worker = tokio::spawn(handle.worker);
                self.active = Some(ActiveGeneration {
                    generation,
                    assistant_id,
                    buffer: String::new(),
                    events: handle.stream,
                    worker: Some(worker),
                });
            }
            Err(error) => {
                tracing::error!(?generation, error = %error, "failed to start provider stream");
                Self::finalize_tail(
                    transcript,
                    state,
                    assistant_id,
                    String::new(),
                    MessageStatus::Error(error.to_string()),
                    StreamTransition::Fail {
                        generation,
                        message: error.to_string(),
                    },
                );
            }
        }
    }

    /// Awaits the next event from the active generation.
    ///
    /// `None` means either no generation is active or its channel closed;
    /// callers distinguish the two via `is_active` and must follow a
    /// closed channel with `finalize_closed`.
    pub async fn recv_event(&mut self) -> Option<StreamEvent> {
        let active = self.active.as_mut()?;
        active.events.recv().await
    }

    /// Applies one stream event against the latest snapshots.
    ///
    /// Events from a superseded or finished generation are discarded
    /// silently; this guard is mandatory even under cooperative
    /// scheduling because cancel-then-resend makes generations logically
    /// concurrent.
    pub fn apply(
        &mut self,
        event: StreamEvent,
        transcript: &mut Transcript,
        state: &mut StreamState,
    ) {
        let accepted = match &self.active {
            Some(active) => {
                active.generation == event.generation
                    && state.accepts_stream_event(event.generation)
            }
            None => false,
        };

        if !accepted {
            tracing::debug!(generation = ?event.generation, "discarding stale stream event");
            return;
        }

        match event.payload {
            StreamEventPayload::Delta(chunk) => {
                self.apply_delta(event.generation, chunk, transcript, state)
            }
            StreamEventPayload::Done { tool_results } => {
                let Some(active) = self.active.take() else {
                    return;
                };
                Self::finalize_tail(
                    transcript,
                    state,
                    active.assistant_id,
                    active.buffer,
                    MessageStatus::Done,
                    StreamTransition::Complete(active.generation),
                );

                // Tool results arrive only after the text stream drained;
                // they become a second message, never a merge.
                if !tool_results.is_empty() {
                    let (next, _) = transcript.append(MessagePayload::Tool {
                        results: tool_results,
                    });
                    *transcript = next;
                }
            }
            StreamEventPayload::Error(description) => {
                let Some(active) = self.active.take() else {
                    return;
                };
                tracing::warn!(
                    generation = ?active.generation,
                    error = %description,
                    "generation failed"
                );
                Self::finalize_tail(
                    transcript,
                    state,
                    active.assistant_id,
                    active.buffer,
                    MessageStatus::Error(description.clone()),
                    StreamTransition::Fail {
                        generation: active.generation,
                        message: description,
                    },
                );
            }
        }
    }

    fn apply_delta(
        &mut self,
        generation: GenerationId,
        chunk: String,
        transcript: &mut Transcript,
        state: &mut StreamState,
    ) {
        if matches!(state, StreamState::Submitting(_)) {
            match state.apply(StreamTransition::Open(generation)) {
                Ok(next) => *state = next,
                Err(rejection) => {
                    tracing::warn!(?generation, ?rejection, "open transition rejected");
                    return;
                }
            }
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };

        active.buffer.push_str(&chunk);
        let message = Message::assistant(
            active.assistant_id,
            active.buffer.clone(),
            MessageStatus::Streaming(active.generation),
        );
        *transcript = transcript.replace_tail(message);
    }

    /// Cancels the active generation, if any.
    ///
    /// The last applied buffer content is retained as final; cancellation
    /// is a normal termination, never an error.
    pub fn cancel(&mut self, transcript: &mut Transcript, state: &mut StreamState) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        active.events.cancel();
        // The worker winds down cooperatively once it observes the signal.
        active.worker.take();

        tracing::debug!(generation = ?active.generation, "generation cancelled");
        Self::finalize_tail(
            transcript,
            state,
            active.assistant_id,
            active.buffer,
            MessageStatus::Cancelled,
            StreamTransition::Cancel(active.generation),
        );
    }

    /// Handles the event channel closing without a terminal event, which
    /// indicates the provider worker died mid-generation.
    pub fn finalize_closed(&mut self, transcript: &mut Transcript, state: &mut StreamState) {
        let Some(active) = self.active.take() else {
            return;
        };

        let description = "provider stream ended before a terminal event".to_string();
        tracing::warn!(generation = ?active.generation, "{description}");
        Self::finalize_tail(
            transcript,
            state,
            active.assistant_id,
            active.buffer,
            MessageStatus::Error(description.clone()),
            StreamTransition::Fail {
                generation: active.generation,
                message: description,
            },
        );
    }

    fn finalize_tail(
        transcript: &mut Transcript,
        state: &mut StreamState,
        assistant_id: MessageId,
        content: String,
        status: MessageStatus,
        transition: StreamTransition,
    ) {
        debug_assert_eq!(
            transcript.last().map(|message| message.id),
            Some(assistant_id),
            "streaming placeholder must occupy the tail while active"
        );

        let message = Message::assistant(assistant_id, content, status);
        *transcript = transcript.replace_tail(message);

        match state.apply(transition) {
            Ok(next) => *state = next,
            Err(rejection) => {
                tracing::warn!(?rejection, "terminal transition rejected");
            }
        }
    }

    fn provider_messages(transcript: &Transcript) -> Vec<ProviderMessage> {
        transcript
            .messages()
            .iter()
            .filter_map(|message| match &message.payload {
                MessagePayload::User { content } if !content.trim().is_empty() => {
                    Some(ProviderMessage::new(ProviderRole::User, content.clone()))
                }
                MessagePayload::Assistant { content, status }
                    if !matches!(status, MessageStatus::Streaming(_))
                        && !content.trim().is_empty() =>
                {
                    Some(ProviderMessage::new(
                        ProviderRole::Assistant,
                        content.clone(),
                    ))
                }
                // Tool results stay in the transcript but are not replayed
                // upstream; the provider vocabulary is user/assistant.
                _ => None,
            })
            .collect()
    }
}
