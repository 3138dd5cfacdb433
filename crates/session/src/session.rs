use std::sync::Arc;

use pagetalk_llm::{GenerationId, LlmProvider, StreamEvent};

use crate::capabilities::{Clipboard, Notifier};
use crate::config::ProviderSettings;
use crate::coordinator::{GenerationOptions, StreamingCoordinator};
use crate::message::{Message, MessageId, MessagePayload, Role};
use crate::selector::ModelSelection;
use crate::state::StreamState;
use crate::store::{Transcript, TruncateMode};

/// Owns one conversation: the transcript, the stream state machine, the
/// single cancellable generation, and the active model selection.
///
/// Scheduling is cooperative: mutations happen synchronously, and the
/// caller pumps the active generation with `next_event`/`run_until_idle`.
/// Precondition violations (empty input, missing edit target, thin
/// history) are silent no-ops; generation failures become message state
/// and never escape to the caller.
pub struct ChatSession {
    transcript: Transcript,
    stream_state: StreamState,
    coordinator: StreamingCoordinator,
    selection: ModelSelection,
    options: GenerationOptions,
    editing: Option<MessageId>,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let selection = ModelSelection::for_model(provider.default_model());
        Self {
            transcript: Transcript::new(),
            stream_state: StreamState::Idle,
            coordinator: StreamingCoordinator::new(provider),
            selection,
            options: GenerationOptions::default(),
            editing: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn stream_state(&self) -> &StreamState {
        &self.stream_state
    }

    pub fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    pub fn is_generating(&self) -> bool {
        self.coordinator.is_active()
    }

    pub fn active_generation(&self) -> Option<GenerationId> {
        self.coordinator.active_generation()
    }

    pub fn editing_target(&self) -> Option<MessageId> {
        self.editing
    }

    /// Updates the active `(provider, model)` pair, consulted by the
    /// NEXT generation only; an in-flight stream is unaffected.
    pub fn select_model(&mut self, model_id: &str) {
        self.selection = ModelSelection::for_model(model_id);
        tracing::debug!(
            provider_id = %self.selection.provider_id,
            model_id = %self.selection.model_id,
            "model selection updated"
        );
    }

    /// Applies stored provider settings: selects the configured default
    /// model and carries its max-token cap into subsequent generations.
    pub fn apply_settings(&mut self, settings: &ProviderSettings) {
        let model = settings.default_model_name();
        self.options.max_tokens = settings.model_max_tokens(&model);
        self.select_model(&model);
    }

    /// Sets the host context (page content) sent with each generation.
    pub fn set_context(&mut self, context: Option<String>) {
        self.options.context = context;
    }

    pub fn set_tools(&mut self, tools: Vec<String>) {
        self.options.tools = tools;
    }

    pub fn set_temperature(&mut self, temperature: Option<f64>) {
        self.options.temperature = temperature;
    }

    pub fn set_max_tokens(&mut self, max_tokens: Option<u64>) {
        self.options.max_tokens = max_tokens;
    }

    /// Sends a user message, starting a generation.
    ///
    /// Empty trimmed text is a no-op. An active generation is superseded:
    /// cancelled, its output retained, before the new one starts.
    pub fn send(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            tracing::debug!("ignoring send with empty content");
            return;
        }

        if self.coordinator.is_active() {
            self.coordinator
                .cancel(&mut self.transcript, &mut self.stream_state);
        }

        let (next, _) = self.transcript.append(MessagePayload::User {
            content: trimmed.to_string(),
        });
        self.transcript = next;
        self.begin_generation();
    }

    /// Enters edit mode for a past user message, returning the content
    /// to prefill the compose box. No history mutation happens here.
    ///
    /// No-op (returns `None`) while a generation is active or when the
    /// target is missing or not a user message.
    pub fn begin_edit(&mut self, id: MessageId) -> Option<String> {
        if self.coordinator.is_active() {
            tracing::debug!(?id, "editing is disabled while streaming");
            return None;
        }

        let message = self.transcript.get(id)?;
        if message.role() != Role::User {
            tracing::debug!(?id, "only user messages can be edited");
            return None;
        }

        let prefill = message.text().map(str::to_string);
        self.editing = Some(id);
        prefill
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Submits an edit: rewrites the target in place, truncates
    /// everything after it, and regenerates from the edited history.
    /// The edited message stands in for the user turn; nothing is
    /// appended.
    pub fn submit_edit(&mut self, content: &str) {
        let Some(target) = self.editing else {
            return;
        };

        let trimmed = content.trim();
        if trimmed.is_empty() || self.coordinator.is_active() {
            return;
        }

        self.transcript = self.transcript.rewrite_user_content(target, trimmed);
        self.transcript = self.transcript.truncate_at(target, TruncateMode::Inclusive);
        self.editing = None;
        self.begin_generation();
    }

    /// Regenerates the most recent answer.
    ///
    /// Walks back over trailing tool messages and requires an assistant
    /// message directly preceded by a user message; that pair is replaced
    /// by the user message plus a fresh generation. Any other tail shape,
    /// a thin history, or an active generation is a no-op.
    pub fn refresh(&mut self) {
        if self.coordinator.is_active() || self.transcript.len() < 2 {
            return;
        }

        let Some(anchor) = refresh_anchor(&self.transcript) else {
            tracing::debug!("refresh skipped: tail is not a user/assistant pair");
            return;
        };

        self.transcript = self.transcript.truncate_at(anchor, TruncateMode::Inclusive);
        self.begin_generation();
    }

    /// Cancels the active generation, retaining streamed content.
    pub fn cancel(&mut self) {
        self.coordinator
            .cancel(&mut self.transcript, &mut self.stream_state);
    }

    /// Pumps one event from the active generation.
    ///
    /// Returns false once there is nothing left to pump. A channel that
    /// closes without a terminal event finalizes the generation as an
    /// error.
    pub async fn next_event(&mut self) -> bool {
        if !self.coordinator.is_active() {
            return false;
        }

        match self.coordinator.recv_event().await {
            Some(event) => self.apply_stream_event(event),
            None => self
                .coordinator
                .finalize_closed(&mut self.transcript, &mut self.stream_state),
        }
        true
    }

    /// Drains the active generation to its terminal state.
    pub async fn run_until_idle(&mut self) {
        while self.next_event().await {}
    }

    pub(crate) fn apply_stream_event(&mut self, event: StreamEvent) {
        self.coordinator
            .apply(event, &mut self.transcript, &mut self.stream_state);
    }

    /// Copies a message's text to the host clipboard with a confirmation
    /// toast. Returns false for tool messages, empty content, or a
    /// failed clipboard write.
    pub async fn copy_message(
        &self,
        id: MessageId,
        clipboard: &dyn Clipboard,
        notifier: &dyn Notifier,
    ) -> bool {
        let Some(text) = self
            .transcript
            .get(id)
            .and_then(Message::text)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
        else {
            return false;
        };

        match clipboard.write_text(text).await {
            Ok(()) => {
                notifier.notify("Copied.");
                true
            }
            Err(error) => {
                tracing::warn!(error = %error, "clipboard write failed");
                false
            }
        }
    }

    fn begin_generation(&mut self) {
        self.coordinator.begin(
            &mut self.transcript,
            &mut self.stream_state,
            &self.selection,
            &self.options,
        );
    }
}

/// Finds the user message anchoring the most recent user/assistant pair,
/// ignoring trailing tool messages.
fn refresh_anchor(transcript: &Transcript) -> Option<MessageId> {
    let messages = transcript.messages();
    let mut index = messages.len();
    while index > 0 && messages[index - 1].role() == Role::Tool {
        index -= 1;
    }

    if index < 2 {
        return None;
    }

    let assistant = &messages[index - 1];
    let user = &messages[index - 2];
    (assistant.role() == Role::Assistant && user.role() == Role::User).then_some(user.id)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use pagetalk_llm::{
        LlmProvider, Model, ProviderError, ProviderResult, ProviderStreamHandle, StreamEvent,
        StreamEventPayload, StreamRequest, ToolOutcome, make_event_stream,
    };

    use super::*;
    use crate::message::MessageStatus;

    /// In-memory capability fake: each `stream_chat` call consumes the
    /// next script and queues its events up front.
    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<StreamRequest>>,
    }

    enum Script {
        Events(Vec<StreamEventPayload>),
        FailToStart,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<StreamRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn id(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn default_model(&self) -> &str {
            "gpt-4o-mini"
        }

        fn fallback_models(&self) -> &[Model] {
            &[]
        }

        fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Events(Vec::new()));
            let generation = request.generation;
            self.requests.lock().unwrap().push(request);

            match script {
                Script::FailToStart => Err(ProviderError::MissingApiKey {
                    stage: "test",
                    provider_id: "scripted".into(),
                }),
                Script::Events(payloads) => {
                    let (event_tx, stream, _cancel_rx) = make_event_stream(generation);
                    for payload in payloads {
                        let _ = event_tx.send(StreamEvent {
                            generation,
                            payload,
                        });
                    }
                    Ok(ProviderStreamHandle {
                        stream,
                        worker: Box::pin(async {}),
                    })
                }
            }
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn delta(text: &str) -> StreamEventPayload {
        StreamEventPayload::Delta(text.to_string())
    }

    fn done() -> StreamEventPayload {
        StreamEventPayload::Done {
            tool_results: Vec::new(),
        }
    }

    fn session_with(scripts: Vec<Script>) -> (ChatSession, Arc<ScriptedProvider>) {
        init_tracing();
        let provider = ScriptedProvider::new(scripts);
        (ChatSession::new(provider.clone()), provider)
    }

    fn assistant_content(session: &ChatSession, index: usize) -> &str {
        session.messages()[index].text().expect("text message")
    }

    #[tokio::test]
    async fn whitespace_only_send_is_a_noop() {
        let (mut session, provider) = session_with(vec![]);
        session.send("   \n\t ");

        assert!(session.messages().is_empty());
        assert_eq!(session.stream_state(), &StreamState::Idle);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn chunks_accumulate_in_order_into_one_complete_message() {
        let (mut session, _provider) =
            session_with(vec![Script::Events(vec![delta("Hi"), delta(" there"), done()])]);

        session.send("hello");
        assert_eq!(session.messages().len(), 2);
        assert!(session.messages()[1].is_streaming());
        assert_eq!(session.transcript().streaming_count(), 1);

        session.run_until_idle().await;

        assert_eq!(assistant_content(&session, 1), "Hi there");
        assert!(session.messages()[1].is_complete());
        assert_eq!(session.transcript().streaming_count(), 0);
        assert!(matches!(session.stream_state(), StreamState::Done(_)));
    }

    #[tokio::test]
    async fn cancel_mid_stream_retains_applied_content_and_discards_the_rest() {
        let (mut session, _provider) = session_with(vec![Script::Events(vec![
            delta("Hello"),
            delta(" wor"),
            delta("ld"),
            done(),
        ])]);

        session.send("hi");
        let generation = session.active_generation().expect("active generation");
        assert!(session.next_event().await);
        session.cancel();

        assert_eq!(assistant_content(&session, 1), "Hello");
        assert_eq!(
            session.messages()[1].status(),
            Some(&MessageStatus::Cancelled)
        );
        assert!(!session.messages()[1].is_complete());

        // Chunks resolving after cancellation must not mutate anything.
        let before = session.transcript().clone();
        session.apply_stream_event(StreamEvent {
            generation,
            payload: delta(" wor"),
        });
        session.apply_stream_event(StreamEvent {
            generation,
            payload: done(),
        });
        assert_eq!(session.transcript(), &before);
    }

    #[tokio::test]
    async fn send_while_streaming_supersedes_the_prior_generation() {
        let (mut session, _provider) = session_with(vec![
            Script::Events(vec![delta("old answer")]),
            Script::Events(vec![delta("fresh"), done()]),
        ]);

        session.send("first");
        let stale = session.active_generation().expect("active generation");
        assert!(session.next_event().await);

        session.send("second");
        assert_ne!(session.active_generation(), Some(stale));
        assert_eq!(session.transcript().streaming_count(), 1);

        session.run_until_idle().await;

        let roles = session
            .messages()
            .iter()
            .map(Message::role)
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(assistant_content(&session, 1), "old answer");
        assert_eq!(
            session.messages()[1].status(),
            Some(&MessageStatus::Cancelled)
        );
        assert_eq!(assistant_content(&session, 3), "fresh");
        assert!(session.messages()[3].is_complete());

        // A late chunk from the superseded generation is discarded.
        let before = session.transcript().clone();
        session.apply_stream_event(StreamEvent {
            generation: stale,
            payload: delta(" never"),
        });
        assert_eq!(session.transcript(), &before);
    }

    #[tokio::test]
    async fn edit_truncates_rewrites_and_regenerates_without_duplication() {
        let (mut session, provider) = session_with(vec![
            Script::Events(vec![delta("answer one"), done()]),
            Script::Events(vec![delta("answer two"), done()]),
        ]);

        session.send("question one");
        session.run_until_idle().await;
        assert_eq!(session.messages().len(), 2);
        let user_id = session.messages()[0].id;

        let prefill = session.begin_edit(user_id);
        assert_eq!(prefill.as_deref(), Some("question one"));
        assert_eq!(session.editing_target(), Some(user_id));

        session.submit_edit("question two");
        session.run_until_idle().await;

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].id, user_id);
        assert_eq!(session.messages()[0].text(), Some("question two"));
        assert_eq!(assistant_content(&session, 1), "answer two");
        // The regenerated placeholder got a fresh id, not a reused one.
        assert!(session.messages()[1].id > session.messages()[0].id);
        assert_ne!(session.messages()[1].id, MessageId::new(1));

        // The second request replayed exactly one user turn.
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 1);
        assert_eq!(requests[1].messages[0].content, "question two");
    }

    #[tokio::test]
    async fn begin_edit_rejects_non_user_targets_and_streaming_sessions() {
        let (mut session, _provider) = session_with(vec![
            Script::Events(vec![delta("answer"), done()]),
            Script::Events(vec![delta("unfinished")]),
        ]);

        session.send("question");
        session.run_until_idle().await;
        let assistant_id = session.messages()[1].id;
        assert_eq!(session.begin_edit(assistant_id), None);
        assert_eq!(session.begin_edit(MessageId::new(404)), None);

        session.send("again");
        let user_id = session.messages()[0].id;
        assert_eq!(session.begin_edit(user_id), None);
        assert_eq!(session.editing_target(), None);
    }

    #[tokio::test]
    async fn submit_edit_with_empty_content_changes_nothing() {
        let (mut session, _provider) =
            session_with(vec![Script::Events(vec![delta("answer"), done()])]);

        session.send("question");
        session.run_until_idle().await;
        let user_id = session.messages()[0].id;
        session.begin_edit(user_id);

        let before = session.transcript().clone();
        session.submit_edit("   ");
        assert_eq!(session.transcript(), &before);
        // Edit mode survives so the user can keep typing.
        assert_eq!(session.editing_target(), Some(user_id));

        session.cancel_edit();
        assert_eq!(session.editing_target(), None);
        session.submit_edit("orphaned");
        assert_eq!(session.transcript(), &before);
    }

    #[tokio::test]
    async fn refresh_replaces_the_last_exchange() {
        let (mut session, _provider) = session_with(vec![
            Script::Events(vec![delta("first answer"), done()]),
            Script::Events(vec![delta("second answer"), done()]),
        ]);

        session.send("question");
        session.run_until_idle().await;

        session.refresh();
        session.run_until_idle().await;

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].text(), Some("question"));
        assert_eq!(assistant_content(&session, 1), "second answer");
        assert!(session.messages()[1].is_complete());
    }

    #[tokio::test]
    async fn refresh_with_thin_history_is_a_noop() {
        let (mut session, provider) = session_with(vec![]);
        session.refresh();
        assert!(session.messages().is_empty());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn refresh_skips_trailing_tool_messages() {
        let (mut session, _provider) = session_with(vec![
            Script::Events(vec![
                delta("looked it up"),
                StreamEventPayload::Done {
                    tool_results: vec![ToolOutcome::new("call-1", "page-search", "3 hits")],
                },
            ]),
            Script::Events(vec![delta("regenerated"), done()]),
        ]);

        session.send("search the page");
        session.run_until_idle().await;
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[2].role(), Role::Tool);

        session.refresh();
        session.run_until_idle().await;

        assert_eq!(session.messages().len(), 2);
        assert_eq!(assistant_content(&session, 1), "regenerated");
    }

    #[test]
    fn refresh_anchor_rejects_non_pair_tails() {
        let transcript = Transcript::new();
        let (transcript, _) = transcript.append(MessagePayload::User {
            content: "one".into(),
        });
        let (transcript, _) = transcript.append(MessagePayload::User {
            content: "two".into(),
        });
        assert_eq!(refresh_anchor(&transcript), None);

        // A tool message with no pair underneath is equally rejected.
        let lone = Transcript::new();
        let (lone, _) = lone.append(MessagePayload::User {
            content: "only".into(),
        });
        let (lone, _) = lone.append(MessagePayload::Tool {
            results: Vec::new(),
        });
        assert_eq!(refresh_anchor(&lone), None);
    }

    #[tokio::test]
    async fn completed_generation_appends_tool_results_as_a_second_message() {
        let outcome = ToolOutcome::new("call-7", "page-extract", "table copied");
        let (mut session, _provider) = session_with(vec![Script::Events(vec![
            delta("done"),
            StreamEventPayload::Done {
                tool_results: vec![outcome.clone()],
            },
        ])]);

        session.send("extract the table");
        session.run_until_idle().await;

        assert_eq!(session.messages().len(), 3);
        assert!(session.messages()[1].is_complete());
        assert_eq!(
            session.messages()[2].payload,
            MessagePayload::Tool {
                results: vec![outcome]
            }
        );
    }

    #[tokio::test]
    async fn stream_error_surfaces_on_the_pending_message() {
        let (mut session, _provider) = session_with(vec![Script::Events(vec![
            delta("partial"),
            StreamEventPayload::Error("rate limited".into()),
        ])]);

        session.send("hello");
        session.run_until_idle().await;

        assert_eq!(session.messages().len(), 2);
        assert_eq!(assistant_content(&session, 1), "partial");
        assert_eq!(
            session.messages()[1].status(),
            Some(&MessageStatus::Error("rate limited".into()))
        );
        assert!(matches!(session.stream_state(), StreamState::Error { .. }));
    }

    #[tokio::test]
    async fn failure_to_start_finalizes_the_placeholder_as_error() {
        let (mut session, _provider) = session_with(vec![Script::FailToStart]);

        session.send("hello");

        assert!(!session.is_generating());
        assert_eq!(session.messages().len(), 2);
        assert!(matches!(
            session.messages()[1].status(),
            Some(MessageStatus::Error(_))
        ));
    }

    #[tokio::test]
    async fn channel_closing_without_terminal_event_is_an_error() {
        let (mut session, _provider) =
            session_with(vec![Script::Events(vec![delta("half an ans")])]);

        session.send("hello");
        session.run_until_idle().await;

        assert_eq!(assistant_content(&session, 1), "half an ans");
        assert!(matches!(
            session.messages()[1].status(),
            Some(MessageStatus::Error(_))
        ));
    }

    #[tokio::test]
    async fn model_selection_applies_to_the_next_generation_only() {
        let (mut session, provider) = session_with(vec![
            Script::Events(vec![delta("a"), done()]),
            Script::Events(vec![delta("b"), done()]),
        ]);

        session.send("one");
        session.select_model("gemini-2.0-flash");
        session.run_until_idle().await;

        session.send("two");
        session.run_until_idle().await;

        let requests = provider.requests();
        assert_eq!(requests[0].model_id, "gpt-4o-mini");
        assert_eq!(requests[1].model_id, "gemini-2.0-flash");
        assert_eq!(session.selection().provider_id, "gemini");
    }

    #[tokio::test]
    async fn applied_settings_select_the_model_and_its_token_cap() {
        use crate::config::{ModelSettings, ProviderSettings};

        let (mut session, provider) =
            session_with(vec![Script::Events(vec![delta("a"), done()])]);

        let settings = ProviderSettings {
            models: vec![ModelSettings {
                model_name: "deepseek-chat".into(),
                max_tokens: Some(2048),
            }],
            ..ProviderSettings::default()
        };
        session.apply_settings(&settings);

        session.send("hello");
        session.run_until_idle().await;

        let requests = provider.requests();
        assert_eq!(requests[0].model_id, "deepseek-chat");
        assert_eq!(requests[0].max_tokens, Some(2048));
        assert_eq!(session.selection().provider_id, "deepseek");
    }

    #[tokio::test]
    async fn at_most_one_streaming_message_across_a_busy_session() {
        let (mut session, _provider) = session_with(vec![
            Script::Events(vec![delta("one")]),
            Script::Events(vec![delta("two")]),
            Script::Events(vec![delta("three"), done()]),
        ]);

        session.send("a");
        assert!(session.transcript().streaming_count() <= 1);
        session.next_event().await;
        session.send("b");
        assert!(session.transcript().streaming_count() <= 1);
        session.next_event().await;
        session.send("c");
        assert!(session.transcript().streaming_count() <= 1);
        session.run_until_idle().await;
        assert_eq!(session.transcript().streaming_count(), 0);
    }

    mod copy {
        use super::*;
        use crate::capabilities::{Clipboard, ClipboardError, Notifier};
        use pagetalk_llm::BoxFuture;

        #[derive(Default)]
        struct RecordingClipboard {
            written: Mutex<Vec<String>>,
        }

        impl Clipboard for RecordingClipboard {
            fn write_text(&self, text: String) -> BoxFuture<'_, Result<(), ClipboardError>> {
                self.written.lock().unwrap().push(text);
                Box::pin(async { Ok(()) })
            }
        }

        #[derive(Default)]
        struct RecordingNotifier {
            toasts: Mutex<Vec<String>>,
        }

        impl Notifier for RecordingNotifier {
            fn notify(&self, message: &str) {
                self.toasts.lock().unwrap().push(message.to_string());
            }
        }

        #[tokio::test]
        async fn copy_writes_text_and_toasts() {
            let (mut session, _provider) =
                session_with(vec![Script::Events(vec![delta("the answer"), done()])]);
            session.send("question");
            session.run_until_idle().await;

            let clipboard = RecordingClipboard::default();
            let notifier = RecordingNotifier::default();
            let copied = session
                .copy_message(session.messages()[1].id, &clipboard, &notifier)
                .await;

            assert!(copied);
            assert_eq!(*clipboard.written.lock().unwrap(), vec!["the answer"]);
            assert_eq!(*notifier.toasts.lock().unwrap(), vec!["Copied."]);

            // Unknown ids copy nothing and stay silent.
            let missing = session
                .copy_message(MessageId::new(404), &clipboard, &notifier)
                .await;
            assert!(!missing);
            assert_eq!(clipboard.written.lock().unwrap().len(), 1);
        }
    }
}
