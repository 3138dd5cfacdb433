use pagetalk_llm::{GenerationId, ToolOutcome};

/// Stable identifier for one message.
///
/// Allocated from the transcript's monotonic counter, never from the
/// sequence length, so ids stay unique across truncation and edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// Lifecycle status for an assistant message.
///
/// `Streaming` with empty content is the thinking placeholder inserted
/// when a generation starts; no sentinel text ever enters the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Streaming(GenerationId),
    Done,
    Error(String),
    Cancelled,
}

/// Role-specific message payload.
///
/// Each variant carries only the fields meaningful to its role, so
/// invalid combinations (a tool message "thinking", a user message with
/// an error flag) cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    User { content: String },
    Assistant { content: String, status: MessageStatus },
    Tool { results: Vec<ToolOutcome> },
}

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: MessagePayload,
}

impl Message {
    pub fn new(id: MessageId, payload: MessagePayload) -> Self {
        Self { id, payload }
    }

    /// Creates a completed user message.
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(
            id,
            MessagePayload::User {
                content: content.into(),
            },
        )
    }

    /// Creates an assistant message with explicit status.
    pub fn assistant(id: MessageId, content: impl Into<String>, status: MessageStatus) -> Self {
        Self::new(
            id,
            MessagePayload::Assistant {
                content: content.into(),
                status,
            },
        )
    }

    /// Creates the assistant placeholder inserted at generation start.
    pub fn assistant_streaming(id: MessageId, generation: GenerationId) -> Self {
        Self::assistant(id, String::new(), MessageStatus::Streaming(generation))
    }

    /// Creates a tool-result message.
    pub fn tool(id: MessageId, results: Vec<ToolOutcome>) -> Self {
        Self::new(id, MessagePayload::Tool { results })
    }

    pub fn role(&self) -> Role {
        match &self.payload {
            MessagePayload::User { .. } => Role::User,
            MessagePayload::Assistant { .. } => Role::Assistant,
            MessagePayload::Tool { .. } => Role::Tool,
        }
    }

    /// Text content for user/assistant messages; `None` for tool messages.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::User { content } | MessagePayload::Assistant { content, .. } => {
                Some(content)
            }
            MessagePayload::Tool { .. } => None,
        }
    }

    /// Lifecycle status; `None` for roles without one.
    pub fn status(&self) -> Option<&MessageStatus> {
        match &self.payload {
            MessagePayload::Assistant { status, .. } => Some(status),
            MessagePayload::User { .. } | MessagePayload::Tool { .. } => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.status(), Some(MessageStatus::Streaming(_)))
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status(), Some(MessageStatus::Done))
    }
}
