use crate::message::{Message, MessageId, MessagePayload};

/// Policy for where a truncation cut lands relative to the target id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateMode {
    /// Keep the target message; drop everything after it.
    Inclusive,
    /// Drop the target message and everything after it.
    Exclusive,
}

/// Ordered message sequence with snapshot-replace semantics.
///
/// Every operation returns a new `Transcript`; the current snapshot is
/// never mutated in place, so a reader holding a clone can never observe
/// a partially-updated list. The id counter lives here and only ever
/// moves forward, surviving truncation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages currently in the `Streaming` status.
    ///
    /// The session invariant keeps this at most 1; exposed so callers
    /// and tests can check it directly.
    pub fn streaming_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.is_streaming())
            .count()
    }

    /// Appends a message built from `payload`, allocating its id from
    /// the monotonic counter.
    pub fn append(&self, payload: MessagePayload) -> (Self, MessageId) {
        let id = MessageId::new(self.next_id);
        let mut messages = self.messages.clone();
        messages.push(Message::new(id, payload));
        (
            Self {
                messages,
                next_id: self.next_id.saturating_add(1),
            },
            id,
        )
    }

    /// Replaces the last message. No-op on an empty transcript.
    pub fn replace_tail(&self, message: Message) -> Self {
        if self.messages.is_empty() {
            return self.clone();
        }

        let mut messages = self.messages.clone();
        let tail = messages.len() - 1;
        messages[tail] = message;
        Self {
            messages,
            next_id: self.next_id,
        }
    }

    /// Returns the prefix of the sequence up to `id`, per `mode`.
    /// An id not present in the sequence is a no-op.
    pub fn truncate_at(&self, id: MessageId, mode: TruncateMode) -> Self {
        let Some(position) = self.messages.iter().position(|message| message.id == id) else {
            return self.clone();
        };

        let keep = match mode {
            TruncateMode::Inclusive => position + 1,
            TruncateMode::Exclusive => position,
        };

        Self {
            messages: self.messages[..keep].to_vec(),
            next_id: self.next_id,
        }
    }

    /// Rewrites a user message's content, keeping its id. Used by the
    /// edit flow. No-op for a missing id or a non-user message.
    pub fn rewrite_user_content(&self, id: MessageId, content: impl Into<String>) -> Self {
        let Some(position) = self.messages.iter().position(|message| message.id == id) else {
            return self.clone();
        };

        if !matches!(self.messages[position].payload, MessagePayload::User { .. }) {
            return self.clone();
        }

        let mut messages = self.messages.clone();
        messages[position] = Message::user(id, content);
        Self {
            messages,
            next_id: self.next_id,
        }
    }
}
