use pagetalk_llm::GenerationId;

/// Stream lifecycle state for the session.
///
/// `Submitting` covers the window between placeholder insertion and the
/// first chunk; `Streaming` begins once chunks arrive. Terminal states
/// keep their generation so late events can be attributed in logs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Submitting(GenerationId),
    Streaming(GenerationId),
    Done(GenerationId),
    Error {
        generation: GenerationId,
        message: String,
    },
    Cancelled(GenerationId),
}

/// State transition input for the stream lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Start(GenerationId),
    /// First chunk observed; `Submitting` becomes `Streaming`.
    Open(GenerationId),
    Complete(GenerationId),
    Fail {
        generation: GenerationId,
        message: String,
    },
    Cancel(GenerationId),
    ResetToIdle,
}

/// Rejection reason for illegal stream transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyActive {
        active: GenerationId,
        attempted: GenerationId,
    },
    NoActiveGeneration,
    GenerationMismatch {
        active: GenerationId,
        attempted: GenerationId,
    },
}

pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    /// Returns the in-flight generation, if any.
    pub fn active_generation(&self) -> Option<GenerationId> {
        match self {
            Self::Submitting(generation) | Self::Streaming(generation) => Some(*generation),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_generation().is_some()
    }

    /// Returns true when an incoming stream event matches the active
    /// generation. Every asynchronous result must pass this guard before
    /// it may mutate the transcript.
    pub fn accepts_stream_event(&self, generation: GenerationId) -> bool {
        self.active_generation() == Some(generation)
    }

    /// Applies one transition deterministically.
    ///
    /// Non-active states may start a new generation directly. `Open` and
    /// every terminal transition (`Complete`/`Fail`/`Cancel`) must match
    /// the currently active generation exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Start(generation) => self.apply_start(generation),
            StreamTransition::Open(generation) => self.apply_open(generation),
            StreamTransition::Complete(generation) => {
                self.apply_terminal(generation, StreamState::Done(generation))
            }
            StreamTransition::Fail {
                generation,
                message,
            } => self.apply_terminal(
                generation,
                StreamState::Error {
                    generation,
                    message,
                },
            ),
            StreamTransition::Cancel(generation) => {
                self.apply_terminal(generation, StreamState::Cancelled(generation))
            }
            StreamTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_start(&self, generation: GenerationId) -> StreamTransitionResult {
        match self.active_generation() {
            Some(active) if active != generation => Err(StreamTransitionRejection::AlreadyActive {
                active,
                attempted: generation,
            }),
            Some(_) => Ok(self.clone()),
            None => Ok(Self::Submitting(generation)),
        }
    }

    fn apply_open(&self, generation: GenerationId) -> StreamTransitionResult {
        match self {
            Self::Submitting(active) if *active == generation => Ok(Self::Streaming(generation)),
            // Already streaming this generation; later chunks are applied
            // without a state change.
            Self::Streaming(active) if *active == generation => Ok(self.clone()),
            Self::Submitting(active) | Self::Streaming(active) => {
                Err(StreamTransitionRejection::GenerationMismatch {
                    active: *active,
                    attempted: generation,
                })
            }
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => {
                Err(StreamTransitionRejection::NoActiveGeneration)
            }
        }
    }

    fn apply_terminal(
        &self,
        generation: GenerationId,
        next: StreamState,
    ) -> StreamTransitionResult {
        match self.active_generation() {
            Some(active) if active == generation => Ok(next),
            Some(active) => Err(StreamTransitionRejection::GenerationMismatch {
                active,
                attempted: generation,
            }),
            None => Err(StreamTransitionRejection::NoActiveGeneration),
        }
    }
}
