pub use pagetalk_llm as llm;

mod capabilities;
mod config;
mod coordinator;
mod instant_input;
mod message;
mod selector;
mod session;
mod state;
mod store;

pub use capabilities::{
    Clipboard, ClipboardError, INSTANT_INPUT_KEY, Notifier, SuggestionLoadError, SuggestionSource,
};
pub use config::{
    DEFAULT_ENDPOINT, DEFAULT_PROVIDER_ID, ModelSettings, ProviderSettings, SETTINGS_DIRECTORY_NAME,
    SETTINGS_FILE_NAME, SettingsError, SettingsStore,
};
pub use coordinator::{GenerationOptions, StreamingCoordinator};
pub use instant_input::{INSTANT_INPUT_TRIGGERS, InstantInputGate, has_trigger_prefix};
pub use message::{Message, MessageId, MessagePayload, MessageStatus, Role};
pub use selector::{ModelSelection, provider_for_model};
pub use session::ChatSession;
pub use state::{StreamState, StreamTransition, StreamTransitionRejection, StreamTransitionResult};
pub use store::{Transcript, TruncateMode};
