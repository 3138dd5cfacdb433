//! Boundary traits for host capabilities the session consumes but does
//! not implement: suggestion storage, the clipboard, and transient
//! notifications. All are opaque collaborators; none can fail the
//! session itself.

use pagetalk_llm::BoxFuture;
use snafu::Snafu;

/// Fixed key under which the host stores instant-input templates.
pub const INSTANT_INPUT_KEY: &str = "instant-inputs";

#[derive(Debug, Snafu)]
#[snafu(display("failed to load suggestions for '{key}': {message}"))]
pub struct SuggestionLoadError {
    pub key: String,
    pub message: String,
}

/// Async key-value read for instant-input suggestion templates.
pub trait SuggestionSource: Send + Sync {
    fn read(&self, key: &str) -> BoxFuture<'_, Result<Vec<String>, SuggestionLoadError>>;
}

#[derive(Debug, Snafu)]
#[snafu(display("clipboard write failed: {message}"))]
pub struct ClipboardError {
    pub message: String,
}

/// Host clipboard write capability.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: String) -> BoxFuture<'_, Result<(), ClipboardError>>;
}

/// Transient confirmation toasts.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}
