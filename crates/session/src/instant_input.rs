use std::sync::Arc;

use crate::capabilities::{INSTANT_INPUT_KEY, SuggestionSource};

/// The two equivalent trigger prefixes: ASCII and full-width question
/// mark, each followed by a space.
pub const INSTANT_INPUT_TRIGGERS: [&str; 2] = ["? ", "\u{ff1f} "];

/// Returns true when the compose text begins with a trigger prefix.
pub fn has_trigger_prefix(text: &str) -> bool {
    INSTANT_INPUT_TRIGGERS
        .iter()
        .any(|trigger| text.starts_with(trigger))
}

/// Surfaces the instant-input suggestion list while the compose box
/// starts with a trigger prefix.
///
/// Purely advisory: holds no history state and cannot fail the session.
/// A failed suggestion load simply yields an empty list.
pub struct InstantInputGate {
    source: Arc<dyn SuggestionSource>,
    suggestions: Vec<String>,
    open: bool,
}

impl InstantInputGate {
    pub fn new(source: Arc<dyn SuggestionSource>) -> Self {
        Self {
            source,
            suggestions: Vec::new(),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// Reacts to a compose-box edit: a trigger prefix loads and shows
    /// the list, any other edit dismisses it.
    pub async fn input_changed(&mut self, text: &str) {
        if !has_trigger_prefix(text) {
            self.dismiss();
            return;
        }

        self.suggestions = match self.source.read(INSTANT_INPUT_KEY).await {
            Ok(suggestions) => suggestions,
            Err(error) => {
                tracing::warn!(error = %error, "suggestion load failed; showing empty list");
                Vec::new()
            }
        };
        self.open = true;
    }

    /// Picks a suggestion, returning the replacement compose content and
    /// dismissing the list.
    pub fn select(&mut self, index: usize) -> Option<String> {
        let suggestion = self.suggestions.get(index).cloned()?;
        self.dismiss();
        Some(suggestion)
    }

    pub fn dismiss(&mut self) {
        self.open = false;
        self.suggestions.clear();
    }
}
