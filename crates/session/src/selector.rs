/// Maps a model identifier to the provider that serves it.
///
/// Pure prefix mapping; unrecognized identifiers fall through to the
/// OpenAI-compatible default.
pub fn provider_for_model(model_id: &str) -> &'static str {
    let id = model_id.trim().to_ascii_lowercase();
    if id.starts_with("gemini") {
        "gemini"
    } else if id.starts_with("deepseek") {
        "deepseek"
    } else if id.starts_with("llama") || id.starts_with("mixtral") {
        "groq"
    } else {
        "openai"
    }
}

/// The session's active `(provider, model)` pair.
///
/// Updating the selection only affects the NEXT generation; an in-flight
/// stream keeps the pair it was started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub provider_id: String,
    pub model_id: String,
}

impl ModelSelection {
    pub fn for_model(model_id: impl Into<String>) -> Self {
        let model_id = model_id.into().trim().to_string();
        Self {
            provider_id: provider_for_model(&model_id).to_string(),
            model_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_prefixes_map_to_their_providers() {
        assert_eq!(provider_for_model("gpt-4o-mini"), "openai");
        assert_eq!(provider_for_model("o3"), "openai");
        assert_eq!(provider_for_model("gemini-2.0-flash"), "gemini");
        assert_eq!(provider_for_model("deepseek-chat"), "deepseek");
        assert_eq!(provider_for_model("llama-3.3-70b"), "groq");
        assert_eq!(provider_for_model("something-unknown"), "openai");
    }

    #[test]
    fn selection_pairs_model_with_provider() {
        let selection = ModelSelection::for_model("  gemini-2.0-flash  ");
        assert_eq!(selection.provider_id, "gemini");
        assert_eq!(selection.model_id, "gemini-2.0-flash");
    }
}
