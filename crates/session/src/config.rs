use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use pagetalk_llm::{DEFAULT_OPENAI_MODEL, Model, ProviderConfig};

pub const DEFAULT_PROVIDER_ID: &str = "openai";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const SETTINGS_DIRECTORY_NAME: &str = "pagetalk";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model_name: String,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: None,
        }
    }
}

impl ModelSettings {
    fn normalized(mut self) -> Option<Self> {
        self.model_name = self.model_name.trim().to_string();
        if self.model_name.is_empty() {
            return None;
        }

        Some(self)
    }

    pub fn as_selector_model(&self) -> Model {
        let mut model = Model::from_id(self.model_name.clone());
        if let Some(value) = self.max_tokens {
            model = model.with_description(format!("max_tokens={value}"));
        }
        model
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_models")]
    pub models: Vec<ModelSettings>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            models: default_models(),
        }
    }
}

impl ProviderSettings {
    pub fn to_provider_config(&self) -> Option<ProviderConfig> {
        if self.api_key.trim().is_empty() {
            return None;
        }

        Some(ProviderConfig::new(
            &self.provider_id,
            &self.api_key,
            &self.endpoint,
            Some(self.default_model_name()),
        ))
    }

    pub fn is_valid(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn default_model_name(&self) -> String {
        self.models
            .iter()
            .map(|model| model.model_name.trim())
            .find(|name| !name.is_empty())
            .map_or_else(|| DEFAULT_OPENAI_MODEL.to_string(), str::to_string)
    }

    pub fn configured_models(&self) -> Vec<Model> {
        let models = self
            .models
            .iter()
            .filter_map(|model| model.clone().normalized())
            .map(|model| model.as_selector_model())
            .collect::<Vec<_>>();

        if models.is_empty() {
            vec![ModelSettings::default().as_selector_model()]
        } else {
            models
        }
    }

    pub fn model_max_tokens(&self, model_name: &str) -> Option<u64> {
        self.models
            .iter()
            .find(|model| model.model_name == model_name)
            .and_then(|model| model.max_tokens)
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = if self.provider_id.trim().is_empty() {
            default_provider_id()
        } else {
            self.provider_id.trim().to_string()
        };
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = if self.endpoint.trim().is_empty() {
            default_endpoint()
        } else {
            self.endpoint.trim().to_string()
        };

        // Blank model rows are dropped, never sent to a provider.
        self.models = self
            .models
            .into_iter()
            .filter_map(ModelSettings::normalized)
            .collect();
        if self.models.is_empty() {
            self.models.push(ModelSettings::default());
        }

        self
    }

    /// Fills credentials and endpoint from `OPENAI_*` variables when the
    /// settings file leaves them blank. File values always win.
    pub fn with_env_fallback(mut self) -> Self {
        if self.api_key.trim().is_empty()
            && let Ok(key) = std::env::var("OPENAI_API_KEY")
        {
            self.api_key = key;
        }
        if self.endpoint.trim().is_empty() || self.endpoint == DEFAULT_ENDPOINT {
            if let Ok(endpoint) = std::env::var("OPENAI_BASE_URL")
                && !endpoint.trim().is_empty()
            {
                self.endpoint = endpoint;
            }
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL")
            && !model.trim().is_empty()
            && !self.models.iter().any(|entry| entry.model_name == model)
        {
            self.models.insert(
                0,
                ModelSettings {
                    model_name: model,
                    max_tokens: None,
                },
            );
        }

        self
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ProviderSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".pagetalk"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> Arc<ProviderSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ProviderSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &PathBuf) -> ProviderSettings {
        if !path.exists() {
            tracing::info!("no settings file at {:?}; starting from defaults", path);
            return ProviderSettings::default().with_env_fallback();
        }

        let figment = Figment::from(Serialized::defaults(ProviderSettings::default()))
            .merge(Json::file(path));

        match figment.extract::<ProviderSettings>() {
            Ok(settings) => settings.normalized().with_env_fallback(),
            Err(error) => {
                tracing::warn!(
                    "settings at {:?} did not parse ({}); falling back to defaults",
                    path,
                    error
                );
                ProviderSettings::default().with_env_fallback()
            }
        }
    }

    fn persist(&self, settings: &ProviderSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("settings written to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("could not create the settings directory {path:?} ({stage}): {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("could not serialize settings ({stage}): {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("could not write the settings file {path:?} ({stage}): {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "could not move {from:?} into place at {to:?} ({stage}): {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_provider_id() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_models() -> Vec<ModelSettings> {
    vec![ModelSettings::default()]
}
