//! User settings and the store that persists them.
//!
//! Five string entries live in a [`KeyValueStore`] under fixed, prefixed keys.
//! Loading never fails: a missing or unusable value is replaced by its default.

use tracing::debug;

use crate::error::BetterPromptError;
use crate::store::KeyValueStore;
use crate::templates::TemplateChoice;

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro-exp-03-25";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

pub const KEY_API_KEY: &str = "betterprompt_geminiApiKey";
pub const KEY_PROMPT_TYPE: &str = "betterprompt_selectedPromptType";
pub const KEY_CUSTOM_PROMPT: &str = "betterprompt_customPrompt";
pub const KEY_MODEL: &str = "betterprompt_selectedModel";
pub const KEY_TEMPERATURE: &str = "betterprompt_temperature";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub credential: String,
    pub template_choice: TemplateChoice,
    pub custom_template_text: String,
    pub model_id: String,
    pub temperature: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credential: String::new(),
            template_choice: TemplateChoice::Default,
            custom_template_text: String::new(),
            model_id: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl Settings {
    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }

    /// Credential with all but the last four characters hidden.
    pub fn masked_credential(&self) -> String {
        let chars: Vec<char> = self.credential.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let hidden = chars.len() - 4;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{tail}", "*".repeat(hidden))
    }
}

/// Whether `value` is an acceptable sampling temperature.
pub fn is_valid_temperature(value: f64) -> bool {
    value.is_finite() && (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value)
}

/// Parse user-typed temperature text, enforcing the `[0, 2]` range.
pub fn parse_temperature(text: &str) -> Result<f64, BetterPromptError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| is_valid_temperature(*t))
        .ok_or_else(|| BetterPromptError::TemperatureOutOfRange {
            value: text.trim().to_owned(),
        })
}

/// Reads and writes [`Settings`] through a key-value backend.
///
/// There is no locking here; the single caller serializes access.
#[derive(Debug)]
pub struct SettingsStore<S> {
    backend: S,
}

impl<S: KeyValueStore> SettingsStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Read all five fields, substituting defaults for absent or invalid values.
    pub fn load(&self) -> Settings {
        let defaults = Settings::default();

        let credential = self.backend.get(KEY_API_KEY).unwrap_or_default();

        let template_choice = self
            .backend
            .get(KEY_PROMPT_TYPE)
            .and_then(|v| v.parse::<TemplateChoice>().ok())
            .unwrap_or(defaults.template_choice);

        let custom_template_text = self.backend.get(KEY_CUSTOM_PROMPT).unwrap_or_default();

        let model_id = self
            .backend
            .get(KEY_MODEL)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.model_id);

        let temperature = self
            .backend
            .get(KEY_TEMPERATURE)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|t| is_valid_temperature(*t))
            .unwrap_or(defaults.temperature);

        debug!(
            template = %template_choice,
            model = %model_id,
            temperature,
            has_credential = !credential.is_empty(),
            "settings loaded"
        );

        Settings {
            credential,
            template_choice,
            custom_template_text,
            model_id,
            temperature,
        }
    }

    /// Write all five fields, overwriting prior values.
    ///
    /// A non-finite temperature is written as [`DEFAULT_TEMPERATURE`].
    pub fn save(&mut self, settings: &Settings) -> Result<(), BetterPromptError> {
        let temperature = if settings.temperature.is_finite() {
            settings.temperature
        } else {
            DEFAULT_TEMPERATURE
        };

        self.backend.set(KEY_API_KEY, settings.credential.clone());
        self.backend
            .set(KEY_PROMPT_TYPE, settings.template_choice.as_str().to_owned());
        self.backend
            .set(KEY_CUSTOM_PROMPT, settings.custom_template_text.clone());
        self.backend.set(KEY_MODEL, settings.model_id.clone());
        self.backend.set(KEY_TEMPERATURE, temperature.to_string());
        self.backend.flush()?;

        debug!(
            template = %settings.template_choice,
            model = %settings.model_id,
            temperature,
            "settings saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};

    fn sample() -> Settings {
        Settings {
            credential: "AIza-test-key".to_owned(),
            template_choice: TemplateChoice::Custom,
            custom_template_text: "Rewrite as a haiku.".to_owned(),
            model_id: "gemini-2.0-flash".to_owned(),
            temperature: 1.3,
        }
    }

    #[test]
    fn load_on_empty_storage_returns_defaults() {
        let store = SettingsStore::new(MemoryStore::new());
        let loaded = store.load();
        assert_eq!(loaded, Settings::default());
        assert_eq!(loaded.credential, "");
        assert_eq!(loaded.template_choice, TemplateChoice::Default);
        assert_eq!(loaded.custom_template_text, "");
        assert_eq!(loaded.model_id, DEFAULT_MODEL);
        assert_eq!(loaded.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let mut store = SettingsStore::new(MemoryStore::new());
        let settings = sample();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn roundtrip_covers_every_template_and_boundary_temperature() {
        let mut store = SettingsStore::new(MemoryStore::new());
        for (choice, temperature) in TemplateChoice::ALL
            .into_iter()
            .zip([0.0, 0.7, 2.0, 0.2])
        {
            let settings = Settings {
                template_choice: choice,
                temperature,
                ..sample()
            };
            store.save(&settings).unwrap();
            assert_eq!(store.load(), settings);
        }
    }

    #[test]
    fn save_writes_all_five_keys_as_strings() {
        let mut store = SettingsStore::new(MemoryStore::new());
        store.save(&sample()).unwrap();
        let backend = store.backend();
        assert_eq!(backend.len(), 5);
        assert_eq!(backend.get(KEY_API_KEY).as_deref(), Some("AIza-test-key"));
        assert_eq!(backend.get(KEY_PROMPT_TYPE).as_deref(), Some("custom"));
        assert_eq!(
            backend.get(KEY_CUSTOM_PROMPT).as_deref(),
            Some("Rewrite as a haiku.")
        );
        assert_eq!(backend.get(KEY_MODEL).as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(backend.get(KEY_TEMPERATURE).as_deref(), Some("1.3"));
    }

    #[test]
    fn save_coerces_non_finite_temperature_to_default() {
        let mut store = SettingsStore::new(MemoryStore::new());
        let settings = Settings {
            temperature: f64::NAN,
            ..sample()
        };
        store.save(&settings).unwrap();
        assert_eq!(
            store.backend().get(KEY_TEMPERATURE).as_deref(),
            Some("0.2")
        );
        assert_eq!(store.load().temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn load_replaces_unparseable_fields_with_defaults() {
        let mut backend = MemoryStore::new();
        backend.set(KEY_API_KEY, "kept".into());
        backend.set(KEY_PROMPT_TYPE, "verbose".into());
        backend.set(KEY_MODEL, "".into());
        backend.set(KEY_TEMPERATURE, "warm".into());

        let loaded = SettingsStore::new(backend).load();
        assert_eq!(loaded.credential, "kept");
        assert_eq!(loaded.template_choice, TemplateChoice::Default);
        assert_eq!(loaded.model_id, DEFAULT_MODEL);
        assert_eq!(loaded.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn load_rejects_out_of_range_temperature() {
        let mut backend = MemoryStore::new();
        backend.set(KEY_TEMPERATURE, "7.5".into());
        assert_eq!(
            SettingsStore::new(backend).load().temperature,
            DEFAULT_TEMPERATURE
        );
    }

    #[test]
    fn file_backed_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::new(FileStore::open(&path).unwrap());
        store.save(&sample()).unwrap();

        let reopened = SettingsStore::new(FileStore::open(&path).unwrap());
        assert_eq!(reopened.load(), sample());
    }

    #[test]
    fn parse_temperature_enforces_range() {
        assert_eq!(parse_temperature("0").unwrap(), 0.0);
        assert_eq!(parse_temperature(" 2 ").unwrap(), 2.0);
        assert!(parse_temperature("2.01").is_err());
        assert!(parse_temperature("-0.1").is_err());
        assert!(parse_temperature("NaN").is_err());
        assert!(parse_temperature("inf").is_err());
        assert!(parse_temperature("hot").is_err());
    }

    #[test]
    fn masked_credential_hides_all_but_last_four() {
        let settings = Settings {
            credential: "abcdefgh1234".to_owned(),
            ..Settings::default()
        };
        assert_eq!(settings.masked_credential(), "********1234");

        let short = Settings {
            credential: "abc".to_owned(),
            ..Settings::default()
        };
        assert_eq!(short.masked_credential(), "***");
        assert_eq!(Settings::default().masked_credential(), "");
    }
}
