//! Orchestrates user intents against the settings store and rewrite client.
//!
//! The controller owns every piece of mutable UI state: current settings,
//! input and output text, the auto-save debouncer and the notifier. Each
//! intent reports its own outcome through the notifier and also returns it,
//! so front ends can ignore the return value and tests can inspect it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info};

use crate::clipboard::Clipboard;
use crate::debounce::Debouncer;
use crate::error::BetterPromptError;
use crate::notify::Notifier;
use crate::rewrite::{RewriteClient, RewriteRequest};
use crate::settings::{Settings, SettingsStore, is_valid_temperature};
use crate::store::KeyValueStore;
use crate::templates::{self, TemplateChoice};

/// Delay before an edited setting is written, so a burst of edits costs one write.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(800);

/// Validate `input_text` and `settings` and build the request to send.
///
/// Input is trimmed. Fails with `EmptyInput` or `MissingCredential`; the
/// instruction text is always resolved to something non-empty.
pub fn build_request(
    settings: &Settings,
    input_text: &str,
) -> Result<RewriteRequest, BetterPromptError> {
    let input = input_text.trim();
    if input.is_empty() {
        return Err(BetterPromptError::EmptyInput);
    }
    let credential = settings.credential.trim();
    if credential.is_empty() {
        return Err(BetterPromptError::MissingCredential);
    }
    Ok(RewriteRequest {
        credential: credential.to_owned(),
        input_text: input.to_owned(),
        instruction_text: templates::resolve_instruction(
            settings.template_choice,
            &settings.custom_template_text,
        )
        .to_owned(),
        model_id: settings.model_id.clone(),
        temperature: settings.temperature,
    })
}

type SharedStore<S> = Arc<Mutex<SettingsStore<S>>>;
type SaveFailure = Arc<Mutex<Option<String>>>;

fn persist<S: KeyValueStore>(
    store: &SharedStore<S>,
    settings: &Settings,
) -> Result<(), BetterPromptError> {
    let mut guard = store.lock().unwrap_or_else(|p| p.into_inner());
    guard.save(settings)
}

pub struct Controller<S: KeyValueStore + 'static> {
    settings: Settings,
    store: SharedStore<S>,
    autosave: Debouncer<Settings>,
    autosave_failure: SaveFailure,
    notifier: Notifier,
    client: RewriteClient,
    input: String,
    output: String,
}

impl<S: KeyValueStore + 'static> Controller<S> {
    /// Load settings from `store` and wire up debounced auto-save.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        store: SettingsStore<S>,
        client: RewriteClient,
        notifier: Notifier,
        save_delay: Duration,
    ) -> Self {
        let settings = store.load();
        let store = Arc::new(Mutex::new(store));
        let autosave_failure: SaveFailure = Arc::new(Mutex::new(None));

        let autosave_store = Arc::clone(&store);
        let failure_slot = Arc::clone(&autosave_failure);
        let autosave = Debouncer::new(save_delay, move |settings: Settings| {
            if let Err(e) = persist(&autosave_store, &settings) {
                error!(err = %e, "auto-save failed");
                *failure_slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(e.to_string());
            }
        });

        Self {
            settings,
            store,
            autosave,
            autosave_failure,
            notifier,
            client,
            input: String::new(),
            output: String::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    /// Text of the selected template, or a hint for a blank custom slot.
    pub fn template_preview(&self) -> &str {
        templates::display_text(
            self.settings.template_choice,
            &self.settings.custom_template_text,
        )
    }

    /// Settings as currently persisted, which may lag behind [`Controller::settings`]
    /// while an auto-save is pending.
    pub fn stored_settings(&self) -> Settings {
        self.store.lock().unwrap_or_else(|p| p.into_inner()).load()
    }

    pub fn has_pending_save(&self) -> bool {
        self.autosave.is_pending()
    }

    fn schedule_save(&mut self) {
        self.autosave.call(self.settings.clone());
    }

    fn save_now(&mut self) -> Result<(), BetterPromptError> {
        // The pending snapshot is older than the current settings.
        self.autosave.cancel();
        persist(&self.store, &self.settings).inspect_err(|e| {
            self.notifier.error(format!("Failed to save settings: {e}"));
        })
    }

    /// Surface a failure from a background auto-save, if one happened.
    pub fn report_autosave_failure(&mut self) -> bool {
        let failure = self
            .autosave_failure
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        match failure {
            Some(detail) => {
                self.notifier.error(format!("Failed to save settings: {detail}"));
                true
            }
            None => false,
        }
    }

    /// Run a pending auto-save now, e.g. before exiting.
    pub fn flush_pending_save(&mut self) {
        self.autosave.flush();
        self.report_autosave_failure();
    }

    pub fn set_credential(&mut self, credential: &str) {
        self.settings.credential = credential.trim().to_owned();
        self.schedule_save();
        if self.settings.has_credential() {
            self.notifier.info("API key is set.");
        } else {
            self.notifier
                .warning("API key is required to use the enhancement feature.");
        }
    }

    pub fn set_template(&mut self, choice: TemplateChoice) -> Result<(), BetterPromptError> {
        info!(template = %choice, "template changed");
        self.settings.template_choice = choice;
        self.save_now()?;
        self.notifier.info(format!("Template: {choice}"));
        Ok(())
    }

    pub fn set_custom_template(&mut self, text: &str) -> Result<(), BetterPromptError> {
        self.settings.custom_template_text = text.trim().to_owned();
        self.save_now()?;
        self.notifier.success("Custom template saved");
        Ok(())
    }

    pub fn set_model(&mut self, model_id: &str) -> Result<(), BetterPromptError> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            let err = BetterPromptError::EmptyModel;
            self.notifier.warning(err.to_string());
            return Err(err);
        }
        self.settings.model_id = model_id.to_owned();
        self.save_now()?;
        self.notifier.info(format!("Model: {model_id}"));
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f64) -> Result<(), BetterPromptError> {
        if !is_valid_temperature(temperature) {
            let err = BetterPromptError::TemperatureOutOfRange {
                value: temperature.to_string(),
            };
            self.notifier.warning(err.to_string());
            return Err(err);
        }
        self.settings.temperature = temperature;
        self.schedule_save();
        Ok(())
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Append one line of input, newline-separated from what is already there.
    pub fn append_input(&mut self, line: &str) {
        if !self.input.is_empty() {
            self.input.push('\n');
        }
        self.input.push_str(line);
    }

    /// Rewrite the current input with the current settings.
    ///
    /// `&mut self` is held across the network call, so a second rewrite cannot
    /// start while one is in flight. On failure the output is left unchanged.
    pub async fn submit(&mut self) -> Result<&str, BetterPromptError> {
        let request = match build_request(&self.settings, &self.input) {
            Ok(r) => r,
            Err(e) => {
                if matches!(e, BetterPromptError::MissingCredential) {
                    self.notifier.error(e.to_string());
                } else {
                    self.notifier.warning(e.to_string());
                }
                return Err(e);
            }
        };

        info!(
            template = %self.settings.template_choice,
            model = %request.model_id,
            temperature = request.temperature,
            "enhancing prompt"
        );

        match self.client.rewrite(&request).await {
            Ok(text) => {
                self.output = text;
                self.notifier.success("Prompt enhanced successfully");
                Ok(&self.output)
            }
            Err(e) => {
                self.notifier.error(format!("Enhancement failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Copy the output to `clipboard`. Returns whether anything was copied.
    pub fn copy_result(&mut self, clipboard: &mut dyn Clipboard) -> bool {
        if self.output.is_empty() {
            self.notifier.warning("No text to copy");
            return false;
        }
        match clipboard.set_text(&self.output) {
            Ok(()) => {
                self.notifier.success("Copied to clipboard");
                true
            }
            Err(e) => {
                error!(err = %e, "copy failed");
                self.notifier
                    .error("Copy failed, please select and copy manually");
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
        self.notifier.info("All fields reset");
    }
}
