//! Subcommand implementations behind the CLI.

use std::fs;
use std::io::{Read, Write};

use anyhow::Context;
use tracing::info;

use crate::cli::{Cli, Commands, RewriteArgs, SettingsAction};
use crate::clipboard::{Clipboard, SystemClipboard};
use crate::config::AppConfig;
use crate::controller::{Controller, build_request};
use crate::error::BetterPromptError;
use crate::logging;
use crate::notify::Notifier;
use crate::rewrite::RewriteClient;
use crate::session;
use crate::settings::{Settings, SettingsStore, parse_temperature};
use crate::store::FileStore;
use crate::templates::{self, TemplateChoice};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.global)?;

    logging::init(config.log_level.as_deref(), config.log_file.as_deref())?;

    info!(
        settings = %config.settings_path.display(),
        timeout_sec = config.request_timeout_sec.unwrap_or(0),
        save_delay_ms = config.save_delay_ms,
        "config loaded"
    );

    let mut stdout = std::io::stdout();
    match cli.command {
        Commands::Rewrite(args) => {
            let client = RewriteClient::http(config.request_timeout())?;
            let text = rewrite(&config, &args, &client, &mut std::io::stdin()).await?;
            deliver(&text, &args, &mut stdout, &mut SystemClipboard)
        }
        Commands::Settings(args) => settings(&config, args.action, &mut stdout),
        Commands::Templates(args) => list_templates(&config, args.name, &mut stdout),
        Commands::Session => {
            let client = RewriteClient::http(config.request_timeout())?;
            let mut controller = Controller::new(
                open_settings(&config),
                client,
                Notifier::stderr(config.notification_duration()),
                config.save_delay(),
            );
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            session::run(&mut controller, stdin, &mut stdout, &mut SystemClipboard).await
        }
    }
}

fn open_settings(config: &AppConfig) -> SettingsStore<FileStore> {
    SettingsStore::new(FileStore::open_or_empty(&config.settings_path))
}

fn read_input(args: &RewriteArgs, stdin: &mut dyn Read) -> Result<String, BetterPromptError> {
    if let Some(path) = &args.file {
        return fs::read_to_string(path).map_err(|e| BetterPromptError::InputFileUnreadable {
            path: path.clone(),
            detail: e.to_string(),
        });
    }
    match args.text.as_deref() {
        Some(text) if text != "-" => Ok(text.to_owned()),
        _ => {
            let mut buf = String::new();
            stdin
                .read_to_string(&mut buf)
                .map_err(|e| BetterPromptError::InputFileUnreadable {
                    path: "<stdin>".into(),
                    detail: e.to_string(),
                })?;
            Ok(buf)
        }
    }
}

/// Stored settings with this call's overrides applied. Nothing is saved.
fn effective_settings(stored: Settings, args: &RewriteArgs) -> Settings {
    let mut s = stored;
    if let Some(key) = &args.api_key {
        s.credential = key.trim().to_owned();
    }
    if let Some(choice) = args.template {
        s.template_choice = choice;
    }
    if let Some(custom) = &args.custom_template {
        s.custom_template_text = custom.trim().to_owned();
    }
    if let Some(model) = args.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        s.model_id = model.to_owned();
    }
    if let Some(t) = args.temperature {
        s.temperature = t;
    }
    s
}

/// One-shot rewrite using stored settings plus per-call overrides.
pub async fn rewrite(
    config: &AppConfig,
    args: &RewriteArgs,
    client: &RewriteClient,
    stdin: &mut dyn Read,
) -> anyhow::Result<String> {
    let settings = effective_settings(open_settings(config).load(), args);
    let input = read_input(args, stdin)?;
    let request = build_request(&settings, &input)?;

    info!(
        template = %settings.template_choice,
        model = %request.model_id,
        temperature = request.temperature,
        "enhancing prompt"
    );

    let text = client
        .rewrite(&request)
        .await
        .context("Enhancement failed")?;
    Ok(text)
}

fn deliver(
    text: &str,
    args: &RewriteArgs,
    out: &mut dyn Write,
    clipboard: &mut dyn Clipboard,
) -> anyhow::Result<()> {
    match &args.output {
        Some(path) => {
            fs::write(path, format!("{text}\n"))
                .with_context(|| format!("failed to write output file {}", path.display()))?;
            info!(path = %path.display(), "result written");
        }
        None => writeln!(out, "{text}")?,
    }
    if args.copy {
        clipboard.set_text(text)?;
        info!("result copied to clipboard");
    }
    Ok(())
}

/// Apply `value` to the setting named `field`, validating like the interactive intents.
pub fn apply_setting(
    settings: &mut Settings,
    field: &str,
    value: &str,
) -> Result<(), BetterPromptError> {
    match field {
        "api-key" | "key" => settings.credential = value.trim().to_owned(),
        "template" => settings.template_choice = value.parse::<TemplateChoice>()?,
        "custom-template" | "custom" => settings.custom_template_text = value.trim().to_owned(),
        "model" => {
            let model = value.trim();
            if model.is_empty() {
                return Err(BetterPromptError::EmptyModel);
            }
            settings.model_id = model.to_owned();
        }
        "temperature" | "temp" => settings.temperature = parse_temperature(value)?,
        other => {
            return Err(BetterPromptError::UnknownSettingField {
                name: other.to_owned(),
            });
        }
    }
    Ok(())
}

fn print_settings(settings: &Settings, show_key: bool, out: &mut dyn Write) -> std::io::Result<()> {
    let key = match (settings.has_credential(), show_key) {
        (false, _) => "(not set)".to_owned(),
        (true, true) => settings.credential.clone(),
        (true, false) => settings.masked_credential(),
    };
    writeln!(out, "api-key:         {key}")?;
    writeln!(out, "template:        {}", settings.template_choice)?;
    writeln!(out, "custom-template: {}", settings.custom_template_text)?;
    writeln!(out, "model:           {}", settings.model_id)?;
    writeln!(out, "temperature:     {}", settings.temperature)?;
    Ok(())
}

pub fn settings(
    config: &AppConfig,
    action: SettingsAction,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut store = open_settings(config);
    match action {
        SettingsAction::Show { show_key } => {
            writeln!(out, "# {}", store.backend().path().display())?;
            print_settings(&store.load(), show_key, out)?;
        }
        SettingsAction::Set { field, value } => {
            let mut current = store.load();
            apply_setting(&mut current, &field, &value)?;
            store.save(&current)?;
            info!(field = %field, "setting saved");
        }
    }
    Ok(())
}

pub fn list_templates(
    config: &AppConfig,
    name: Option<TemplateChoice>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let stored = open_settings(config).load();
    let custom = stored.custom_template_text.as_str();

    match name {
        Some(choice) => writeln!(out, "{}", templates::display_text(choice, custom))?,
        None => {
            for choice in TemplateChoice::ALL {
                let marker = if choice == stored.template_choice { "*" } else { " " };
                writeln!(out, "{marker} {choice}")?;
                writeln!(out, "    {}", templates::display_text(choice, custom))?;
            }
        }
    }
    Ok(())
}
