use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::settings::parse_temperature;
use crate::templates::TemplateChoice;

/// Better Prompt: rewrite rough prompts into high-quality AI prompts.
///
/// Settings (API key, template, model, temperature) are stored locally and
/// reused by every command.
#[derive(Debug, Parser)]
#[command(name = "betterprompt", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand.
///
/// All of these can also come from a config file or env vars
/// (`BETTERPROMPT_SETTINGS_PATH`, ...). Precedence: CLI > env > file.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GlobalArgs {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Where settings are stored (default: <config dir>/betterprompt/settings.json).
    #[arg(long, global = true)]
    pub settings_file: Option<PathBuf>,

    /// Log level filter (default: "info"). Supports tracing directives
    /// (e.g. "debug", "betterprompt=trace,warn"). Overridden by BETTERPROMPT_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to a log file. When set, structured JSON logs are appended here
    /// in addition to the human-readable stderr output.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Timeout for one API request in seconds (default: none).
    #[arg(long, global = true)]
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rewrite one prompt and print the result.
    Rewrite(RewriteArgs),

    /// Show or change stored settings.
    Settings(SettingsArgs),

    /// List the built-in instruction templates, or print one.
    Templates(TemplatesArgs),

    /// Interactive session: draft, tweak settings, rewrite, copy.
    Session,
}

/// Arguments for the `rewrite` subcommand.
///
/// Overrides apply to this call only and are not saved.
#[derive(Debug, Clone, clap::Args)]
pub struct RewriteArgs {
    /// Prompt text. Read from stdin when omitted or "-".
    pub text: Option<String>,

    /// Read the prompt from this file.
    #[arg(long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Template to use: default, concise, detailed or custom.
    #[arg(long)]
    pub template: Option<TemplateChoice>,

    /// Custom template text (used with --template custom).
    #[arg(long)]
    pub custom_template: Option<String>,

    /// Model id, e.g. "gemini-2.0-flash".
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature between 0 and 2.
    #[arg(long, value_parser = parse_temperature)]
    pub temperature: Option<f64>,

    /// API key for this call.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Write the result to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Also copy the result to the clipboard.
    #[arg(long, default_value_t = false)]
    pub copy: bool,
}

/// Arguments for the `settings` subcommand.
#[derive(Debug, Clone, clap::Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SettingsAction {
    /// Print the stored settings. The API key is masked.
    Show {
        /// Print the API key in full.
        #[arg(long, default_value_t = false)]
        show_key: bool,
    },

    /// Change one setting: api-key, template, custom-template, model or temperature.
    Set { field: String, value: String },
}

/// Arguments for the `templates` subcommand.
#[derive(Debug, Clone, clap::Args)]
pub struct TemplatesArgs {
    /// Print only this template.
    pub name: Option<TemplateChoice>,
}
