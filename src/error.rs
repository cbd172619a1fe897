use std::fmt;
use std::path::PathBuf;

/// Outcome category of a failed rewrite attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteErrorKind {
    Network,
    Http,
    ParseFailure,
    ApiError,
    UnexpectedShape,
}

impl fmt::Display for RewriteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RewriteErrorKind::Network => "network",
            RewriteErrorKind::Http => "http",
            RewriteErrorKind::ParseFailure => "parse_failure",
            RewriteErrorKind::ApiError => "api_error",
            RewriteErrorKind::UnexpectedShape => "unexpected_shape",
        };
        f.write_str(name)
    }
}

/// A single rewrite attempt failed. Every variant is terminal; nothing retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    /// The request never completed at the transport level (DNS, TLS, reset, timeout).
    #[error("Network request failed: {message}")]
    Network { message: String },

    #[error("API request failed with status: {status}. {detail}")]
    Http { status: u16, detail: String },

    #[error("Unable to parse API response.")]
    ParseFailure,

    /// Success status, but the body carried an `error` object.
    #[error("API Error: {detail}")]
    ApiError { detail: String },

    #[error("Unable to extract optimized text from API response.")]
    UnexpectedShape,
}

impl RewriteError {
    pub fn kind(&self) -> RewriteErrorKind {
        match self {
            RewriteError::Network { .. } => RewriteErrorKind::Network,
            RewriteError::Http { .. } => RewriteErrorKind::Http,
            RewriteError::ParseFailure => RewriteErrorKind::ParseFailure,
            RewriteError::ApiError { .. } => RewriteErrorKind::ApiError,
            RewriteError::UnexpectedShape => RewriteErrorKind::UnexpectedShape,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BetterPromptError {
    #[error("Please enter a prompt to enhance")]
    EmptyInput,

    #[error("Please enter your Gemini API key")]
    MissingCredential,

    #[error("Temperature must be a number between 0 and 2 (got {value})")]
    TemperatureOutOfRange { value: String },

    #[error("Model id must not be empty")]
    EmptyModel,

    #[error("Unknown template '{name}' (expected one of: default, concise, detailed, custom)")]
    UnknownTemplate { name: String },

    #[error(
        "Unknown setting '{name}' (expected one of: api-key, template, custom-template, model, temperature)"
    )]
    UnknownSettingField { name: String },

    #[error("Unknown command ':{name}' (type :help for the list)")]
    UnknownCommand { name: String },

    #[error("Command ':{command}' requires an argument")]
    MissingArgument { command: String },

    #[error("Failed to read settings file {path}: {detail}")]
    SettingsReadFailed { path: PathBuf, detail: String },

    #[error("Failed to write settings file {path}: {detail}")]
    SettingsWriteFailed { path: PathBuf, detail: String },

    #[error("Failed to parse environment variable '{var}': {detail}")]
    ConfigEnvParseError { var: String, detail: String },

    #[error("Failed to read input file {path}: {detail}")]
    InputFileUnreadable { path: PathBuf, detail: String },

    #[error("Clipboard unavailable: {detail}")]
    Clipboard { detail: String },

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}
