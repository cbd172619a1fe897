use std::process::ExitCode;

use clap::Parser;

use betterprompt::cli::Cli;
use betterprompt::commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::run(cli))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn run_fails_when_config_file_missing() {
        let cli = Cli::try_parse_from([
            "betterprompt",
            "templates",
            "--config",
            "/nonexistent/betterprompt.toml",
        ])
        .unwrap();

        let err_msg = format!("{}", run(cli).unwrap_err());
        assert!(
            err_msg.contains("failed to read config file"),
            "expected 'failed to read config file', got: {err_msg}"
        );
    }

    #[test]
    fn settings_set_persists_to_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");

        let cli = Cli::try_parse_from([
            "betterprompt",
            "settings",
            "set",
            "model",
            "gemini-2.0-flash",
            "--settings-file",
            settings_path.to_str().unwrap(),
        ])
        .unwrap();

        run(cli).expect("settings set should succeed");
        let saved = fs::read_to_string(&settings_path).unwrap();
        assert!(saved.contains("gemini-2.0-flash"), "got: {saved}");
    }

    #[test]
    fn rewrite_without_key_fails_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");

        let cli = Cli::try_parse_from([
            "betterprompt",
            "rewrite",
            "make it better",
            "--settings-file",
            settings_path.to_str().unwrap(),
        ])
        .unwrap();

        let err_msg = format!("{}", run(cli).unwrap_err());
        assert!(
            err_msg.contains("Gemini API key"),
            "expected missing key error, got: {err_msg}"
        );
    }
}
