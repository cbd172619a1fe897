//! Line-oriented interactive front end.
//!
//! Plain lines accumulate into the prompt being drafted; lines starting with
//! `:` are commands. A line starting with `::` is text with one leading colon
//! removed.

use std::borrow::Cow;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::clipboard::Clipboard;
use crate::controller::Controller;
use crate::error::BetterPromptError;
use crate::settings::parse_temperature;
use crate::store::KeyValueStore;
use crate::templates::TemplateChoice;

pub const HELP: &str = "\
Type your prompt; each line is appended to the draft.
Commands:
  :key <api key>        set the Gemini API key
  :template <name>      default | concise | detailed | custom
  :custom <text>        set the custom template text
  :model <id>           set the model id
  :temp <0-2>           set the sampling temperature
  :send                 rewrite the draft
  :copy                 copy the last result to the clipboard
  :clear                clear draft and result
  :show                 show settings, template, draft and result
  :help                 show this help
  :quit                 save and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Text(String),
    SetKey(String),
    Template(TemplateChoice),
    Custom(String),
    Model(String),
    Temperature(f64),
    Send,
    Copy,
    Clear,
    Show,
    Help,
    Quit,
}

impl SessionCommand {
    /// Command name for logs. Arguments are left out so the API key never
    /// reaches a log line.
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Text(_) => "text",
            SessionCommand::SetKey(_) => "key",
            SessionCommand::Template(_) => "template",
            SessionCommand::Custom(_) => "custom",
            SessionCommand::Model(_) => "model",
            SessionCommand::Temperature(_) => "temp",
            SessionCommand::Send => "send",
            SessionCommand::Copy => "copy",
            SessionCommand::Clear => "clear",
            SessionCommand::Show => "show",
            SessionCommand::Help => "help",
            SessionCommand::Quit => "quit",
        }
    }
}

fn required(command: &str, arg: &str) -> Result<String, BetterPromptError> {
    if arg.is_empty() {
        return Err(BetterPromptError::MissingArgument {
            command: command.to_owned(),
        });
    }
    Ok(arg.to_owned())
}

/// Parse one input line.
pub fn parse_line(line: &str) -> Result<SessionCommand, BetterPromptError> {
    if let Some(text) = line.strip_prefix("::") {
        return Ok(SessionCommand::Text(format!(":{text}")));
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(SessionCommand::Text(line.to_owned()));
    };

    let rest = rest.trim();
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "key" => required(name, arg).map(SessionCommand::SetKey),
        "template" => Ok(SessionCommand::Template(
            required(name, arg)?.parse::<TemplateChoice>()?,
        )),
        "custom" => required(name, arg).map(SessionCommand::Custom),
        "model" => required(name, arg).map(SessionCommand::Model),
        "temp" | "temperature" => Ok(SessionCommand::Temperature(parse_temperature(
            &required(name, arg)?,
        )?)),
        "send" => Ok(SessionCommand::Send),
        "copy" => Ok(SessionCommand::Copy),
        "clear" => Ok(SessionCommand::Clear),
        "show" => Ok(SessionCommand::Show),
        "help" => Ok(SessionCommand::Help),
        "quit" | "exit" => Ok(SessionCommand::Quit),
        other => Err(BetterPromptError::UnknownCommand {
            name: other.to_owned(),
        }),
    }
}

fn show<S: KeyValueStore + 'static>(
    controller: &Controller<S>,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    let s = controller.settings();
    let key = if s.has_credential() {
        s.masked_credential()
    } else {
        "(not set)".to_owned()
    };
    writeln!(out, "api key:     {key}")?;
    writeln!(out, "template:    {}", s.template_choice)?;
    writeln!(out, "model:       {}", s.model_id)?;
    writeln!(out, "temperature: {}", s.temperature)?;
    writeln!(out, "instruction: {}", controller.template_preview())?;
    writeln!(out, "draft:\n{}", controller.input())?;
    writeln!(out, "result:\n{}", controller.output())?;
    if let Some(notification) = controller.notifier().current() {
        writeln!(out, "status:      {notification}")?;
    }
    Ok(())
}

/// Drive `controller` from `reader` until `:quit` or end of input.
///
/// Intent failures are reported through the controller's notifier and do not
/// end the session. Pending settings are saved before returning, whether the
/// session ended normally or on an I/O error.
pub async fn run<S, R>(
    controller: &mut Controller<S>,
    reader: R,
    out: &mut dyn Write,
    clipboard: &mut dyn Clipboard,
) -> anyhow::Result<()>
where
    S: KeyValueStore + 'static,
    R: AsyncBufRead + Unpin,
{
    let result = drive(controller, reader, out, clipboard).await;
    controller.flush_pending_save();
    result
}

/// Next input line without its line ending, or `None` at end of input.
/// Bytes that are not UTF-8 are replaced rather than failing the read.
async fn next_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<(String, bool)>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    let line = String::from_utf8_lossy(&buf[..]);
    let lossy = matches!(line, Cow::Owned(_));
    Ok(Some((line.into_owned(), lossy)))
}

async fn drive<S, R>(
    controller: &mut Controller<S>,
    mut reader: R,
    out: &mut dyn Write,
    clipboard: &mut dyn Clipboard,
) -> anyhow::Result<()>
where
    S: KeyValueStore + 'static,
    R: AsyncBufRead + Unpin,
{
    writeln!(out, "Better Prompt. Type :help for commands.")?;
    let mut buf = Vec::new();

    while let Some((line, lossy)) = next_line(&mut reader, &mut buf).await? {
        controller.report_autosave_failure();
        if lossy {
            controller
                .notifier_mut()
                .warning("Input was not valid UTF-8; invalid bytes were replaced");
        }

        let command = match parse_line(&line) {
            Ok(c) => c,
            Err(e) => {
                controller.notifier_mut().error(e.to_string());
                continue;
            }
        };
        debug!(command = command.name(), "session command");

        // Setter errors are already reported by the controller's notifier.
        match command {
            SessionCommand::Text(text) => controller.append_input(&text),
            SessionCommand::SetKey(key) => controller.set_credential(&key),
            SessionCommand::Template(choice) => {
                let _ = controller.set_template(choice);
            }
            SessionCommand::Custom(text) => {
                let _ = controller.set_custom_template(&text);
            }
            SessionCommand::Model(model) => {
                let _ = controller.set_model(&model);
            }
            SessionCommand::Temperature(t) => {
                let _ = controller.set_temperature(t);
            }
            SessionCommand::Send => {
                if let Ok(text) = controller.submit().await {
                    writeln!(out, "{text}")?;
                }
            }
            SessionCommand::Copy => {
                controller.copy_result(clipboard);
            }
            SessionCommand::Clear => controller.clear(),
            SessionCommand::Show => show(controller, out)?,
            SessionCommand::Help => writeln!(out, "{HELP}")?,
            SessionCommand::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{DEFAULT_NOTIFICATION_DURATION, Notifier};
    use crate::rewrite::RewriteClient;
    use crate::rewrite::tests::{ScriptedTransport, success_body};
    use crate::settings::SettingsStore;
    use crate::store::{FileStore, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;

    struct NoClipboard;

    impl Clipboard for NoClipboard {
        fn set_text(&mut self, _text: &str) -> Result<(), BetterPromptError> {
            Err(BetterPromptError::Clipboard {
                detail: "headless".to_owned(),
            })
        }
    }

    #[test]
    fn plain_lines_are_text() {
        assert_eq!(
            parse_line("make this better").unwrap(),
            SessionCommand::Text("make this better".to_owned())
        );
        assert_eq!(parse_line("").unwrap(), SessionCommand::Text(String::new()));
    }

    #[test]
    fn double_colon_escapes_text() {
        assert_eq!(
            parse_line("::send is a word").unwrap(),
            SessionCommand::Text(":send is a word".to_owned())
        );
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse_line(":key  AIza123 ").unwrap(),
            SessionCommand::SetKey("AIza123".to_owned())
        );
        assert_eq!(
            parse_line(":template detailed").unwrap(),
            SessionCommand::Template(TemplateChoice::Detailed)
        );
        assert_eq!(
            parse_line(":custom Be brief and kind.").unwrap(),
            SessionCommand::Custom("Be brief and kind.".to_owned())
        );
        assert_eq!(
            parse_line(":temp 1.5").unwrap(),
            SessionCommand::Temperature(1.5)
        );
        assert_eq!(parse_line(":quit").unwrap(), SessionCommand::Quit);
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(matches!(
            parse_line(":frobnicate").unwrap_err(),
            BetterPromptError::UnknownCommand { .. }
        ));
        assert!(matches!(
            parse_line(":model").unwrap_err(),
            BetterPromptError::MissingArgument { .. }
        ));
        assert!(matches!(
            parse_line(":temp 3").unwrap_err(),
            BetterPromptError::TemperatureOutOfRange { .. }
        ));
        assert!(matches!(
            parse_line(":template fancy").unwrap_err(),
            BetterPromptError::UnknownTemplate { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_session_rewrites_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let transport = ScriptedTransport::respond(200, &success_body(" Polished prompt. "));
        let sent = Arc::clone(&transport.sent);
        let mut controller = Controller::new(
            SettingsStore::new(FileStore::open(&path).unwrap()),
            RewriteClient::new(Box::new(transport)),
            Notifier::silent(DEFAULT_NOTIFICATION_DURATION),
            Duration::from_millis(800),
        );

        let script = b":key test-key\n:temp 0.9\nwrite a poem\nabout rust\n:send\n:bogus\n:quit\nignored after quit\n";
        let mut out = Vec::new();
        run(&mut controller, &script[..], &mut out, &mut NoClipboard)
            .await
            .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(
            printed.contains("Polished prompt."),
            "expected result in output, got: {printed}"
        );

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "write a poem\nabout rust");
        assert_eq!(body["generationConfig"]["temperature"], 0.9);

        assert!(!controller.input().contains("ignored after quit"));

        let reopened = SettingsStore::new(FileStore::open(&path).unwrap()).load();
        assert_eq!(reopened.credential, "test-key");
        assert_eq!(reopened.temperature, 0.9);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_utf8_line_does_not_end_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut controller = Controller::new(
            SettingsStore::new(FileStore::open(&path).unwrap()),
            RewriteClient::new(Box::new(ScriptedTransport::respond(200, "{}"))),
            Notifier::silent(DEFAULT_NOTIFICATION_DURATION),
            Duration::from_millis(800),
        );

        let script = b":key my-new-key\ncaf\xe9 draft\r\nstill here\n:quit\n";
        let mut out = Vec::new();
        run(&mut controller, &script[..], &mut out, &mut NoClipboard)
            .await
            .unwrap();

        assert_eq!(controller.input(), "caf\u{FFFD} draft\nstill here");
        assert!(!controller.has_pending_save());
        let reopened = SettingsStore::new(FileStore::open(&path).unwrap()).load();
        assert_eq!(reopened.credential, "my-new-key");
    }

    /// Writer that fails every write.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn output_failure_still_saves_pending_settings() {
        let store = MemoryStore::new();
        let mut controller = Controller::new(
            SettingsStore::new(store),
            RewriteClient::new(Box::new(ScriptedTransport::respond(200, "{}"))),
            Notifier::silent(DEFAULT_NOTIFICATION_DURATION),
            Duration::from_millis(800),
        );
        controller.set_credential("pending-key");
        assert!(controller.has_pending_save());

        let result = run(&mut controller, &b":help\n"[..], &mut BrokenPipe, &mut NoClipboard).await;

        assert!(result.is_err());
        assert!(!controller.has_pending_save());
        assert_eq!(controller.stored_settings().credential, "pending-key");
    }

    #[tokio::test(start_paused = true)]
    async fn show_masks_credential() {
        let mut controller = Controller::new(
            SettingsStore::new(MemoryStore::new()),
            RewriteClient::new(Box::new(ScriptedTransport::respond(200, "{}"))),
            Notifier::silent(DEFAULT_NOTIFICATION_DURATION),
            Duration::from_millis(800),
        );

        let script = b":key abcdefgh9999\n:show\n";
        let mut out = Vec::new();
        run(&mut controller, &script[..], &mut out, &mut NoClipboard)
            .await
            .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("********9999"), "got: {printed}");
        assert!(!printed.contains("abcdefgh9999"));
        assert!(printed.contains("status:      [info] API key is set."));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_command_is_notified_and_session_continues() {
        let mut controller = Controller::new(
            SettingsStore::new(MemoryStore::new()),
            RewriteClient::new(Box::new(ScriptedTransport::respond(200, "{}"))),
            Notifier::silent(DEFAULT_NOTIFICATION_DURATION),
            Duration::from_millis(800),
        );

        let script = b":nope\nstill here\n";
        let mut out = Vec::new();
        run(&mut controller, &script[..], &mut out, &mut NoClipboard)
            .await
            .unwrap();

        assert_eq!(controller.input(), "still here");
    }
}
