use crate::error::BetterPromptError;

/// Destination for the "copy result" action.
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), BetterPromptError>;
}

/// The desktop clipboard. Opened per copy so headless sessions never touch it
/// until a copy is requested.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), BetterPromptError> {
        let to_err = |e: arboard::Error| BetterPromptError::Clipboard {
            detail: e.to_string(),
        };
        let mut clipboard = arboard::Clipboard::new().map_err(to_err)?;
        clipboard.set_text(text.to_owned()).map_err(to_err)
    }
}
