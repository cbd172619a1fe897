//! Built-in instruction templates and template resolution.
//!
//! The instruction text is sent to the model as the system instruction; the
//! user's input travels separately and is never concatenated with it. Every
//! code path that needs instruction text goes through [`resolve_instruction`]
//! so the "never send an empty instruction" rule lives in exactly one place.

use std::fmt;
use std::str::FromStr;

use crate::error::BetterPromptError;

pub const DEFAULT_TEMPLATE: &str = "Analyze the following user input and optimize it into a high-quality AI prompt. Make it clear, logical, with sufficient context and necessary examples to precisely guide the AI in completing the task. Return only the optimized prompt without any explanations or prefixes.";

pub const CONCISE_TEMPLATE: &str = "Refine the following user input into a minimal and precise AI prompt. Keep core intent and key information, remove all redundancies, so the AI can quickly grasp the point. Return only the optimized text without any explanations.";

pub const DETAILED_TEMPLATE: &str = "Analyze the following user input in depth and expand it into a complete, detailed, high-quality AI prompt. Clearly describe task objectives, background information, constraints, and examples (where applicable) to ensure the AI can fully understand and accurately respond. Return only the optimized prompt without any explanatory text or additional notes.";

/// Shown in place of the template preview when the custom slot is blank.
pub const CUSTOM_TEMPLATE_HINT: &str = "Enter a custom template with :custom <text>...";

/// Which instruction template the user selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateChoice {
    #[default]
    Default,
    Concise,
    Detailed,
    Custom,
}

impl TemplateChoice {
    pub const ALL: [TemplateChoice; 4] = [
        TemplateChoice::Default,
        TemplateChoice::Concise,
        TemplateChoice::Detailed,
        TemplateChoice::Custom,
    ];

    /// Name used on disk and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateChoice::Default => "default",
            TemplateChoice::Concise => "concise",
            TemplateChoice::Detailed => "detailed",
            TemplateChoice::Custom => "custom",
        }
    }

    /// Built-in text for the preset choices; `None` for the custom slot.
    pub fn builtin_text(self) -> Option<&'static str> {
        match self {
            TemplateChoice::Default => Some(DEFAULT_TEMPLATE),
            TemplateChoice::Concise => Some(CONCISE_TEMPLATE),
            TemplateChoice::Detailed => Some(DETAILED_TEMPLATE),
            TemplateChoice::Custom => None,
        }
    }
}

impl fmt::Display for TemplateChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateChoice {
    type Err = BetterPromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TemplateChoice::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| BetterPromptError::UnknownTemplate {
                name: trimmed.to_owned(),
            })
    }
}

/// Resolve the instruction text to send for `choice`.
///
/// `Custom` with blank custom text falls back to [`DEFAULT_TEMPLATE`], so the
/// result is never empty. Custom text is trimmed.
pub fn resolve_instruction(choice: TemplateChoice, custom_text: &str) -> &str {
    match choice.builtin_text() {
        Some(text) => text,
        None => {
            let custom = custom_text.trim();
            if custom.is_empty() {
                DEFAULT_TEMPLATE
            } else {
                custom
            }
        }
    }
}

/// Text to preview for the current selection. Unlike [`resolve_instruction`],
/// a blank custom slot shows a hint instead of the fallback.
pub fn display_text(choice: TemplateChoice, custom_text: &str) -> &str {
    match choice.builtin_text() {
        Some(text) => text,
        None if custom_text.trim().is_empty() => CUSTOM_TEMPLATE_HINT,
        None => custom_text.trim(),
    }
}
