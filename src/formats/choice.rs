//! Format-choice menu and free-text choice parsing
//!
//! Menus are built as structured entries, but chat transports hand back only
//! the label text, so `parse_choice` recovers the token from a label.

use super::{normalize_extension, Format};

/// What the user picked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Cancel,
    Format(Format),
    /// Text that is neither a known format nor cancel
    Unrecognized(String),
}

/// One button of the format menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub choice: Choice,
}

const CANCEL_LABEL: &str = "❌ Cancel ↩️";
const CANCEL_TOKEN: &str = "cancel";

/// Decorations that may surround a token. Longer sequences come first so
/// `🖼️` goes before the bare `🖼`.
const DECORATIONS: &[&str] = &[
    "📄", "🖼️", "🖼", "📊", "📱", "🎨", "📈", "📉", "❌", "↩️", "↩", "📤",
];

const CONVERT_PREFIX: &str = "convert to";

fn label_for(input_ext: &str, output: Format) -> String {
    match output {
        Format::Pdf if normalize_extension(input_ext) == "csv" => "📄 Convert to PDF 📊".to_string(),
        Format::Pdf => "📄 Convert to PDF 📱".to_string(),
        Format::Jpg => "🖼️ Convert to JPG 🎨".to_string(),
        Format::Png => "🖼️ Convert to PNG 🎨".to_string(),
        Format::Xlsx => "📊 Convert to XLSX 📈".to_string(),
        Format::Csv => "📊 Convert to CSV 📉".to_string(),
        Format::Docx => "📄 Convert to DOCX 📱".to_string(),
    }
}

/// Menu for the given outputs (already ordered), with cancel last
pub fn menu_for(input_ext: &str, outputs: &[Format]) -> Vec<MenuEntry> {
    outputs
        .iter()
        .map(|&output| MenuEntry {
            label: label_for(input_ext, output),
            choice: Choice::Format(output),
        })
        .chain(std::iter::once(MenuEntry {
            label: CANCEL_LABEL.to_string(),
            choice: Choice::Cancel,
        }))
        .collect()
}

/// Recover a choice from button or typed text. Case-insensitive; known
/// decorations and the "convert to" prefix are ignored.
pub fn parse_choice(raw: &str) -> Choice {
    let mut text = raw.to_lowercase();
    for decoration in DECORATIONS {
        text = text.replace(decoration, " ");
    }
    // Stray emoji variation selectors
    text = text.replace('\u{fe0f}', "");

    let text = text.trim();
    let token = text.strip_prefix(CONVERT_PREFIX).unwrap_or(text).trim();

    if token == CANCEL_TOKEN {
        return Choice::Cancel;
    }
    match Format::from_extension(token) {
        Some(format) => Choice::Format(format),
        None => Choice::Unrecognized(token.to_string()),
    }
}
