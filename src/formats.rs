//! File formats and the registry of legal conversions
//!
//! Extensions are always normalized (lowercase, no leading dot, `jpeg` folded
//! into `jpg`) before any lookup.

mod choice;
mod registry;

pub use choice::{menu_for, parse_choice, Choice, MenuEntry};
pub use registry::{Capability, FormatRegistry, RegistryEntry};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Formats the bot knows how to read or produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Jpg,
    Png,
    Csv,
    Xlsx,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Pdf,
        Format::Docx,
        Format::Jpg,
        Format::Png,
        Format::Csv,
        Format::Xlsx,
    ];

    /// Canonical extension, also used as the choice token
    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Jpg => "jpg",
            Format::Png => "png",
            Format::Csv => "csv",
            Format::Xlsx => "xlsx",
        }
    }

    /// Parse an extension, normalizing it first
    pub fn from_extension(ext: &str) -> Option<Self> {
        let normalized = normalize_extension(ext);
        Format::ALL
            .into_iter()
            .find(|f| f.extension() == normalized)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Normalize a file extension: trim, drop leading dots, lowercase, fold
/// `jpeg` into `jpg`. Idempotent.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    if ext == "jpeg" {
        "jpg".to_string()
    } else {
        ext
    }
}

/// Normalized extension of a display name (empty when there is none)
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

/// File name without its final extension
pub fn base_name(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("file")
}
