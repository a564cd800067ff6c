//! Static table of legal conversions
//!
//! Built once at startup and shared read-only between conversations.

use super::Format;
use crate::state_machine::UploadedFile;

/// A converter capability, one per distinct (input family, output) pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// jpg/png -> pdf
    ImageToPdf,
    /// jpg <-> png; needs the target variant
    ImageRecode,
    /// docx -> pdf
    DocumentToPdf,
    /// csv -> pdf
    TableToPdf,
    /// csv -> xlsx
    TableToSpreadsheet,
    /// xlsx -> csv
    SpreadsheetToTable,
}

impl Capability {
    /// Whether the converter must be told which output variant to produce
    pub fn takes_variant(self) -> bool {
        matches!(self, Capability::ImageRecode)
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::ImageToPdf => "image_to_pdf",
            Capability::ImageRecode => "image_recode",
            Capability::DocumentToPdf => "document_to_pdf",
            Capability::TableToPdf => "table_to_pdf",
            Capability::TableToSpreadsheet => "table_to_spreadsheet",
            Capability::SpreadsheetToTable => "spreadsheet_to_table",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub input: Format,
    pub output: Format,
    pub capability: Capability,
}

impl RegistryEntry {
    pub const fn new(input: Format, output: Format, capability: Capability) -> Self {
        Self {
            input,
            output,
            capability,
        }
    }
}

/// Declaration order matters: it is the menu order after pdf.
const BUILTIN: &[RegistryEntry] = &[
    RegistryEntry::new(Format::Docx, Format::Pdf, Capability::DocumentToPdf),
    RegistryEntry::new(Format::Jpg, Format::Pdf, Capability::ImageToPdf),
    RegistryEntry::new(Format::Jpg, Format::Png, Capability::ImageRecode),
    RegistryEntry::new(Format::Png, Format::Pdf, Capability::ImageToPdf),
    RegistryEntry::new(Format::Png, Format::Jpg, Capability::ImageRecode),
    RegistryEntry::new(Format::Csv, Format::Pdf, Capability::TableToPdf),
    RegistryEntry::new(Format::Csv, Format::Xlsx, Capability::TableToSpreadsheet),
    RegistryEntry::new(Format::Xlsx, Format::Csv, Capability::SpreadsheetToTable),
];

/// Format photos are treated as regardless of their nominal extension
const PHOTO_FORMAT: Format = Format::Jpg;

#[derive(Debug, Clone)]
pub struct FormatRegistry {
    entries: Vec<RegistryEntry>,
}

impl FormatRegistry {
    /// The conversions the bot ships with
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.to_vec(),
        }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Outputs reachable from an input extension: pdf first, then the rest in
    /// declaration order. Empty for unknown inputs.
    pub fn legal_outputs(&self, input_ext: &str) -> Vec<Format> {
        let Some(input) = Format::from_extension(input_ext) else {
            return Vec::new();
        };

        let mut outputs: Vec<Format> = self
            .entries
            .iter()
            .filter(|e| e.input == input)
            .map(|e| e.output)
            .collect();

        // Stable sort keeps declaration order for everything but pdf
        outputs.sort_by_key(|f| *f != Format::Pdf);
        outputs
    }

    /// Outputs offered for an upload. Photos skip the extension check and
    /// always get the jpg outputs.
    pub fn outputs_for(&self, file: &UploadedFile) -> Vec<Format> {
        if file.is_photo {
            self.legal_outputs(PHOTO_FORMAT.extension())
        } else {
            self.legal_outputs(&file.extension())
        }
    }

    /// The capability for a pair, if registered
    pub fn resolve(&self, input_ext: &str, output_ext: &str) -> Option<Capability> {
        let input = Format::from_extension(input_ext)?;
        let output = Format::from_extension(output_ext)?;
        self.entries
            .iter()
            .find(|e| e.input == input && e.output == output)
            .map(|e| e.capability)
    }

    /// Extension used for registry lookups of an upload
    pub fn lookup_extension(file: &UploadedFile) -> String {
        if file.is_photo {
            PHOTO_FORMAT.extension().to_string()
        } else {
            file.extension()
        }
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
