//! Converter capabilities
//!
//! Each capability turns an input file into an output file next to it. The
//! engine treats them as black boxes: a returned path must name an existing,
//! non-empty file, anything else is a failed conversion.

mod office;
mod pdf;
mod raster;

pub use office::{OfficeConverter, OfficeTarget};
pub use pdf::ImagePdfWriter;
pub use raster::ImageRecoder;

use crate::formats::{Capability, Format};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConverterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unsupported target variant: {0:?}")]
    UnsupportedVariant(Option<Format>),
    #[error("Output exceeds {limit} bytes even at the lowest quality")]
    OverBudget { limit: u64 },
    #[error("External converter failed: {0}")]
    External(String),
    #[error("Conversion task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One converter capability
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input`, returning the path of the produced file. Only
    /// variant-taking capabilities receive `variant`.
    async fn convert(&self, input: &Path, variant: Option<Format>)
        -> Result<PathBuf, ConverterError>;
}

/// Static capability table, built once at startup
#[derive(Clone, Default)]
pub struct ConverterSet {
    converters: HashMap<Capability, Arc<dyn Converter>>,
}

impl ConverterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production table. Office conversions are only installed when a
    /// LibreOffice binary is configured.
    pub fn builtin(soffice: Option<&Path>) -> Self {
        let mut set = Self::new()
            .with(Capability::ImageRecode, ImageRecoder::new())
            .with(Capability::ImageToPdf, ImagePdfWriter::new());

        if let Some(soffice) = soffice {
            set = set
                .with(
                    Capability::DocumentToPdf,
                    OfficeConverter::new(soffice, OfficeTarget::Pdf),
                )
                .with(
                    Capability::TableToPdf,
                    OfficeConverter::new(soffice, OfficeTarget::Pdf),
                )
                .with(
                    Capability::TableToSpreadsheet,
                    OfficeConverter::new(soffice, OfficeTarget::Xlsx),
                )
                .with(
                    Capability::SpreadsheetToTable,
                    OfficeConverter::new(soffice, OfficeTarget::Csv),
                );
        }
        set
    }

    #[must_use]
    pub fn with(mut self, capability: Capability, converter: impl Converter + 'static) -> Self {
        self.converters.insert(capability, Arc::new(converter));
        self
    }

    pub fn get(&self, capability: Capability) -> Option<Arc<dyn Converter>> {
        self.converters.get(&capability).cloned()
    }

    pub fn installed(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.converters.keys().map(|c| c.name()).collect();
        names.sort_unstable();
        names
    }
}
