//! Document and spreadsheet conversions through headless LibreOffice

use super::{Converter, ConverterError};
use crate::formats::Format;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Output LibreOffice is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeTarget {
    Pdf,
    Xlsx,
    Csv,
}

impl OfficeTarget {
    /// `--convert-to` argument
    pub fn filter(self) -> &'static str {
        match self {
            OfficeTarget::Pdf => "pdf",
            OfficeTarget::Xlsx => "xlsx:Calc MS Excel 2007 XML",
            // comma separated, double quotes, UTF-8, first line unchanged
            OfficeTarget::Csv => "csv:Text - txt - csv (StarCalc):44,34,76,1",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OfficeTarget::Pdf => Format::Pdf.extension(),
            OfficeTarget::Xlsx => Format::Xlsx.extension(),
            OfficeTarget::Csv => Format::Csv.extension(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OfficeConverter {
    soffice: PathBuf,
    target: OfficeTarget,
}

impl OfficeConverter {
    pub fn new(soffice: &Path, target: OfficeTarget) -> Self {
        Self {
            soffice: soffice.to_path_buf(),
            target,
        }
    }
}

#[async_trait]
impl Converter for OfficeConverter {
    async fn convert(
        &self,
        input: &Path,
        _variant: Option<Format>,
    ) -> Result<PathBuf, ConverterError> {
        let outdir = input
            .parent()
            .ok_or_else(|| ConverterError::External(format!("{} has no parent", input.display())))?;
        // A private profile per job lets conversions run side by side
        let profile = format!(
            "-env:UserInstallation=file://{}",
            outdir.join(".lo-profile").display()
        );

        tracing::debug!(
            soffice = %self.soffice.display(),
            filter = self.target.filter(),
            input = %input.display(),
            "Running LibreOffice"
        );

        let output = Command::new(&self.soffice)
            .arg("--headless")
            .arg("--norestore")
            .arg(profile)
            .arg("--convert-to")
            .arg(self.target.filter())
            .arg("--outdir")
            .arg(outdir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ConverterError::External(format!(
                    "failed to start {}: {e}",
                    self.soffice.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConverterError::External(format!(
                "{} exited with {}: {}",
                self.soffice.display(),
                output.status,
                stderr.trim()
            )));
        }

        let produced = input.with_extension(self.target.extension());
        if !produced.exists() {
            return Err(ConverterError::External(format!(
                "no {} output for {}",
                self.target.extension(),
                input.display()
            )));
        }
        Ok(produced)
    }
}
