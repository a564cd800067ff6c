//! User-facing reply texts
//!
//! Every message the bot sends lives here, so failure classification maps to
//! text in exactly one place.

use crate::dispatch::FailureKind;

const WELCOME: &str = "Welcome to the File Converter Bot! 👋\n\n\
I can help you convert files between different formats.\n\n\
📝 Available Conversions:\n\n\
📄 Documents:\n\
• DOCX → PDF\n\n\
📊 Spreadsheets:\n\
• CSV → PDF (Tables)\n\
• CSV → XLSX (Excel)\n\
• XLSX → CSV\n\n\
🖼️ Images:\n\
• JPG → PDF\n\
• JPG → PNG\n\
• PNG → PDF\n\
• PNG → JPG\n\n\
Just send me a file and I'll show you the available conversion options!";

const HELP: &str = "Here's how to use me:\n\n\
1️⃣ Send me a file\n\
2️⃣ Choose the format you want to convert to\n\
3️⃣ Wait for the converted file\n\n\
📝 Supported Formats:\n\n\
📄 Documents:\n\
• DOCX → PDF\n\n\
📊 Spreadsheets:\n\
• CSV → PDF (Tables)\n\
• CSV → XLSX (Excel)\n\
• XLSX → CSV\n\n\
🖼️ Images:\n\
• JPG → PDF\n\
• JPG → PNG\n\
• PNG → PDF\n\
• PNG → JPG\n\n\
❗ Maximum file size: 20MB";

const FILE_TOO_LARGE: &str = "❌ File is too large! Maximum size is 20MB.\n\
Please compress your file and try again.\n\n\
💡 Tips:\n\
• Compress the file\n\
• Split it into smaller parts\n\
• Use a different format";

const UNSUPPORTED_FORMAT: &str = "✅ I can handle these formats:\n\
📄 Documents: DOCX\n\
📊 Spreadsheets: CSV, XLSX\n\
🖼️ Images: JPG, JPEG, PNG\n\n\
💡 Tip: Make sure your file has the correct extension!";

const CHOOSE_FORMAT: &str = "✨ Choose your conversion format:\nTap the grid icon 🔲 below";

const ERROR_GENERIC: &str = "❌ Sorry, something went wrong.\n\
Please try again or contact support if the problem persists.\n\n\
💡 Make sure:\n\
• The file isn't corrupted\n\
• The file extension matches its content\n\
• You have a stable internet connection";

const OUTPUT_TOO_LARGE: &str = "⚠️ The converted file is too large to send via Telegram (>50MB).\n\
Please try with a smaller file or use a different format.";

const NOT_SUPPORTED: &str = "❌ Sorry, this conversion is not supported.\n\
Please try a different format.";

const CONVERSION_FAILED: &str = "❌ Sorry, there was an error converting your file.\n\
The file might be corrupted or in an unsupported format.\n\
Please try again with a different file.";

const CANCELLED: &str = "❌ Operation cancelled.\nSend me a new file when you're ready!";

const DONE: &str = "✨ Send me another file to convert!";

/// Caption attached to every converted document
pub const DOCUMENT_CAPTION: &str = "✅ Here's your converted file!";

/// Text replies the engine can ask for
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Welcome,
    Help,
    FileInfo {
        name: String,
        size: u64,
        extension: String,
    },
    ChooseFormat,
    Cancelled,
    Done,
    Failure(FailureKind),
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Reply::Welcome => WELCOME.to_string(),
            Reply::Help => HELP.to_string(),
            Reply::FileInfo {
                name,
                size,
                extension,
            } => file_info_text(name, *size, extension),
            Reply::ChooseFormat => CHOOSE_FORMAT.to_string(),
            Reply::Cancelled => CANCELLED.to_string(),
            Reply::Done => DONE.to_string(),
            Reply::Failure(kind) => failure_text(*kind).to_string(),
        }
    }

    /// Whether this reply reports a failed turn
    #[cfg(test)]
    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failure(_))
    }
}

/// The single mapping from failure category to user message
pub fn failure_text(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::UploadTooLarge => FILE_TOO_LARGE,
        FailureKind::UnsupportedInputFormat => UNSUPPORTED_FORMAT,
        FailureKind::UnsupportedConversion => NOT_SUPPORTED,
        FailureKind::ConversionFailed => CONVERSION_FAILED,
        FailureKind::OutputTooLarge | FailureKind::TransportPayloadTooLarge => OUTPUT_TOO_LARGE,
        FailureKind::TransportTimedOut | FailureKind::Internal => ERROR_GENERIC,
    }
}

#[allow(clippy::cast_precision_loss)] // display only, two decimals
fn file_info_text(name: &str, size: u64, extension: &str) -> String {
    let size_mb = size as f64 / (1024.0 * 1024.0);
    format!(
        "📁 File Information:\n📝 Name: {name}\n📊 Size: {size_mb:.2} MB\n🏷️ Type: {}",
        extension.to_uppercase()
    )
}
