//! Telegram Bot API adapter
//!
//! Implements the engine's transport contracts over plain HTTPS and turns
//! incoming updates into engine events. Transport failures are classified
//! here, at the boundary, so the engine never sees HTTP details.

mod api;
mod poller;
mod types;

pub use api::BotApi;
pub use poller::run_polling;

use crate::runtime::TransportError;
use reqwest::StatusCode;

/// Classify an error reported in a Bot API response body
pub(crate) fn classify_api_error(code: Option<u16>, description: &str) -> TransportError {
    let message = match code {
        Some(code) => format!("Telegram API error {code}: {description}"),
        None => format!("Telegram API error: {description}"),
    };
    let lowered = description.to_lowercase();

    if code == Some(StatusCode::PAYLOAD_TOO_LARGE.as_u16())
        || lowered.contains("too big")
        || lowered.contains("too large")
    {
        TransportError::payload_too_large(message)
    } else {
        TransportError::other(message)
    }
}

/// Classify an HTTP-level failure. The URL is dropped since it carries the
/// bot token.
pub(crate) fn classify_http_error(error: reqwest::Error) -> TransportError {
    let error = error.without_url();
    if error.is_timeout() {
        TransportError::timed_out(format!("Request timed out: {error}"))
    } else if error.status() == Some(StatusCode::PAYLOAD_TOO_LARGE) {
        TransportError::payload_too_large(format!("Payload rejected: {error}"))
    } else {
        TransportError::other(format!("HTTP error: {error}"))
    }
}
