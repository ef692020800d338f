//! Response classification
//!
//! The bootloader tool reports everything as unstructured text on stdout.
//! This module scans that text for a handful of literal markers and turns
//! one invocation's output into a [`CommandOutcome`].

use crate::error::{Error, Result};

/// Marker printed by the tool when the serial link times out
pub const MARKER_TIMEOUT: &str = "Timed";
/// Marker printed when the GPIO daemon is unreachable
pub const MARKER_GPIO: &str = "GPIO";
/// Marker printed when a search finds nothing
pub const MARKER_NOT_FOUND: &str = "Unable";
/// Marker for any other failure
pub const MARKER_ERROR: &str = "Error";
/// Prefix of every offset printed by a search
pub const MARKER_HEX: &str = "0x";
/// Header of the address/data table printed by a non-silent read
pub const MARKER_LISTING_START: &str = "Address";
/// Printed once the tool is done and resets the device
pub const MARKER_LISTING_END: &str = "Resetting";

/// Characters dropped in front of the end marker of a read listing
const LISTING_TRAILER_LEN: usize = 2;

/// How the payload of a successful response is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Silent read: the whole output is the hex data
    Read,
    /// Non-silent read: the data table between the listing markers
    ReadListing,
    /// Write: no payload
    Write,
    /// Search: the reported offsets
    Find,
}

impl ResponseKind {
    /// Human-readable action used in diagnostics
    pub fn action(self) -> &'static str {
        match self {
            Self::Read | Self::ReadListing => "reading from firmware",
            Self::Write => "writing to device",
            Self::Find => "finding bytes",
        }
    }
}

/// Result of one invocation of the bootloader tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The tool reported no failure
    Success(String),
    /// The tool timed out talking to the device
    Timeout,
    /// The GPIO daemon is not running
    GpioUninitialized,
    /// The tool reported an error
    OperationError,
    /// A search found nothing
    AddressNotFound,
}

impl CommandOutcome {
    /// Whether this is a `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Unwrap the payload or turn the failure into a fatal [`Error`]
    ///
    /// `kind` selects the diagnostic for `OperationError`, `subject` names
    /// what was searched for in the `AddressNotFound` diagnostic.
    pub fn into_payload(self, kind: ResponseKind, subject: &str) -> Result<String> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Timeout => Err(Error::Timeout),
            Self::GpioUninitialized => Err(Error::GpioUninitialized),
            Self::OperationError => Err(Error::OperationError {
                action: kind.action(),
            }),
            Self::AddressNotFound => Err(Error::AddressNotFound {
                pattern: subject.to_string(),
            }),
        }
    }
}

/// Classify the raw output of one tool invocation
///
/// First match wins: `Timed`, then `GPIO`, then (searches only) `Unable`,
/// then `Error`. Anything else is a success whose payload depends on `kind`.
pub fn classify(text: &str, kind: ResponseKind) -> CommandOutcome {
    let outcome = if text.contains(MARKER_TIMEOUT) {
        CommandOutcome::Timeout
    } else if text.contains(MARKER_GPIO) {
        CommandOutcome::GpioUninitialized
    } else if kind == ResponseKind::Find && text.contains(MARKER_NOT_FOUND) {
        CommandOutcome::AddressNotFound
    } else if text.contains(MARKER_ERROR) {
        CommandOutcome::OperationError
    } else {
        match kind {
            ResponseKind::Read => CommandOutcome::Success(text.trim_end().to_string()),
            ResponseKind::ReadListing => CommandOutcome::Success(extract_listing(text)),
            ResponseKind::Write => CommandOutcome::Success(String::new()),
            // A search that printed no offset found nothing
            ResponseKind::Find => match text.find(MARKER_HEX) {
                Some(idx) => CommandOutcome::Success(text[idx..].trim().to_string()),
                None => CommandOutcome::AddressNotFound,
            },
        }
    };
    log::trace!("classified {:?} response as {:?}", kind, outcome);
    outcome
}

/// Data line of a silent read payload
///
/// With `-l` the tool prints its port table before the data, so only the
/// last line carries the bytes read.
pub fn data_line(payload: &str) -> &str {
    payload.trim_end().lines().last().unwrap_or_default().trim()
}

/// Text strictly between the listing markers, minus the trailer
fn extract_listing(text: &str) -> String {
    let text = text.trim_end();
    let start = text
        .find(MARKER_LISTING_START)
        .map(|idx| idx + MARKER_LISTING_START.len())
        .unwrap_or(0);
    let end = match text.find(MARKER_LISTING_END) {
        Some(idx) => idx.saturating_sub(LISTING_TRAILER_LEN),
        None => text.len(),
    };
    if end <= start {
        return String::new();
    }
    text.get(start..end).unwrap_or_default().to_string()
}
