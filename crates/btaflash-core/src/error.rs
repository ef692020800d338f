//! Error types for btaflash-core
//!
//! Every variant is fatal: nothing in the workflow retries or recovers
//! locally. Errors bubble up with `?` to the binary, which prints the
//! diagnostic and terminates the process.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The bootloader tool reported a timeout (autobaud got no answer)
    #[error(
        "Error connecting to Pi Hat.  Ensure that you have jumpers on D6 to Pi Header and Reset to Pi Header."
    )]
    Timeout,

    /// The GPIO daemon used for reset control is not running
    #[error(
        "Error initializing GPIO.  Make sure pigpiod is running (use 'sudo pigpiod' to start the daemon)"
    )]
    GpioUninitialized,

    /// The bootloader tool reported a generic failure
    #[error("Error {action}. Ensure you have jumpers connected to Pi Hat.")]
    OperationError {
        /// What was being attempted, e.g. "reading from firmware"
        action: &'static str,
    },

    /// A flash search found no match
    #[error("Could not find {pattern} in device flash.")]
    AddressNotFound {
        /// The searched byte pattern
        pattern: String,
    },

    /// User input is not a hex string
    #[error("Please enter a valid hex address: {0}")]
    InvalidFormat(String),

    /// Hex string is not a Bluetooth address with the expected header
    #[error("Invalid. Please enter a valid Bluetooth Address: {0}")]
    InvalidAddress(String),

    /// Flash copy did not produce every page
    #[error("Error reading full device flash ({pages} of {expected} pages)")]
    IncompleteImage {
        /// Pages actually read
        pages: usize,
        /// Pages required
        expected: usize,
    },

    /// A page read succeeded but its payload is unusable
    #[error("Malformed data for flash page {index}: {reason}")]
    MalformedPage {
        /// Page index
        index: usize,
        /// Why the payload was rejected
        reason: String,
    },

    /// The bootloader tool could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Interactive prompt failed
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// Backup file or output I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
