//! Requests to the bootloader tool
//!
//! A [`CommandRequest`] describes one invocation: which operation, where,
//! how many bytes and what to write. It knows how to render itself into the
//! tool's argument syntax (`-r<offset> -n<count>`, `-w<offset> <value>`,
//! `-f<pattern>`, or a bare image path) and which [`ResponseKind`] its
//! output must be classified with.

use std::path::PathBuf;

use crate::response::ResponseKind;

/// Operation performed by one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Read `count` bytes at `offset`
    Read {
        /// Offset as passed to the tool (hex with `0x` or decimal)
        offset: String,
        /// Number of bytes
        count: usize,
    },
    /// Write `value` at `offset`
    Write {
        /// Offset as passed to the tool
        offset: String,
        /// Bytes to write, `0x`-prefixed hex or a literal string
        value: String,
    },
    /// Search flash for a byte pattern
    Find {
        /// `0x`-prefixed hex or a literal string
        pattern: String,
    },
    /// Program a complete image file
    RewriteFlash {
        /// Image to program
        image: PathBuf,
    },
}

/// One immutable request to the bootloader tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    kind: RequestKind,
    silent: bool,
}

impl CommandRequest {
    /// Silent read; the tool prints the bytes as bare hex
    pub fn read(offset: impl Into<String>, count: usize) -> Self {
        Self {
            kind: RequestKind::Read {
                offset: offset.into(),
                count,
            },
            silent: true,
        }
    }

    /// Non-silent read; the tool prints an address/data table
    pub fn read_listing(offset: impl Into<String>, count: usize) -> Self {
        Self {
            kind: RequestKind::Read {
                offset: offset.into(),
                count,
            },
            silent: false,
        }
    }

    /// Non-silent write
    pub fn write(offset: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Write {
                offset: offset.into(),
                value: value.into(),
            },
            silent: false,
        }
    }

    /// Silent write
    pub fn write_silent(offset: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Write {
                offset: offset.into(),
                value: value.into(),
            },
            silent: true,
        }
    }

    /// Silent search
    pub fn find(pattern: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Find {
                pattern: pattern.into(),
            },
            silent: true,
        }
    }

    /// Full-flash rewrite from an image file
    pub fn rewrite_flash(image: impl Into<PathBuf>) -> Self {
        Self {
            kind: RequestKind::RewriteFlash {
                image: image.into(),
            },
            silent: false,
        }
    }

    /// The operation
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// Whether the tool runs in silent mode (`-s`)
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// How the output of this request is classified
    ///
    /// Returns `None` for a full rewrite, whose output is never captured.
    pub fn response_kind(&self) -> Option<ResponseKind> {
        match &self.kind {
            RequestKind::Read { .. } if self.silent => Some(ResponseKind::Read),
            RequestKind::Read { .. } => Some(ResponseKind::ReadListing),
            RequestKind::Write { .. } => Some(ResponseKind::Write),
            RequestKind::Find { .. } => Some(ResponseKind::Find),
            RequestKind::RewriteFlash { .. } => None,
        }
    }

    /// Operation-specific arguments, in the tool's syntax
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.silent {
            args.push("-s".to_string());
        }
        match &self.kind {
            RequestKind::Read { offset, count } => {
                args.push(format!("-r{}", offset));
                args.push(format!("-n{}", count));
            }
            RequestKind::Write { offset, value } => {
                args.push(format!("-w{}", offset));
                args.push(value.clone());
            }
            RequestKind::Find { pattern } => args.push(format!("-f{}", pattern)),
            RequestKind::RewriteFlash { image } => args.push(image.display().to_string()),
        }
        args
    }
}
