//! Workflow orchestration
//!
//! A run executes exactly one [`Operation`]. Operations that modify flash
//! (`WriteAddress`, `WriteRange`, `FullRewrite`) take a full backup first
//! unless backups were explicitly disabled; the others never do.
//!
//! Results meant for the user are written to the output sink handed to
//! [`Workflow::new`]. Progress goes through `log`.

use std::io::{self, Write};
use std::path::PathBuf;

use crate::address::{
    format_offset, header_search_pattern, locate_header_offset, reverse_bytes, BluetoothAddress,
    BTA_LEN,
};
use crate::backup::{backup_flash, BackupConfig, BackupNamer, BackupProgress};
use crate::error::{Error, Result};
use crate::gateway::{Gateway, ToolRunner};
use crate::request::CommandRequest;
use crate::response::{data_line, ResponseKind};

/// One terminal operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Enumerate serial ports
    ListPorts,
    /// Print the Bluetooth address stored on the device
    ReadAddress,
    /// Store a new Bluetooth address
    WriteAddress {
        /// New address in display order, `0x` optional
        address: String,
    },
    /// Search flash for a byte pattern
    Find {
        /// `0x`-prefixed hex or a literal string
        pattern: String,
    },
    /// Print a range of memory
    ReadRange {
        /// Start offset, hex with `0x` or decimal
        offset: String,
        /// Number of bytes
        count: usize,
    },
    /// Write bytes at an offset
    WriteRange {
        /// Start offset, hex with `0x` or decimal
        offset: String,
        /// `0x`-prefixed hex or a literal string
        value: String,
    },
    /// Reprogram the whole flash from an image file
    FullRewrite {
        /// Image to program
        image: PathBuf,
    },
}

impl Operation {
    /// Whether the operation modifies device flash
    pub fn mutates_flash(&self) -> bool {
        matches!(
            self,
            Self::WriteAddress { .. } | Self::WriteRange { .. } | Self::FullRewrite { .. }
        )
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListPorts => "list-ports",
            Self::ReadAddress => "read-address",
            Self::WriteAddress { .. } => "write-address",
            Self::Find { .. } => "find",
            Self::ReadRange { .. } => "read-range",
            Self::WriteRange { .. } => "write-range",
            Self::FullRewrite { .. } => "full-rewrite",
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The operation finished
    Done,
    /// Control was handed to the tool for a full rewrite
    ///
    /// Nothing is known about the outcome beyond the tool's exit code.
    HandedOff {
        /// Exit code of the tool, `None` if it was killed by a signal
        code: Option<i32>,
    },
}

/// Workflow settings
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Don't back up flash before modifying it
    pub skip_backup: bool,
    /// Backup settings
    pub backup: BackupConfig,
}

/// Sequences tool calls for one operation
pub struct Workflow<'a, R> {
    gateway: Gateway<R>,
    options: WorkflowOptions,
    namer: &'a mut dyn BackupNamer,
    progress: &'a mut dyn BackupProgress,
    out: &'a mut dyn Write,
    backups: Vec<PathBuf>,
}

impl<'a, R: ToolRunner> Workflow<'a, R> {
    /// Create a workflow
    pub fn new(
        gateway: Gateway<R>,
        options: WorkflowOptions,
        namer: &'a mut dyn BackupNamer,
        progress: &'a mut dyn BackupProgress,
        out: &'a mut dyn Write,
    ) -> Self {
        Self {
            gateway,
            options,
            namer,
            progress,
            out,
            backups: Vec::new(),
        }
    }

    /// Backups taken during this run
    pub fn backups(&self) -> &[PathBuf] {
        &self.backups
    }

    /// The gateway
    pub fn gateway(&self) -> &Gateway<R> {
        &self.gateway
    }

    /// Execute one operation
    pub fn run(&mut self, operation: Operation) -> Result<Completion> {
        log::debug!("running {} operation", operation.name());
        match operation {
            Operation::ListPorts => self.list_ports(),
            Operation::ReadAddress => self.read_address(),
            Operation::WriteAddress { address } => self.write_address(&address),
            Operation::Find { pattern } => self.find(&pattern),
            Operation::ReadRange { offset, count } => self.read_range(&offset, count),
            Operation::WriteRange { offset, value } => self.write_range(&offset, &value),
            Operation::FullRewrite { image } => return self.full_rewrite(image),
        }?;
        Ok(Completion::Done)
    }

    /// Back up flash unless backups are disabled
    fn ensure_backup(&mut self) -> Result<Option<PathBuf>> {
        if self.options.skip_backup {
            log::warn!("Skipping backup of device flash");
            return Ok(None);
        }
        let path = backup_flash(
            &mut self.gateway,
            &mut *self.namer,
            &self.options.backup,
            &mut *self.progress,
        )?;
        self.backups.push(path.clone());
        Ok(Some(path))
    }

    fn request(&mut self, request: &CommandRequest, subject: &str) -> Result<String> {
        let kind = request.response_kind().unwrap_or(ResponseKind::Write);
        self.gateway.invoke(request)?.into_payload(kind, subject)
    }

    /// Offset of the stored address, formatted for the tool
    fn address_offset(&mut self) -> Result<String> {
        log::info!("Finding BT Address...");
        let pattern = header_search_pattern();
        let found = self.request(&CommandRequest::find(pattern.as_str()), "BT Address header")?;
        let offset = format_offset(locate_header_offset(&found)?);
        log::debug!("BT Address record starts at {}", offset);
        Ok(offset)
    }

    /// Stored address at `offset`, in display order
    fn current_address(&mut self, offset: &str) -> Result<String> {
        log::info!("Reading BT Address...");
        let stored = self.request(&CommandRequest::read(offset, BTA_LEN), "")?;
        Ok(reverse_bytes(data_line(&stored)))
    }

    fn list_ports(&mut self) -> Result<()> {
        // The tool prints its port table before touching the device; a
        // one-byte read is the least intrusive call to carry `-l`.
        let listing = self.request(&CommandRequest::read("0", 1), "")?;
        writeln!(self.out, "{}", listing)?;
        Ok(())
    }

    fn read_address(&mut self) -> Result<()> {
        let offset = self.address_offset()?;
        let current = self.current_address(&offset)?;
        writeln!(self.out, "Current BT Address: 0x{}", current)?;
        Ok(())
    }

    fn write_address(&mut self, address: &str) -> Result<()> {
        // Reject bad input before anything touches the device
        let address = BluetoothAddress::parse(address)?;

        self.ensure_backup()?;

        let offset = self.address_offset()?;
        let current = self.current_address(&offset)?;
        writeln!(self.out, "Current BT Address: 0x{}", current)?;

        log::info!("Writing new BT Address...");
        let value = format!("0x{}", address.device_hex());
        self.request(&CommandRequest::write(offset.as_str(), value), "")?;

        writeln!(self.out, "Wrote new BT Address {} to {}.", address, offset)?;
        writeln!(self.out)?;
        writeln!(self.out, "Program complete.")?;
        writeln!(
            self.out,
            "Please remove the jumpers and press the reset button on the Pi Hat."
        )?;
        Ok(())
    }

    fn find(&mut self, pattern: &str) -> Result<()> {
        log::info!("Searching flash for {}...", pattern);
        let found = self.request(&CommandRequest::find(pattern), pattern)?;
        writeln!(self.out, "Bytes {} were found at:", pattern)?;
        writeln!(self.out, "{}", found)?;
        Ok(())
    }

    fn read_range(&mut self, offset: &str, count: usize) -> Result<()> {
        log::info!("Reading {} bytes from {}...", count, offset);
        let listing = self.request(&CommandRequest::read_listing(offset, count), "")?;
        write!(self.out, "{}", listing)?;
        if !listing.ends_with('\n') {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn write_range(&mut self, offset: &str, value: &str) -> Result<()> {
        self.ensure_backup()?;

        log::info!("Writing {} to {}...", value, offset);
        self.request(&CommandRequest::write_silent(offset, value), "")?;
        writeln!(self.out, "Success.")?;
        Ok(())
    }

    fn full_rewrite(&mut self, image: PathBuf) -> Result<Completion> {
        if !image.is_file() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("image {} not found", image.display()),
            )));
        }

        self.ensure_backup()?;

        log::info!("Handing off to the bootloader tool to program {}", image.display());
        self.out.flush()?;
        let code = self.gateway.hand_off(&CommandRequest::rewrite_flash(image))?;
        Ok(Completion::HandedOff { code })
    }
}
