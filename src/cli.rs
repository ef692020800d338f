//! CLI argument parsing

use btaflash_core::address::parse_offset;
use btaflash_core::workflow::Operation;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_number(s: &str) -> Result<u32, String> {
    parse_offset(s).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "btaflash")]
#[command(
    author,
    version,
    about = "Bluetooth address and flash tool for the CC2650 Pi Hat",
    long_about = "Reads and writes the Bluetooth address and raw memory of a CC2650 \
                  through the firmwareDownloadUART serial bootloader tool. Device \
                  flash is backed up before anything is written."
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["address", "new_address", "find", "read", "write", "file"])
        .multiple(false)
))]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// List available serial ports on every call to the tool
    ///
    /// Given on its own, a single one-byte read at offset 0 is issued so the
    /// tool prints its port table.
    #[arg(short, long)]
    pub list: bool,

    /// Serial port index to use
    #[arg(short, long, value_name = "PORT_NUM", value_parser = parse_number)]
    pub port: Option<u32>,

    /// Search flash for bytes (0x-prefixed hex or a string)
    #[arg(short, long, value_name = "SEARCH_STR")]
    pub find: Option<String>,

    /// Read NUM_BYTES of memory starting at ADDR
    #[arg(short, long, num_args = 2, value_names = ["ADDR", "NUM_BYTES"])]
    pub read: Option<Vec<String>>,

    /// Write WRITE_STR (0x-prefixed hex or a string) at ADDR
    #[arg(short, long, num_args = 2, value_names = ["ADDR", "WRITE_STR"])]
    pub write: Option<Vec<String>>,

    /// Read the current Bluetooth address
    #[arg(short, long)]
    pub address: bool,

    /// Write a new Bluetooth address (e.g. 0xb0b448010203)
    #[arg(short = 'n', long, value_name = "BT_ADDR")]
    pub new_address: Option<String>,

    /// Rewrite the whole flash from an image file
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Don't back up flash before writing
    #[arg(short = 'b', long)]
    pub no_backup: bool,

    /// Path of the firmware download tool
    #[arg(long, value_name = "PATH", default_value = btaflash_core::gateway::DEFAULT_PROGRAM)]
    pub tool: String,

    /// Run the tool directly instead of through sudo
    #[arg(long)]
    pub no_sudo: bool,

    /// Directory backups are written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub backup_dir: PathBuf,

    /// Backup file name (skips the prompt)
    #[arg(long, value_name = "NAME")]
    pub backup_name: Option<String>,

    /// Delay before each page read of a backup, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub pace_ms: u64,
}

impl Cli {
    /// Default log filter for the requested verbosity
    ///
    /// `RUST_LOG` still takes precedence when set.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Operation selected on the command line
    ///
    /// Returns `None` when nothing was requested.
    pub fn operation(&self) -> Result<Option<Operation>, String> {
        if self.address {
            return Ok(Some(Operation::ReadAddress));
        }
        if let Some(address) = &self.new_address {
            return Ok(Some(Operation::WriteAddress {
                address: address.clone(),
            }));
        }
        if let Some(pattern) = &self.find {
            return Ok(Some(Operation::Find {
                pattern: pattern.clone(),
            }));
        }
        if let Some([offset, count]) = self.read.as_deref() {
            let count = parse_number(count)?;
            return Ok(Some(Operation::ReadRange {
                offset: offset.clone(),
                count: count as usize,
            }));
        }
        if let Some([offset, value]) = self.write.as_deref() {
            return Ok(Some(Operation::WriteRange {
                offset: offset.clone(),
                value: value.clone(),
            }));
        }
        if let Some(image) = &self.file {
            return Ok(Some(Operation::FullRewrite {
                image: image.clone(),
            }));
        }
        if self.list {
            return Ok(Some(Operation::ListPorts));
        }
        Ok(None)
    }
}
