//! btaflash-dummy - In-memory emulation of the SBL firmware download tool
//!
//! This crate provides a [`ToolRunner`] that behaves like
//! `firmwareDownloadUART` talking to a CC2650 with an emulated flash: it
//! understands the same arguments and prints the same text, including the
//! failure messages. Faults can be injected on a chosen call. It's useful
//! for testing and development without a Pi Hat.

use std::fs;

use btaflash_core::address::{parse_offset, reverse_bytes, BTA_HEADER};
use btaflash_core::backup::FLASH_SIZE;
use btaflash_core::error::Result;
use btaflash_core::gateway::ToolRunner;

/// Maximum number of bytes the tool reads in one call
pub const MAX_READ_LEN: usize = 4096;

const RULE: &str = "+--------------------------------------------------------------------+";

/// Failure the emulated tool reports instead of running a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The autobaud handshake got no answer
    Timeout,
    /// The GPIO daemon is not running
    GpioUninitialized,
    /// The bootloader rejected the command
    CommandFailed,
}

/// Configuration for the dummy tool
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Where the Bluetooth address record is stored
    pub address_offset: usize,
    /// Bluetooth address in display order
    pub address: String,
    /// Serial ports reported by `-l`
    pub ports: Vec<String>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: FLASH_SIZE,
            address_offset: 0x1_ffa0,
            address: format!("{}c0ffee", BTA_HEADER),
            ports: vec!["/dev/ttyS0".to_string()],
        }
    }
}

/// Parsed command line of one invocation
#[derive(Debug, Default)]
struct Invocation {
    silent: bool,
    list_ports: bool,
    port: Option<String>,
    read: Option<String>,
    count: Option<String>,
    write: Option<String>,
    find: Option<String>,
    positional: Option<String>,
}

impl Invocation {
    fn parse(argv: &[String]) -> Self {
        let mut inv = Self::default();
        // Skip the launcher and program name
        let start = argv
            .iter()
            .position(|a| a != "sudo")
            .map_or(argv.len(), |i| i + 1);
        for arg in &argv[start..] {
            if let Some(flag) = arg.strip_prefix('-') {
                let mut chars = flag.chars();
                let opt = chars.next();
                let value = Some(chars.as_str().to_string()).filter(|v| !v.is_empty());
                match opt {
                    Some('s') => inv.silent = true,
                    Some('l') => inv.list_ports = true,
                    Some('p') => inv.port = value,
                    Some('r') => inv.read = value,
                    Some('n') => inv.count = value,
                    Some('w') => inv.write = value,
                    Some('f') => inv.find = value,
                    _ => {}
                }
            } else {
                inv.positional = Some(arg.clone());
            }
        }
        inv
    }
}

/// Dummy SBL tool
///
/// Emulates the tool and the device behind it for testing purposes.
pub struct DummyTool {
    config: DummyConfig,
    data: Vec<u8>,
    calls: Vec<Vec<String>>,
    faults: Vec<(usize, Fault)>,
    images: Vec<String>,
}

impl DummyTool {
    /// Create a new dummy tool with the given configuration
    ///
    /// Flash is erased (0xFF) except for the address record.
    pub fn new(config: DummyConfig) -> Self {
        let mut data = vec![0xFF; config.size];
        if let Ok(stored) = hex::decode(reverse_bytes(&config.address)) {
            let end = (config.address_offset + stored.len()).min(data.len());
            let start = config.address_offset.min(end);
            data[start..end].copy_from_slice(&stored[..end - start]);
        }
        Self {
            config,
            data,
            calls: Vec::new(),
            faults: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Create a new dummy tool with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Report `fault` on the call with index `call` (0-based)
    pub fn fail_on_call(mut self, call: usize, fault: Fault) -> Self {
        self.faults.push((call, fault));
        self
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every command line received, in order
    pub fn calls(&self) -> &[Vec<String>] {
        &self.calls
    }

    /// Image files programmed through full rewrites
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Bluetooth address currently stored, in display order
    pub fn stored_address(&self) -> String {
        let start = self.config.address_offset;
        let end = (start + 6).min(self.data.len());
        reverse_bytes(&hex::encode(&self.data[start.min(end)..end]))
    }

    fn record(&mut self, argv: &[String]) -> Option<Fault> {
        let index = self.calls.len();
        self.calls.push(argv.to_vec());
        self.faults
            .iter()
            .find(|(call, _)| *call == index)
            .map(|(_, fault)| *fault)
    }

    fn fault_text(fault: Fault) -> String {
        match fault {
            Fault::Timeout => {
                "Timed out waiting for ACK/NAK. No response from device.\n\n\nError: 9\n".to_string()
            }
            Fault::GpioUninitialized => {
                "initInitialise: Can't lock /var/run/pigpio.pid\nFailed to initialize GPIO\n"
                    .to_string()
            }
            Fault::CommandFailed => "\n\nError: 3\n".to_string(),
        }
    }

    fn banner(&self, inv: &Invocation, out: &mut String) {
        if !inv.silent {
            out.push_str(RULE);
            out.push_str("\n| Serial Bootloader Library Firmware Download Application for CC2650 |\n");
            out.push_str(RULE);
            out.push('\n');
        }
        if inv.list_ports {
            if inv.silent {
                out.push_str(RULE);
                out.push('\n');
            }
            out.push_str(&format!("{:<68}|\n", "| COM ports:"));
            out.push_str(RULE);
            out.push('\n');
            out.push_str(&format!("{:<65}|\n", "|Idx\t| Description"));
            for (i, port) in self.config.ports.iter().enumerate() {
                out.push_str(&format!("|{:2}\t| {}\n", i, port));
            }
            out.push_str(RULE);
            out.push('\n');
        }
    }

    fn port_name(&self, inv: &Invocation) -> &str {
        let index = inv
            .port
            .as_deref()
            .and_then(|p| parse_offset(p).ok())
            .unwrap_or(0) as usize;
        self.config
            .ports
            .get(index)
            .map(String::as_str)
            .unwrap_or("?")
    }

    fn reset(inv: &Invocation, out: &mut String) {
        if !inv.silent {
            out.push_str("\n\nResetting device ...\nOK\n");
        }
    }

    /// Bytes to write or search for; `0x` means hex
    fn bytes_of(input: &str) -> Option<Vec<u8>> {
        match input.strip_prefix("0x") {
            Some(digits) => hex::decode(digits).ok(),
            None => Some(input.as_bytes().to_vec()),
        }
    }

    fn read(&mut self, inv: &Invocation, offset: &str, out: &mut String) {
        let count = inv
            .count
            .as_deref()
            .and_then(|c| parse_offset(c).ok())
            .unwrap_or(0) as usize;
        if !(1..=MAX_READ_LEN).contains(&count) {
            out.push_str("Read Length must be between 1 and 4096\n\n\nError: 1\n");
            return;
        }
        let Some(start) = parse_offset(offset).ok().map(|o| o as usize) else {
            out.push_str("Error reading from firmware.\n");
            return;
        };
        if start + count > self.data.len() {
            out.push_str("Error reading from firmware.\n\n\nError: 3\n");
            return;
        }

        if !inv.silent {
            out.push_str("Reading data ...\n");
            out.push_str(&format!("\n\n{:<8}\tData", "Address"));
        }
        for (i, byte) in self.data[start..start + count].iter().enumerate() {
            if i % 16 == 0 && !inv.silent {
                out.push_str(&format!("\n0x{:08x}\t", start + i));
            }
            out.push_str(&format!("{:02x}", byte));
        }
        out.push('\n');
        Self::reset(inv, out);
    }

    fn write(&mut self, inv: &Invocation, offset: &str, out: &mut String) {
        let value = inv.positional.as_deref().unwrap_or_default();
        let (Some(start), Some(bytes)) = (
            parse_offset(offset).ok().map(|o| o as usize),
            Self::bytes_of(value),
        ) else {
            out.push_str("Error writing to device.\n");
            return;
        };
        if bytes.is_empty() || start + bytes.len() > self.data.len() {
            out.push_str("Error writing to device.\n\n\nError: 3\n");
            return;
        }

        if !inv.silent {
            out.push_str("Writing data ...\n");
        }
        self.data[start..start + bytes.len()].copy_from_slice(&bytes);
        log::debug!("dummy: wrote {} bytes at 0x{:x}", bytes.len(), start);
        Self::reset(inv, out);
    }

    fn find(&mut self, inv: &Invocation, pattern: &str, out: &mut String) {
        let shown = pattern.strip_prefix("0x").unwrap_or(pattern);
        let needle = match Self::bytes_of(pattern) {
            Some(needle) if !needle.is_empty() => needle,
            _ => {
                out.push_str("Error finding bytes.\n");
                return;
            }
        };
        if !inv.silent {
            out.push_str("Searching for bytes ...\n");
        }
        let hits: Vec<usize> = self
            .data
            .windows(needle.len())
            .enumerate()
            .filter(|(_, w)| *w == needle.as_slice())
            .map(|(i, _)| i)
            .collect();
        if hits.is_empty() {
            out.push_str(&format!("\nUnable to find bytes '{}'.\n", shown));
        } else {
            if !inv.silent {
                out.push_str(&format!("\nBytes '{}' were found at: \n", shown));
            }
            for hit in hits {
                out.push_str(&format!("0x{:08x}\n", hit));
            }
        }
        Self::reset(inv, out);
    }
}

impl ToolRunner for DummyTool {
    fn capture(&mut self, argv: &[String]) -> Result<String> {
        let fault = self.record(argv);
        let inv = Invocation::parse(argv);
        let mut out = String::new();
        self.banner(&inv, &mut out);

        if !inv.silent {
            out.push_str(&format!(
                "\nConnecting ({} @ 460800 baud) ...\n",
                self.port_name(&inv)
            ));
        }

        if let Some(fault) = fault {
            out.push_str(&Self::fault_text(fault));
            return Ok(out);
        }

        if let Some(offset) = inv.read.clone() {
            self.read(&inv, &offset, &mut out);
        } else if let Some(offset) = inv.write.clone() {
            self.write(&inv, &offset, &mut out);
        } else if let Some(pattern) = inv.find.clone() {
            self.find(&inv, &pattern, &mut out);
        } else {
            out.push_str("Please enter the file path: ");
        }
        Ok(out)
    }

    fn hand_off(&mut self, argv: &[String]) -> Result<Option<i32>> {
        let fault = self.record(argv);
        let inv = Invocation::parse(argv);
        if fault.is_some() {
            return Ok(Some(1));
        }
        let Some(path) = inv.positional else {
            return Ok(Some(1));
        };
        match fs::read(&path) {
            Ok(image) => {
                let len = image.len().min(self.data.len());
                self.data[..len].copy_from_slice(&image[..len]);
                self.images.push(path);
                Ok(Some(0))
            }
            Err(e) => {
                log::debug!("dummy: unable to open {}: {}", path, e);
                Ok(Some(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        ["sudo", "./firmwareDownloadUART"]
            .iter()
            .chain(args)
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_silent_read() {
        let mut tool = DummyTool::new_default();
        tool.data_mut()[0x10..0x14].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let out = tool.capture(&argv(&["-s", "-r0x10", "-n4"])).unwrap();
        assert_eq!(out, "deadbeef\n");
    }

    #[test]
    fn test_listing_read() {
        let mut tool = DummyTool::new_default();
        let out = tool.capture(&argv(&["-r0x1000", "-n16"])).unwrap();
        assert!(out.contains("Address \tData\n0x00001000\tffffffffffffffffffffffffffffffff\n"));
        assert!(out.ends_with("Resetting device ...\nOK\n"));
    }

    #[test]
    fn test_read_bounds() {
        let mut tool = DummyTool::new_default();
        let out = tool.capture(&argv(&["-s", "-r0", "-n4097"])).unwrap();
        assert!(out.contains("Error"));
        let out = tool.capture(&argv(&["-s", "-r131070", "-n4"])).unwrap();
        assert!(out.contains("Error"));
    }

    #[test]
    fn test_write_hex_and_literal() {
        let mut tool = DummyTool::new_default();
        tool.capture(&argv(&["-s", "-w0x20", "0x0102"])).unwrap();
        tool.capture(&argv(&["-s", "-w34", "hi"])).unwrap();
        assert_eq!(&tool.data()[0x20..0x24], &[0x01, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_find_header() {
        let mut tool = DummyTool::new_default();
        let out = tool.capture(&argv(&["-s", "-f0x48b4b0"])).unwrap();
        assert_eq!(out, "0x0001ffa3\n");

        let out = tool.capture(&argv(&["-s", "-f0x123456"])).unwrap();
        assert!(out.contains("Unable to find bytes '123456'"));
    }

    #[test]
    fn test_stored_address() {
        let tool = DummyTool::new_default();
        assert_eq!(tool.stored_address(), "b0b448c0ffee");
        assert_eq!(&tool.data()[0x1ffa0..0x1ffa6], &[0xee, 0xff, 0xc0, 0x48, 0xb4, 0xb0]);
    }

    #[test]
    fn test_list_ports() {
        let mut tool = DummyTool::new_default();
        let out = tool.capture(&argv(&["-s", "-r0", "-n1", "-l"])).unwrap();
        assert!(out.contains("| COM ports:"));
        assert!(out.contains("/dev/ttyS0"));
        assert!(out.ends_with("ff\n"));
    }

    #[test]
    fn test_faults() {
        let mut tool = DummyTool::new_default()
            .fail_on_call(0, Fault::Timeout)
            .fail_on_call(1, Fault::GpioUninitialized)
            .fail_on_call(2, Fault::CommandFailed);
        assert!(tool.capture(&argv(&["-s", "-r0", "-n1"])).unwrap().contains("Timed"));
        assert!(tool.capture(&argv(&["-s", "-r0", "-n1"])).unwrap().contains("GPIO"));
        assert!(tool.capture(&argv(&["-s", "-r0", "-n1"])).unwrap().contains("Error"));
        assert_eq!(tool.capture(&argv(&["-s", "-r0", "-n1"])).unwrap(), "ff\n");
        assert_eq!(tool.calls().len(), 4);
    }
}
