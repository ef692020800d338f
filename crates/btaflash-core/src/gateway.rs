//! Command gateway
//!
//! The gateway turns a [`CommandRequest`] into a full command line, runs the
//! bootloader tool through a [`ToolRunner`] and classifies what it printed.
//!
//! ```text
//! <launcher> <program> [-p<port>] [-s] [-r..|-w.. <value>|-f..|<file>] [-n..] [-l]
//! ```

use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::request::CommandRequest;
use crate::response::{classify, CommandOutcome};

/// Default launcher; the tool needs root for GPIO and serial access
pub const DEFAULT_LAUNCHER: &str = "sudo";

/// Default path of the bootloader tool
pub const DEFAULT_PROGRAM: &str = "./firmwareDownloadUART";

/// How the bootloader tool is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Program the tool is started through (e.g. `sudo`), if any
    pub launcher: Option<String>,
    /// Path of the tool
    pub program: String,
    /// Serial port index forwarded as `-p<port>`
    pub port: Option<u32>,
    /// Ask the tool to enumerate ports on every call (`-l`)
    pub list_ports: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            launcher: Some(DEFAULT_LAUNCHER.to_string()),
            program: DEFAULT_PROGRAM.to_string(),
            port: None,
            list_ports: false,
        }
    }
}

/// Runs the bootloader tool
///
/// `argv[0]` is the program to start. Both methods block until the child
/// exits.
pub trait ToolRunner {
    /// Run to completion and return everything written to stdout
    fn capture(&mut self, argv: &[String]) -> Result<String>;

    /// Run with the child's output going straight to the user
    ///
    /// Returns the exit code, `None` if the child was killed by a signal.
    fn hand_off(&mut self, argv: &[String]) -> Result<Option<i32>>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &mut R {
    fn capture(&mut self, argv: &[String]) -> Result<String> {
        (**self).capture(argv)
    }

    fn hand_off(&mut self, argv: &[String]) -> Result<Option<i32>> {
        (**self).hand_off(argv)
    }
}

/// [`ToolRunner`] backed by child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(argv: &[String]) -> Result<Command> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidFormat("empty command line".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        Ok(cmd)
    }

    fn spawn_error(argv: &[String], source: std::io::Error) -> Error {
        Error::Spawn {
            program: argv.first().cloned().unwrap_or_default(),
            source,
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn capture(&mut self, argv: &[String]) -> Result<String> {
        let output = Self::command(argv)?
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| Self::spawn_error(argv, e))?;
        log::trace!("{} exited with {}", argv[0], output.status);
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn hand_off(&mut self, argv: &[String]) -> Result<Option<i32>> {
        let status = Self::command(argv)?
            .status()
            .map_err(|e| Self::spawn_error(argv, e))?;
        Ok(status.code())
    }
}

/// Builds command lines, invokes the tool and classifies its output
pub struct Gateway<R> {
    runner: R,
    config: GatewayConfig,
}

impl<R: ToolRunner> Gateway<R> {
    /// Create a gateway
    pub fn new(runner: R, config: GatewayConfig) -> Self {
        Self { runner, config }
    }

    /// The configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The runner
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Consume the gateway, returning the runner
    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Full command line for a request
    pub fn command_line(&self, request: &CommandRequest) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(launcher) = &self.config.launcher {
            argv.push(launcher.clone());
        }
        argv.push(self.config.program.clone());
        if let Some(port) = self.config.port {
            argv.push(format!("-p{}", port));
        }
        argv.extend(request.to_args());
        if self.config.list_ports {
            argv.push("-l".to_string());
        }
        argv
    }

    /// Run a request and classify its output
    ///
    /// Only failing to start the tool is an error here; everything the tool
    /// reports comes back as a [`CommandOutcome`].
    pub fn invoke(&mut self, request: &CommandRequest) -> Result<CommandOutcome> {
        let kind = request.response_kind().ok_or_else(|| {
            Error::InvalidFormat("a full flash rewrite has no captured response".to_string())
        })?;
        let argv = self.command_line(request);
        log::debug!("running: {}", argv.join(" "));
        let text = self.runner.capture(&argv)?;
        Ok(classify(&text, kind))
    }

    /// Hand control to the tool for a full flash rewrite
    ///
    /// The tool's output is not captured and its success is not checked.
    pub fn hand_off(&mut self, request: &CommandRequest) -> Result<Option<i32>> {
        let argv = self.command_line(request);
        log::debug!("handing off: {}", argv.join(" "));
        self.runner.hand_off(&argv)
    }
}
