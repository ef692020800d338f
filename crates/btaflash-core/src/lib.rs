//! btaflash-core - Command orchestration for the SBL firmware download tool
//!
//! This crate drives `firmwareDownloadUART`, the serial bootloader (SBL)
//! tool for CC26xx parts, to read and write device memory, locate and
//! rewrite the Bluetooth address, and back up the complete flash before
//! anything destructive happens.
//!
//! The tool is a black box: it is started with an argument list and all
//! information comes back as text on stdout.
//!
//! # Architecture
//!
//! ```text
//! workflow ──► gateway ──► ToolRunner (child process)
//!    │            │
//!    │            └──► response (text ─► CommandOutcome)
//!    ├──► address (byte order, header checks)
//!    └──► backup  (paged flash copy ─► .bin file)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use btaflash_core::backup::{FixedName, NoProgress};
//! use btaflash_core::gateway::{Gateway, GatewayConfig, ProcessRunner};
//! use btaflash_core::workflow::{Operation, Workflow, WorkflowOptions};
//!
//! let gateway = Gateway::new(ProcessRunner, GatewayConfig::default());
//! let mut namer = FixedName("pihat".into());
//! let mut stdout = std::io::stdout();
//! let mut workflow = Workflow::new(
//!     gateway,
//!     WorkflowOptions::default(),
//!     &mut namer,
//!     &mut NoProgress,
//!     &mut stdout,
//! );
//! workflow.run(Operation::ReadAddress)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod address;
pub mod backup;
pub mod error;
pub mod gateway;
pub mod request;
pub mod response;
pub mod workflow;

pub use error::{Error, Result};
