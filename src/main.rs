//! btaflash - Bluetooth address and flash tool for the CC2650 Pi Hat
//!
//! Drives the `firmwareDownloadUART` serial bootloader tool to read and
//! rewrite the Bluetooth address stored in device flash, inspect or patch
//! arbitrary memory, and reprogram the whole flash from an image.
//!
//! Every operation that writes to the device backs up the complete flash
//! to a timestamped `.bin` file first, unless `--no-backup` is given.

mod cli;
mod commands;

use btaflash_core::backup::BackupConfig;
use btaflash_core::gateway::GatewayConfig;
use btaflash_core::workflow::{Completion, WorkflowOptions};
use clap::{CommandFactory, Parser};
use cli::Cli;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger; -v/-vv raise the default filter
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    let operation = match cli.operation() {
        Ok(Some(operation)) => operation,
        Ok(None) => {
            Cli::command().print_help()?;
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let gateway_config = GatewayConfig {
        launcher: (!cli.no_sudo).then(|| btaflash_core::gateway::DEFAULT_LAUNCHER.to_string()),
        program: cli.tool.clone(),
        port: cli.port,
        list_ports: cli.list,
    };
    let options = WorkflowOptions {
        skip_backup: cli.no_backup,
        backup: BackupConfig {
            directory: cli.backup_dir.clone(),
            read_pacing: Duration::from_millis(cli.pace_ms),
            ..BackupConfig::default()
        },
    };

    log::debug!("{} via {:?}", operation.name(), gateway_config);

    match commands::run(operation, gateway_config, options, cli.backup_name) {
        Ok(Completion::Done) => Ok(()),
        Ok(Completion::HandedOff { code }) => {
            log::debug!("bootloader tool exited with {:?}", code);
            std::process::exit(code.unwrap_or(1));
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
