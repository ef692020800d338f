//! CLI command implementations
//!
//! The workflow itself lives in `btaflash-core`; this module wires it to
//! the terminal: progress bars while flash is backed up and a prompt for
//! the backup name.

mod progress;
mod prompt;

use btaflash_core::backup::{BackupNamer, FixedName};
use btaflash_core::gateway::{Gateway, GatewayConfig, ProcessRunner};
use btaflash_core::workflow::{Completion, Operation, Workflow, WorkflowOptions};

use progress::IndicatifProgress;
use prompt::PromptNamer;

/// Run one operation against the real tool, printing results to stdout
pub fn run(
    operation: Operation,
    gateway_config: GatewayConfig,
    options: WorkflowOptions,
    backup_name: Option<String>,
) -> btaflash_core::Result<Completion> {
    let mut namer: Box<dyn BackupNamer> = match backup_name {
        Some(name) => Box::new(FixedName(name)),
        None => Box::new(PromptNamer),
    };
    let mut progress = IndicatifProgress::new();
    let mut stdout = std::io::stdout().lock();

    let gateway = Gateway::new(ProcessRunner, gateway_config);
    let mut workflow = Workflow::new(
        gateway,
        options,
        namer.as_mut(),
        &mut progress,
        &mut stdout,
    );
    workflow.run(operation)
}
