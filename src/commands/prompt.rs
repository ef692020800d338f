//! Interactive backup naming

use btaflash_core::backup::BackupNamer;
use btaflash_core::{Error, Result};
use dialoguer::Input;

/// Asks the user for a backup name on the terminal
pub struct PromptNamer;

impl BackupNamer for PromptNamer {
    fn backup_name(&mut self) -> Result<String> {
        Input::<String>::new()
            .with_prompt("Enter a name for the flash backup file")
            .interact_text()
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}
