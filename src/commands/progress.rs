//! Backup progress reporting

use btaflash_core::backup::{BackupProgress, PAGE_SIZE};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
        }
    }

    fn create_bar(&mut self, total_pages: usize, phase: &str) {
        let total = (total_pages * PAGE_SIZE) as u64;
        let pb = self.multi.add(
            create_progress_bar_with_phase(total, phase)
                .unwrap_or_else(|_| ProgressBar::new(total)),
        );
        self.current_bar = Some(pb);
    }

    fn advance(&self, pages_done: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position((pages_done * PAGE_SIZE) as u64);
        }
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupProgress for IndicatifProgress {
    fn reading(&mut self, total_pages: usize) {
        self.create_bar(total_pages, "Reading flash");
    }

    fn page_read(&mut self, pages_done: usize) {
        self.advance(pages_done);
    }

    fn writing(&mut self, total_pages: usize) {
        self.finish("Read complete");
        self.create_bar(total_pages, "Saving backup");
    }

    fn page_written(&mut self, pages_done: usize) {
        self.advance(pages_done);
    }

    fn complete(&mut self, path: &Path, bytes: usize) {
        self.finish("Backup complete");
        println!("Saved {} bytes of flash to {}", bytes, path.display());
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        // A failed read leaves its bar behind
        if let Some(pb) = self.current_bar.take() {
            pb.abandon();
        }
    }
}
