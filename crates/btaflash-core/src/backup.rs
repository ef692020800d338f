//! Flash backup engine
//!
//! Copies the whole device flash page by page through the bootloader tool
//! and dumps it to a timestamped raw binary file. Every operation that
//! modifies flash runs a backup first.
//!
//! An image is only ever persisted when all [`PAGE_COUNT`] pages were read.
//! The backup file is created after the copy completes, so a failed read
//! leaves nothing behind.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::gateway::{Gateway, ToolRunner};
use crate::request::CommandRequest;
use crate::response::{data_line, ResponseKind};

/// Size of one flash page in bytes
pub const PAGE_SIZE: usize = 4096;

/// Number of flash pages on the device
pub const PAGE_COUNT: usize = 32;

/// Total flash size in bytes
pub const FLASH_SIZE: usize = PAGE_SIZE * PAGE_COUNT;

/// Delay between page reads; the serial link can't keep up otherwise
pub const DEFAULT_READ_PACING: Duration = Duration::from_millis(100);

/// Suffix appended to backup names, in `strftime` syntax
pub const TIMESTAMP_FORMAT: &str = "--%Y-%m-%dT%Hh%Mm%Ss";

/// Extension of backup files
pub const BACKUP_EXTENSION: &str = ".bin";

/// One page of flash, as read from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    index: usize,
    data: Vec<u8>,
}

impl Page {
    /// Decode a page from the hex text printed by a silent read
    pub fn from_hex(index: usize, text: &str) -> Result<Self> {
        let data = hex::decode(text.trim()).map_err(|e| Error::MalformedPage {
            index,
            reason: e.to_string(),
        })?;
        if data.len() != PAGE_SIZE {
            return Err(Error::MalformedPage {
                index,
                reason: format!("expected {} bytes, got {}", PAGE_SIZE, data.len()),
            });
        }
        Ok(Self { index, data })
    }

    /// Page index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Flash offset of the first byte
    pub fn offset(&self) -> usize {
        self.index * PAGE_SIZE
    }

    /// Page contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Pages read from the device, in index order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashImage {
    pages: Vec<Page>,
}

impl FlashImage {
    /// The pages
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Number of pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the image holds no pages
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether every page of the device is present
    pub fn is_complete(&self) -> bool {
        self.pages.len() == PAGE_COUNT
    }

    /// Consume the image, returning its pages
    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}

/// Backup tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    /// Directory backup files are written to
    pub directory: PathBuf,
    /// Delay before each page read
    pub read_pacing: Duration,
    /// Delay after each page written to the file
    pub write_pacing: Duration,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            read_pacing: DEFAULT_READ_PACING,
            write_pacing: Duration::ZERO,
        }
    }
}

/// Progress callbacks for a backup
pub trait BackupProgress {
    /// Starting to read `total_pages` pages from the device
    fn reading(&mut self, total_pages: usize);

    /// `pages_done` pages have been read
    fn page_read(&mut self, pages_done: usize);

    /// Starting to write `total_pages` pages to the file
    fn writing(&mut self, total_pages: usize);

    /// `pages_done` pages have been written
    fn page_written(&mut self, pages_done: usize);

    /// Backup finished
    fn complete(&mut self, path: &Path, bytes: usize);
}

/// A no-op progress reporter
pub struct NoProgress;

impl BackupProgress for NoProgress {
    fn reading(&mut self, _total_pages: usize) {}
    fn page_read(&mut self, _pages_done: usize) {}
    fn writing(&mut self, _total_pages: usize) {}
    fn page_written(&mut self, _pages_done: usize) {}
    fn complete(&mut self, _path: &Path, _bytes: usize) {}
}

/// Supplies the base name of a backup file
pub trait BackupNamer {
    /// Name chosen for the next backup, with or without `.bin`
    fn backup_name(&mut self) -> Result<String>;
}

/// [`BackupNamer`] that always returns the same name
#[derive(Debug, Clone)]
pub struct FixedName(pub String);

impl BackupNamer for FixedName {
    fn backup_name(&mut self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// File name for a backup taken at `timestamp`
///
/// One trailing `.bin` is stripped from `name` so the timestamp lands in
/// front of the extension.
pub fn backup_file_name(name: &str, timestamp: &NaiveDateTime) -> String {
    let base = name.strip_suffix(BACKUP_EXTENSION).unwrap_or(name);
    format!(
        "{}{}{}",
        base,
        timestamp.format(TIMESTAMP_FORMAT),
        BACKUP_EXTENSION
    )
}

/// Read the whole device flash
///
/// Issues one silent 4096-byte read per page. Any failure reported by the
/// tool aborts the copy and no image is returned.
pub fn copy_flash<R, P>(
    gateway: &mut Gateway<R>,
    config: &BackupConfig,
    progress: &mut P,
) -> Result<FlashImage>
where
    R: ToolRunner,
    P: BackupProgress + ?Sized,
{
    log::info!("Reading flash from device...");
    let start = Instant::now();
    progress.reading(PAGE_COUNT);

    let mut pages = Vec::with_capacity(PAGE_COUNT);
    for index in 0..PAGE_COUNT {
        if !config.read_pacing.is_zero() {
            thread::sleep(config.read_pacing);
        }

        let request = CommandRequest::read((index * PAGE_SIZE).to_string(), PAGE_SIZE);
        let payload = gateway
            .invoke(&request)?
            .into_payload(ResponseKind::Read, "")?;
        pages.push(Page::from_hex(index, data_line(&payload))?);

        progress.page_read(index + 1);
        log::trace!("page {}/{} read", index + 1, PAGE_COUNT);
    }

    log::info!(
        "Read {} pages in {:.2}ms",
        PAGE_COUNT,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(FlashImage { pages })
}

/// Write a complete image to `path` as raw bytes
///
/// Returns the number of bytes written. A partially written file is
/// removed before the error is returned.
pub fn write_image<P>(
    image: FlashImage,
    path: &Path,
    config: &BackupConfig,
    progress: &mut P,
) -> Result<usize>
where
    P: BackupProgress + ?Sized,
{
    if !image.is_complete() {
        return Err(Error::IncompleteImage {
            pages: image.len(),
            expected: PAGE_COUNT,
        });
    }

    log::info!("Writing flash to {}...", path.display());
    let start = Instant::now();
    progress.writing(image.len());

    let file = File::create(path)?;
    let result = write_pages(image, file, config, progress);
    if result.is_err() {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove partial backup {}: {}", path.display(), e);
        }
    }
    let bytes = result?;

    log::info!(
        "Wrote {} bytes in {:.2}ms",
        bytes,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(bytes)
}

fn write_pages<P>(
    image: FlashImage,
    file: File,
    config: &BackupConfig,
    progress: &mut P,
) -> Result<usize>
where
    P: BackupProgress + ?Sized,
{
    let mut writer = BufWriter::new(file);
    let mut bytes = 0;
    for (done, page) in image.into_pages().into_iter().enumerate() {
        writer.write_all(page.data())?;
        bytes += page.data().len();
        if !config.write_pacing.is_zero() {
            thread::sleep(config.write_pacing);
        }
        progress.page_written(done + 1);
    }
    writer.flush()?;
    Ok(bytes)
}

/// Back up the device flash to a new timestamped file
///
/// Asks `namer` for a base name, copies the flash and writes it into
/// [`BackupConfig::directory`]. Returns the path of the backup.
pub fn backup_flash<R, N, P>(
    gateway: &mut Gateway<R>,
    namer: &mut N,
    config: &BackupConfig,
    progress: &mut P,
) -> Result<PathBuf>
where
    R: ToolRunner,
    N: BackupNamer + ?Sized,
    P: BackupProgress + ?Sized,
{
    let name = namer.backup_name()?;
    let timestamp = chrono::Local::now().naive_local();
    let path = config.directory.join(backup_file_name(name.trim(), &timestamp));

    let image = copy_flash(gateway, config, progress)?;
    let bytes = write_image(image, &path, config, progress)?;

    progress.complete(&path, bytes);
    log::info!("Backed up device flash to {}", path.display());
    Ok(path)
}
