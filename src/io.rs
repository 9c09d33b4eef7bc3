use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

/// Threshold in bytes above which we attempt to use mmap for reading.
/// Callers can override via API; this is a reasonable default.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

/// Bytes of a whole input document, either mapped or read into memory.
pub enum Document {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Deref for Document {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            Document::Mapped(m) => m,
            Document::Buffered(b) => b,
        }
    }
}

/// Decide whether to use mmap based on file size and threshold.
pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

pub fn read_buffered<P: AsRef<Path>>(path: P) -> Result<Document> {
    let mut file =
        File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .with_context(|| format!("read {}", path.as_ref().display()))?;
    Ok(Document::Buffered(buf))
}

pub fn read_mmap<P: AsRef<Path>>(path: P) -> Result<Document> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    let mmap =
        unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.as_ref().display()))?;
    Ok(Document::Mapped(mmap))
}

/// Choose mmap or a plain read depending on file size.
pub fn read_auto<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<Document> {
    let meta =
        std::fs::metadata(&path).with_context(|| format!("stat {}", path.as_ref().display()))?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        read_mmap(path)
    } else {
        read_buffered(path)
    }
}
