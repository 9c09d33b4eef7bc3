//! Report aggregation: pick the encoder for the requested output mode, run it
//! over every loaded source and deliver the document to its destination.
//!
//! Sources that failed to load are listed only by the text report. Every mode
//! additionally logs them at `warn` level so they are never silently lost.
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use log::{info, warn};

use crate::emit::{self, Results};
use crate::error::ReportError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Full nested JSON.
    Json,
    /// Flattened rows as labelled JSON objects.
    JsonShort,
    /// Colon-delimited rows.
    Grep,
    #[default]
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Destination {
    #[default]
    Stdout,
    /// Created or truncated on write.
    File(PathBuf),
}

impl Destination {
    pub fn write(&self, document: &str) -> Result<(), ReportError> {
        match self {
            Destination::Stdout => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                lock.write_all(document.as_bytes())?;
                if !document.ends_with('\n') {
                    lock.write_all(b"\n")?;
                }
                lock.flush()?;
            }
            Destination::File(path) => {
                let mut f = File::create(path)?;
                f.write_all(document.as_bytes())?;
                f.flush()?;
            }
        }
        Ok(())
    }
}

/// Render all sources in the given mode. `batch` selects the multi-source
/// layout (filename column, source-keyed abbreviated JSON).
pub fn render(
    results: &Results,
    failed_sources: &[String],
    mode: OutputMode,
    batch: bool,
) -> Result<String, ReportError> {
    info!(
        "rendering {} source(s) as {:?} (batch={})",
        results.len(),
        mode,
        batch
    );
    for src in failed_sources {
        warn!("source produced no result: {}", src);
    }
    match mode {
        OutputMode::Json => emit::json(results),
        OutputMode::JsonShort => emit::json_short(results, batch),
        OutputMode::Grep => emit::grep(results, batch),
        OutputMode::Text => Ok(emit::text(results, failed_sources)),
    }
}

/// [`render`] and write the document to `dest`.
pub fn emit(
    results: &Results,
    failed_sources: &[String],
    mode: OutputMode,
    batch: bool,
    dest: &Destination,
) -> Result<(), ReportError> {
    let document = render(results, failed_sources, mode, batch)?;
    if let Destination::File(path) = dest {
        info!("writing report to {}", path.display());
    }
    dest.write(&document)
}
