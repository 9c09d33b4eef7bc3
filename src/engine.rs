//! Engine: loads saved extraction results, one JSON document per memory
//! source, isolating per-source failures so one unreadable source never costs
//! the results of the others.
//!
//! Typical usage:
//!
//! ```no_run
//! use lsareport::engine::{Engine, LoadOptions};
//! use lsareport::report::{Destination, OutputMode, emit};
//! # fn main() -> anyhow::Result<()> {
//! let mut engine = Engine::new();
//! engine.load_paths(&["/cases/lsass.json"], &LoadOptions::default())?;
//! emit(&engine.results, &engine.failed_sources, OutputMode::Grep, false, &Destination::Stdout)?;
//! # Ok(())
//! # }
//! ```
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::emit::Results;
use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, read_auto};
use crate::session::ExtractionResult;

const RESULT_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load {source_id}: {reason:#}")]
    Source {
        source_id: String,
        reason: anyhow::Error,
    },
    #[error("{0}: extraction packages reported errors")]
    PackageErrors(String),
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Stop at the first source that fails, or that carries package errors.
    pub halt_on_error: bool,
    /// Load sources on the rayon pool.
    pub parallel: bool,
    pub mmap_threshold_bytes: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            halt_on_error: false,
            parallel: false,
            mmap_threshold_bytes: DEFAULT_MMAP_THRESHOLD_BYTES,
        }
    }
}

/// Loaded results keyed by source identifier, plus the sources that could
/// not be loaded at all.
#[derive(Debug, Default)]
pub struct Engine {
    pub results: Results,
    pub failed_sources: Vec<String>,
}

/// Parse one saved extraction result.
pub fn read_result<P: AsRef<Path>>(path: P, mmap_threshold_bytes: u64) -> Result<ExtractionResult> {
    let doc = read_auto(&path, mmap_threshold_bytes)?;
    serde_json::from_slice(&doc).with_context(|| format!("parse {}", path.as_ref().display()))
}

/// Every result document under `dir`, sorted by path.
pub fn discover_sources<P: AsRef<Path>>(dir: P, recursive: bool) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(&dir).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };
    let mut found = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", dir.as_ref().display()))?;
        let is_result = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(RESULT_EXTENSION));
        if is_result {
            found.push(entry.into_path());
        }
    }
    found.sort();
    debug!("found {} result file(s) in {}", found.len(), dir.as_ref().display());
    Ok(found)
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of loading one source.
    fn accept(
        &mut self,
        source_id: String,
        outcome: Result<ExtractionResult>,
        opts: &LoadOptions,
    ) -> Result<(), LoadError> {
        match outcome {
            Ok(result) => {
                let has_errors = !result.errors.is_empty();
                if has_errors {
                    warn!(
                        "{}: {} package error(s) recorded",
                        source_id,
                        result.errors.len()
                    );
                }
                self.results.insert(source_id.clone(), result);
                if has_errors && opts.halt_on_error {
                    return Err(LoadError::PackageErrors(source_id));
                }
                Ok(())
            }
            Err(reason) => {
                warn!("failed to load {}: {:#}", source_id, reason);
                self.failed_sources.push(source_id.clone());
                if opts.halt_on_error {
                    return Err(LoadError::Source { source_id, reason });
                }
                Ok(())
            }
        }
    }

    /// Load in-memory documents as `(source id, json)` pairs. Intended for
    /// tests and small programmatic integrations.
    pub fn load_from_strings(
        &mut self,
        docs: &[(&str, &str)],
        opts: &LoadOptions,
    ) -> Result<(), LoadError> {
        for (id, json) in docs {
            let outcome = serde_json::from_str(json)
                .with_context(|| format!("parse {}", id));
            self.accept(id.to_string(), outcome, opts)?;
        }
        Ok(())
    }

    /// Load each path as one source, identified by its path. Loading happens
    /// on the rayon pool when `opts.parallel` is set; results are accepted in
    /// input order either way.
    pub fn load_paths<P: AsRef<Path> + Sync>(
        &mut self,
        paths: &[P],
        opts: &LoadOptions,
    ) -> Result<(), LoadError> {
        let threshold = opts.mmap_threshold_bytes;
        let load = |p: &P| {
            let id = p.as_ref().display().to_string();
            info!("parsing {}", id);
            (id, read_result(p, threshold))
        };
        let outcomes: Vec<(String, Result<ExtractionResult>)> = if opts.parallel {
            paths.par_iter().map(load).collect()
        } else {
            paths.iter().map(load).collect()
        };
        for (id, outcome) in outcomes {
            self.accept(id, outcome, opts)?;
        }
        Ok(())
    }

    /// Load every result document in a directory.
    pub fn load_directory<P: AsRef<Path>>(
        &mut self,
        dir: P,
        recursive: bool,
        opts: &LoadOptions,
    ) -> Result<(), LoadError> {
        info!("parsing folder {}", dir.as_ref().display());
        let paths = discover_sources(&dir, recursive).map_err(|reason| LoadError::Source {
            source_id: dir.as_ref().display().to_string(),
            reason,
        })?;
        self.load_paths(&paths, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const GOOD: &str = r#"{"orphaned_creds":[{"credtype":"ssp","username":"U","domainname":"D","password":"P"}]}"#;
    const WITH_ERRORS: &str =
        r#"{"errors":[{"package":"msv","error":{"kind":"E","message":"boom"}}]}"#;

    #[test]
    fn bad_source_does_not_stop_the_rest() {
        let mut e = Engine::new();
        e.load_from_strings(
            &[("a", GOOD), ("b", "{not json"), ("c", GOOD)],
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(e.results.len(), 2);
        assert_eq!(e.failed_sources, ["b"]);
    }

    #[test]
    fn halt_on_error_stops_on_failures_and_package_errors() {
        let opts = LoadOptions {
            halt_on_error: true,
            ..Default::default()
        };
        let mut e = Engine::new();
        let err = e
            .load_from_strings(&[("a", "{not json"), ("b", GOOD)], &opts)
            .unwrap_err();
        assert!(matches!(err, LoadError::Source { ref source_id, .. } if source_id == "a"));
        assert!(e.results.is_empty());

        let mut e = Engine::new();
        let err = e.load_from_strings(&[("a", WITH_ERRORS)], &opts).unwrap_err();
        assert!(matches!(err, LoadError::PackageErrors(ref s) if s == "a"));
        // the result itself is kept
        assert_eq!(e.results.len(), 1);
    }

    #[test]
    fn directory_discovery_respects_recursion() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.json"), GOOD).unwrap();
        fs::write(dir.path().join("two.JSON"), GOOD).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("three.json"), "{broken").unwrap();

        assert_eq!(discover_sources(dir.path(), false).unwrap().len(), 2);
        assert_eq!(discover_sources(dir.path(), true).unwrap().len(), 3);

        let mut e = Engine::new();
        let opts = LoadOptions {
            parallel: true,
            ..Default::default()
        };
        e.load_directory(dir.path(), true, &opts).unwrap();
        assert_eq!(e.results.len(), 2);
        assert_eq!(e.failed_sources.len(), 1);
        assert!(e.failed_sources[0].ends_with("three.json"));
    }
}
