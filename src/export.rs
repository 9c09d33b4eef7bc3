//! Kerberos ticket export.
//!
//! For each source, the ticket cache goes to
//! `<dir>/<source basename>_<8 hex>.ccache` when it holds any credential,
//! then every ticket of every kerberos credential is written next to it as
//! a kirbi file under the ticket's own name. Existing files are never
//! replaced by a ccache: the random suffix is redrawn on collision.
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::emit::Results;
use crate::kerberos::TicketCache;

const MAX_SUFFIX_ATTEMPTS: usize = 16;

/// Files written by [`export_tickets`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub ccache_files: Vec<PathBuf>,
    pub kirbi_files: Vec<PathBuf>,
}

/// Last path component of a source identifier, accepting both `/` and `\`
/// separators.
pub fn source_base_name(source: &str) -> &str {
    let base = source.rsplit(['/', '\\']).next().unwrap_or(source);
    if base.is_empty() { "memory" } else { base }
}

fn write_ccache(dir: &Path, source: &str, cache: &TicketCache) -> io::Result<PathBuf> {
    let base = source_base_name(source);
    for _ in 0..MAX_SUFFIX_ATTEMPTS {
        let suffix: [u8; 4] = rand::random();
        let path = dir.join(format!("{}_{}.ccache", base, hex::encode(suffix)));
        match cache.to_file(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("ccache name {} taken, retrying", path.display());
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free ccache file name for {}", base),
    ))
}

/// Export every source's tickets into `dir`, creating it if needed. Errors
/// propagate immediately; files already written stay in place.
pub fn export_tickets<P: AsRef<Path>>(dir: P, results: &Results) -> Result<ExportSummary> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    info!("writing kerberos tickets to {}", dir.display());
    let mut summary = ExportSummary::default();
    for (source, result) in results {
        if !result.kerberos_ccache.is_empty() {
            let path = write_ccache(dir, source, &result.kerberos_ccache)
                .with_context(|| format!("write ccache for {}", source))?;
            summary.ccache_files.push(path);
        }
        for ticket in result.tickets() {
            let path = ticket
                .to_kirbi(dir)
                .with_context(|| format!("write {} for {}", ticket.file_name(), source))?;
            summary.kirbi_files.push(path);
        }
    }
    info!(
        "exported {} ccache and {} kirbi file(s)",
        summary.ccache_files.len(),
        summary.kirbi_files.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{Credential, KerberosCredential};
    use crate::kerberos::{CachedCredential, KerberosTicket, TicketType};
    use crate::session::{ExtractionResult, LogonSession};
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn result_with_tickets() -> ExtractionResult {
        let mut r = ExtractionResult::default();
        r.kerberos_ccache.credentials.push(CachedCredential::default());
        r.logon_sessions.insert(
            1,
            LogonSession {
                authentication_id: 1,
                credentials: vec![Credential::Kerberos(KerberosCredential {
                    tickets: vec![KerberosTicket {
                        ticket_type: TicketType::Tgt,
                        kirbi: vec![1, 2, 3],
                        ..Default::default()
                    }],
                    ..Default::default()
                })],
                ..Default::default()
            },
        );
        r.orphaned_creds
            .push(Credential::Kerberos(KerberosCredential {
                tickets: vec![KerberosTicket {
                    kirbi: vec![4, 5, 6],
                    ..Default::default()
                }],
                ..Default::default()
            }));
        r
    }

    #[test]
    fn base_name_handles_both_separators() {
        assert_eq!(source_base_name("/tmp/dumps/lsass.dmp"), "lsass.dmp");
        assert_eq!(source_base_name(r"C:\dumps\lsass.dmp"), "lsass.dmp");
        assert_eq!(source_base_name("live"), "live");
        assert_eq!(source_base_name("dir/"), "memory");
    }

    #[test]
    fn exports_ccache_and_all_tickets() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("tickets");
        let mut results = Results::new();
        results.insert("/x/lsass.dmp".into(), result_with_tickets());
        let summary = export_tickets(&out, &results).unwrap();
        assert_eq!(summary.ccache_files.len(), 1);
        assert_eq!(summary.kirbi_files.len(), 2);
        let name = summary.ccache_files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("lsass.dmp_") && name.ends_with(".ccache"));
        assert_eq!(name.len(), "lsass.dmp_".len() + 8 + ".ccache".len());
    }

    #[test]
    fn empty_cache_writes_no_ccache() {
        let dir = tempdir().unwrap();
        let mut results = Results::new();
        results.insert("a.dmp".into(), ExtractionResult::default());
        let summary = export_tickets(dir.path(), &results).unwrap();
        assert_eq!(summary, ExportSummary::default());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn repeated_exports_keep_unrelated_files_and_never_collide() {
        let dir = tempdir().unwrap();
        let unrelated = dir.path().join("notes.txt");
        fs::write(&unrelated, "keep me").unwrap();
        let mut results = Results::new();
        results.insert("lsass.dmp".into(), result_with_tickets());

        let mut names = HashSet::new();
        for _ in 0..20 {
            let summary = export_tickets(dir.path(), &results).unwrap();
            for p in summary.ccache_files {
                assert!(names.insert(p), "ccache name reused");
            }
        }
        assert_eq!(names.len(), 20);
        assert_eq!(fs::read_to_string(&unrelated).unwrap(), "keep me");
    }

    #[test]
    fn directory_creation_is_idempotent() {
        let dir = tempdir().unwrap();
        let results = Results::new();
        export_tickets(dir.path(), &results).unwrap();
        export_tickets(dir.path(), &results).unwrap();
    }
}
