//! Logon sessions and the per-source extraction result.
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::Credential;
use crate::error::PackageError;
use crate::kerberos::{KerberosTicket, TicketCache};
use crate::rows::{Row, orphan_row};

/// Everything recovered from one memory source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub logon_sessions: BTreeMap<u64, LogonSession>,
    #[serde(default)]
    pub orphaned_creds: Vec<Credential>,
    #[serde(default)]
    pub errors: Vec<PackageError>,
    #[serde(default)]
    pub kerberos_ccache: TicketCache,
}

impl ExtractionResult {
    /// Every ticket held by a kerberos credential, sessions first, then
    /// orphans.
    pub fn tickets(&self) -> impl Iterator<Item = &KerberosTicket> {
        self.logon_sessions
            .values()
            .flat_map(|s| s.kerberos_creds())
            .chain(
                self.orphaned_creds
                    .iter()
                    .filter(|c| matches!(c, Credential::Kerberos(_))),
            )
            .flat_map(|c| c.tickets())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogonSession {
    pub authentication_id: u64,
    #[serde(default)]
    pub session_id: u32,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub domainname: String,
    #[serde(default)]
    pub logon_server: String,
    #[serde(default)]
    pub logon_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl LogonSession {
    pub fn kerberos_creds(&self) -> impl Iterator<Item = &Credential> {
        self.credentials
            .iter()
            .filter(|c| matches!(c, Credential::Kerberos(_)))
    }

    /// Tabular projection of this session's credentials. MSV entries carry
    /// their hashes; every other kind maps like an orphaned credential.
    pub fn to_rows(&self) -> Vec<Row> {
        self.credentials
            .iter()
            .filter_map(|cred| match cred {
                Credential::Msv(m) => Some(Row::new([
                    cred.cred_type().to_string(),
                    m.domainname.clone(),
                    m.username.clone(),
                    hex::encode(&m.nt_hash),
                    hex::encode(&m.lm_hash),
                    hex::encode(&m.sha_hash),
                    String::new(),
                    String::new(),
                    String::new(),
                    m.password.clone().unwrap_or_default(),
                ])),
                other => orphan_row(other),
            })
            .collect()
    }
}

impl fmt::Display for LogonSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== LogonSession ==")?;
        writeln!(
            f,
            "authentication_id {} ({:x})",
            self.authentication_id, self.authentication_id
        )?;
        writeln!(f, "session_id {}", self.session_id)?;
        writeln!(f, "username {}", self.username)?;
        writeln!(f, "domainname {}", self.domainname)?;
        writeln!(f, "logon_server {}", self.logon_server)?;
        writeln!(
            f,
            "logon_time {}",
            self.logon_time.map(|t| t.to_rfc3339()).unwrap_or_default()
        )?;
        writeln!(f, "sid {}", self.sid.as_deref().unwrap_or(""))?;
        writeln!(f, "luid {}", self.authentication_id)?;
        for cred in &self.credentials {
            write!(f, "{}", cred)?;
        }
        Ok(())
    }
}
