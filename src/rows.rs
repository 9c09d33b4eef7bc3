//! Flat row model shared by the greppable and abbreviated JSON outputs.
//!
//! Every credential kind and every package error projects onto the same ten
//! positions described by [`HEADER`]. Positions a kind does not use are empty
//! strings, so a row always has exactly `ROW_WIDTH` fields.
use std::collections::HashSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::credential::Credential;
use crate::error::PackageError;
use crate::session::ExtractionResult;

pub const ROW_WIDTH: usize = 10;

pub const HEADER: [&str; ROW_WIDTH] = [
    "credType",
    "domain",
    "username",
    "NT",
    "LM",
    "SHA1",
    "masterkey",
    "sha1_masterkey",
    "key_guid",
    "plaintext",
];

/// Column prepended in batch mode.
pub const FILENAME_COLUMN: &str = "filename";

/// Effective header: [`HEADER`], prefixed with [`FILENAME_COLUMN`] in batch
/// mode.
pub fn header(batch: bool) -> Vec<&'static str> {
    let mut cols = Vec::with_capacity(ROW_WIDTH + 1);
    if batch {
        cols.push(FILENAME_COLUMN);
    }
    cols.extend_from_slice(&HEADER);
    cols
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row([String; ROW_WIDTH]);

impl Row {
    pub fn new(fields: [String; ROW_WIDTH]) -> Self {
        Self(fields)
    }

    /// Row with only the type, key material and last columns set.
    fn keyed(cred_type: &str, key: &str, digest: &str, guid: &str, last: &str) -> Self {
        let mut fields: [String; ROW_WIDTH] = Default::default();
        fields[0] = cred_type.to_string();
        fields[6] = key.to_string();
        fields[7] = digest.to_string();
        fields[8] = guid.to_string();
        fields[9] = last.to_string();
        Self(fields)
    }

    pub fn cred_type(&self) -> &str {
        &self.0[0]
    }

    pub fn fields(&self) -> &[String; ROW_WIDTH] {
        &self.0
    }
}

/// Row for a credential listed outside of a session. Kinds other than
/// DPAPI and CloudAP (MSV included) only produce a row when they carry a
/// non-empty password.
pub fn orphan_row(cred: &Credential) -> Option<Row> {
    match cred {
        Credential::Cloudap(c) => Some(Row::keyed(
            cred.cred_type(),
            &c.masterkey,
            &c.dpapi_key_sha1,
            &c.key_guid,
            c.prt.as_deref().unwrap_or(""),
        )),
        Credential::Dpapi(c) => Some(Row::keyed(
            cred.cred_type(),
            &c.masterkey,
            &c.sha1_masterkey,
            &c.key_guid,
            "",
        )),
        other => {
            let password = other.password().filter(|p| !p.is_empty())?;
            let mut fields: [String; ROW_WIDTH] = Default::default();
            fields[0] = other.cred_type().to_string();
            fields[1] = other.domainname().to_string();
            fields[2] = other.username().to_string();
            fields[9] = password.to_string();
            Some(Row(fields))
        }
    }
}

/// Row for a package error. The rendered error text is base64-encoded so
/// embedded newlines or delimiters cannot break line-oriented output.
pub fn error_row(err: &PackageError) -> Row {
    let mut fields: [String; ROW_WIDTH] = Default::default();
    fields[0] = err.marker();
    fields[9] = BASE64.encode(err.error.render());
    Row(fields)
}

/// Flatten the orphaned credentials and package errors of one result, in
/// that order. Session credentials are not part of this projection.
pub fn flatten(result: &ExtractionResult) -> Vec<Row> {
    result
        .orphaned_creds
        .iter()
        .filter_map(orphan_row)
        .chain(result.errors.iter().map(error_row))
        .collect()
}

/// All rows a source contributes to tabular output: each session's own rows
/// followed by [`flatten`], deduplicated and sorted.
pub fn source_rows(result: &ExtractionResult) -> Vec<Row> {
    let mut rows: Vec<Row> = result
        .logon_sessions
        .values()
        .flat_map(|s| s.to_rows())
        .collect();
    rows.extend(flatten(result));
    dedup_sort(rows)
}

/// Drop exact duplicates (first occurrence wins), then stable-sort by
/// credential type.
pub fn dedup_sort(rows: Vec<Row>) -> Vec<Row> {
    let mut seen: HashSet<Row> = HashSet::with_capacity(rows.len());
    let mut out: Vec<Row> = rows
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect();
    out.sort_by(|a, b| a.cred_type().cmp(b.cred_type()));
    out
}
