//! Output encoders. Each takes the ordered source → result mapping and
//! returns the complete document as a string; choosing a destination is the
//! caller's job (see [`crate::report`]).
use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::warn;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::ReportError;
use crate::rows::{HEADER, Row, header, source_rows};
use crate::session::ExtractionResult;

pub type Results = BTreeMap<String, ExtractionResult>;

/// Pretty JSON with a four space indent.
fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ReportError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Full structured dump. Going through `serde_json::Value` sorts every
/// object's keys.
pub fn json(results: &Results) -> Result<String, ReportError> {
    let value = serde_json::to_value(results)?;
    to_pretty_json(&value)
}

/// A row serialized as an object keyed by header names, in header order.
struct LabelledRow<'a>(&'a Row);

impl Serialize for LabelledRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(HEADER.len()))?;
        for (name, value) in HEADER.iter().zip(self.0.fields().iter()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Abbreviated JSON: labelled rows per source. A single source yields its
/// list directly, batch mode yields a mapping source → list. Without batch
/// mode only the first source (in source order) is emitted; the rest are
/// reported at `warn` level.
pub fn json_short(results: &Results, batch: bool) -> Result<String, ReportError> {
    let rows: BTreeMap<&str, Vec<Row>> = results
        .iter()
        .map(|(src, result)| (src.as_str(), source_rows(result)))
        .collect();
    let labelled: BTreeMap<&str, Vec<LabelledRow<'_>>> = rows
        .iter()
        .map(|(src, rows)| (*src, rows.iter().map(LabelledRow).collect::<Vec<_>>()))
        .collect();
    if batch {
        to_pretty_json(&labelled)
    } else {
        for src in labelled.keys().skip(1) {
            warn!("abbreviated JSON without batch mode drops source {}", src);
        }
        match labelled.into_values().next() {
            Some(list) => to_pretty_json(&list),
            None => to_pretty_json(&Vec::<LabelledRow<'_>>::new()),
        }
    }
}

/// Colon-delimited table, CRLF line endings, no quoting. Batch mode adds the
/// `filename` column and prefixes each row with its source.
pub fn grep(results: &Results, batch: bool) -> Result<String, ReportError> {
    let mut buf = Vec::new();
    {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b':')
            .terminator(csv::Terminator::CRLF)
            .quote_style(csv::QuoteStyle::Never)
            .has_headers(false)
            .from_writer(&mut buf);
        wtr.write_record(header(batch))?;
        for (src, result) in results {
            for row in source_rows(result) {
                let fields = row.fields().iter().map(String::as_str);
                if batch {
                    wtr.write_record(std::iter::once(src.as_str()).chain(fields))?;
                } else {
                    wtr.write_record(fields)?;
                }
            }
        }
        wtr.flush()?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Narrative report: a banner per source, full session blocks, orphaned
/// credentials, package errors, then the sources that failed outright.
pub fn text(results: &Results, failed_sources: &[String]) -> String {
    let mut out = String::new();
    for (src, result) in results {
        out.push_str(&format!("FILE: ======== {} =======\n", src));
        for session in result.logon_sessions.values() {
            out.push_str(&format!("\n{}", session));
        }
        if !result.orphaned_creds.is_empty() {
            out.push_str("\n== Orphaned credentials ==\n");
            for cred in &result.orphaned_creds {
                out.push_str(&cred.to_string());
            }
        }
        if !result.errors.is_empty() {
            out.push_str("\n== Errors ==\n");
            for err in &result.errors {
                let encoded = BASE64.encode(err.error.render());
                out.push_str(&format!("{} {}\n", err.marker(), encoded));
            }
        }
    }
    if !failed_sources.is_empty() {
        out.push_str("\n==== Parsing errors:\n");
        for src in failed_sources {
            out.push_str(src);
            out.push('\n');
        }
    }
    out
}
