//! Error types.
//!
//! [`ReportError`] covers failures of the rendering pipeline itself.
//! [`ErrorDetail`] is the structured form of a failure that happened inside an
//! extraction package; it travels inside an `ExtractionResult` and is only
//! turned into text when a report is rendered.
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write tabular output: {0}")]
    Csv(#[from] csv::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A package failure: error kind, message and an optional chained cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorDetail>>,
}

impl ErrorDetail {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: ErrorDetail) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Build a detail from a live error, walking its `source()` chain. Causes
    /// are recorded with the generic kind `cause`.
    pub fn capture(kind: impl Into<String>, err: &(dyn Error + 'static)) -> Self {
        let mut detail = Self::new(kind, err.to_string());
        let mut chain: Vec<ErrorDetail> = Vec::new();
        let mut next = err.source();
        while let Some(e) = next {
            chain.push(Self::new("cause", e.to_string()));
            next = e.source();
        }
        // Link innermost first so the outermost ends up at the top.
        let mut linked: Option<Box<ErrorDetail>> = None;
        for mut d in chain.into_iter().rev() {
            d.cause = linked.take();
            linked = Some(Box::new(d));
        }
        detail.cause = linked;
        detail
    }

    /// Iterate this detail and all chained causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorDetail> {
        std::iter::successors(Some(self), |d| d.cause.as_deref())
    }

    /// Text form used at the rendering boundary: the error line followed by
    /// one `caused by` line per chained cause, newline-joined.
    pub fn render(&self) -> String {
        self.chain()
            .enumerate()
            .map(|(i, d)| {
                if i == 0 {
                    format!("{}: {}", d.kind, d.message)
                } else {
                    format!("caused by {}: {}", d.kind, d.message)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A failed extraction package inside an otherwise successful source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageError {
    pub package: String,
    pub error: ErrorDetail,
}

impl PackageError {
    pub fn new(package: impl Into<String>, error: ErrorDetail) -> Self {
        Self {
            package: package.into(),
            error,
        }
    }

    /// Marker used in place of a credential type when the error is listed
    /// next to credentials.
    pub fn marker(&self) -> String {
        format!("{}_exception_please_report", self.package)
    }
}
