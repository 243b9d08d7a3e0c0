//! Severity-tagged diagnostic records.
//!
//! Alignment setup failures are reported by appending a record to a
//! caller-visible list, never by unwinding: one bad query/subject pair must
//! not take down the rest of the batch. Only `Fatal` records stop a batch.

use std::fmt;

/// Message severity, ordered. Only `Fatal` aborts a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

/// Failure taxonomy for alignment setup and scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    /// Resource exhaustion while allocating alignment buffers
    OutOfMemory,
    /// Range / threshold / bandwidth outside its valid domain
    InvalidParameter,
    /// Karlin-Altschul calibration failed to converge
    StatisticalParams,
    /// Requested scoring mode not supported for this configuration
    UnsupportedConfig,
    /// Every query in the batch failed setup
    AllQueriesInvalid,
    /// A pair (or the remainder of a batch) ran out of wall-clock budget
    Timeout,
    /// The sequence source could not supply residues
    FetchFailed,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticCode::OutOfMemory => "out-of-memory",
            DiagnosticCode::InvalidParameter => "invalid-parameter",
            DiagnosticCode::StatisticalParams => "statistical-params",
            DiagnosticCode::UnsupportedConfig => "unsupported-config",
            DiagnosticCode::AllQueriesInvalid => "all-queries-invalid",
            DiagnosticCode::Timeout => "timeout",
            DiagnosticCode::FetchFailed => "fetch-failed",
        };
        f.write_str(s)
    }
}

/// One diagnostic record. Created at the point of failure and appended to a
/// [`DiagnosticList`]; the optional origin pins the source location that
/// raised it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub subcode: i32,
    pub message: String,
    pub origin: Option<(&'static str, u32)>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            subcode: 0,
            message: message.into(),
            origin: None,
        }
    }

    pub fn with_subcode(mut self, subcode: i32) -> Self {
        self.subcode = subcode;
        self
    }

    pub fn with_origin(mut self, file: &'static str, line: u32) -> Self {
        self.origin = Some((file, line));
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some((file, line)) = self.origin {
            write!(f, " ({}:{})", file, line)?;
        }
        Ok(())
    }
}

/// Append-only list of diagnostics surfaced to the caller after each batch.
#[derive(Debug, Default)]
pub struct DiagnosticList {
    records: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, d: Diagnostic) {
        self.records.push(d);
    }

    pub fn extend(&mut self, other: DiagnosticList) {
        self.records.extend(other.records);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.records.iter().map(|d| d.severity).max()
    }

    pub fn has_fatal(&self) -> bool {
        self.records.iter().any(Diagnostic::is_fatal)
    }
}

impl IntoIterator for DiagnosticList {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
