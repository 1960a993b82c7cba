//! Diagnostic reporting.
//!
//! Logical errors in the input (bad aliases, unresolvable references,
//! cycles, type mismatches) are never panics and never plain prints: every
//! component receives a [`DiagnosticSink`] and reports through it, then
//! recovers locally. Only structural failures (a document that does not
//! parse) surface as hard `Err` values.

use std::fmt;

use crate::document::Span;

/// Diagnostic group attached to everything the pipeline reports.
pub const DIAGNOSTIC_GROUP: &str = "parser";

/// Diagnostic label attached to everything the pipeline reports.
pub const DIAGNOSTIC_LABEL: &str = "init";

/// The kinds of recoverable input errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A string contained braces where an alias was expected but did not
    /// match the `{dotted.path}` shape
    InvalidAliasSyntax,
    /// An alias pointed at a token that is not in the set
    UnresolvedAlias,
    /// An alias chain revisited a reference
    CircularAlias,
    /// An alias terminated at a token whose `$type` is not permitted at the
    /// referencing site
    TypeMismatch,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::InvalidAliasSyntax => "invalid-alias-syntax",
            DiagnosticKind::UnresolvedAlias => "unresolved-alias",
            DiagnosticKind::CircularAlias => "circular-alias",
            DiagnosticKind::TypeMismatch => "type-mismatch",
        }
    }
}

/// One reported problem, with the source coordinates of the responsible
/// node when they are known.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub group: &'static str,
    pub label: &'static str,
    pub filename: Option<String>,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            group: DIAGNOSTIC_GROUP,
            label: DIAGNOSTIC_LABEL,
            filename: None,
            span: None,
        }
    }

    /// Attach source coordinates.
    pub fn with_source(mut self, filename: impl Into<String>, span: Span) -> Self {
        self.filename = Some(filename.into());
        self.span = Some(span);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.group, self.label, self.message)?;
        if let (Some(filename), Some(span)) = (&self.filename, &self.span) {
            write!(f, " ({}:{}:{})", filename, span.line, span.column)?;
        }
        Ok(())
    }
}

/// Receiver for diagnostics.
///
/// The pipeline is generic over the sink so callers can forward to their own
/// logger, collect for assertions, or both.
pub trait DiagnosticSink {
    fn error(&mut self, diagnostic: Diagnostic);
}

/// Sink that collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    diagnostics: Vec<Diagnostic>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics of one kind, in report order.
    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.kind == kind)
            .collect()
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl DiagnosticSink for MemorySink {
    fn error(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Sink that forwards every diagnostic through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn error(&mut self, diagnostic: Diagnostic) {
        tracing::error!(
            group = diagnostic.group,
            label = diagnostic.label,
            kind = diagnostic.kind.as_str(),
            filename = diagnostic.filename.as_deref().unwrap_or(""),
            line = diagnostic.span.map(|span| span.line).unwrap_or(0),
            column = diagnostic.span.map(|span| span.column).unwrap_or(0),
            "{}",
            diagnostic.message
        );
    }
}
