//! TokenPrysm Core - Design-token (DTCG) normalization and alias resolution
//!
//! This crate provides the core functionality for token-set construction:
//! - Located JSON document model for token files
//! - Tree-to-flat normalization with group-property cascade
//! - Mode expansion (default mode `.` plus `$extensions.mode` variants)
//! - Transitive alias resolution with cycle detection and type checks
//! - Bidirectional alias-graph construction over the flat token set

pub mod alias;
pub mod builder;
pub mod diagnostics;
pub mod document;
pub mod order;
pub mod tokens;

mod linker;
mod resolver;

// Re-exports for convenience
pub use builder::{BuildError, BuildOptions, TokenSetBuilder};
pub use diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticSink, MemorySink, TracingSink, DIAGNOSTIC_GROUP,
    DIAGNOSTIC_LABEL,
};
pub use document::{Document, DocumentError, NodeId, Source, SourceRef, Span};
pub use order::natural_cmp;
pub use tokens::{
    Deprecated, GroupNormalized, TokenModeState, TokenNormalized, TokenSet, DEFAULT_MODE,
};
