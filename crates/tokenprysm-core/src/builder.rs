//! Token-set builder.
//!
//! `TokenSetBuilder` drives the full pipeline over one or more parsed
//! sources:
//!
//! 1. **Walk**: classify every object node as token or group, index groups
//!    with ancestor cascade, and normalize tokens (this module).
//! 2. **Resolve**: resolve aliases per token and mode ([`crate::resolver`]).
//! 3. **Link**: populate the bidirectional alias graph ([`crate::linker`]).
//!
//! Logical input problems are reported through the caller's
//! [`DiagnosticSink`] and recovered from; only structural failures return
//! `Err`.

use std::collections::BTreeMap;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::alias;
use crate::diagnostics::DiagnosticSink;
use crate::document::{DocumentError, Member, NodeId, NodeValue, Source, SourceRef};
use crate::linker;
use crate::order::sort_unique_natural;
use crate::resolver::Resolver;
use crate::tokens::{
    Deprecated, GroupNormalized, TokenModeState, TokenNormalized, TokenSet, DEFAULT_MODE,
};

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A source document failed to parse
    #[error("failed to parse {filename}: {source}")]
    Parse {
        filename: String,
        #[source]
        source: DocumentError,
    },

    /// A source document's top level is not an object
    #[error("document root of {filename} must be an object")]
    RootNotObject { filename: String },

    /// An `ignore.tokens` pattern is not a valid glob
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The ignore pattern set failed to compile
    #[error("failed to compile ignore patterns: {0}")]
    IgnorePatterns(#[source] globset::Error),
}

// ============================================================================
// Options
// ============================================================================

/// Build options: which tokens to drop during normalization.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Drop tokens whose resolved `$deprecated` is active
    pub ignore_deprecated: bool,

    /// Drop tokens whose dotted ID matches any of these glob patterns
    pub ignore_tokens: Vec<String>,
}

impl BuildOptions {
    fn compile(&self) -> Result<CompiledIgnore, BuildError> {
        let globs = if self.ignore_tokens.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &self.ignore_tokens {
                let glob = Glob::new(pattern).map_err(|source| BuildError::InvalidIgnorePattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(BuildError::IgnorePatterns)?)
        };
        Ok(CompiledIgnore {
            deprecated: self.ignore_deprecated,
            globs,
        })
    }
}

struct CompiledIgnore {
    deprecated: bool,
    globs: Option<GlobSet>,
}

impl CompiledIgnore {
    fn matches(&self, id: &str) -> bool {
        self.globs.as_ref().is_some_and(|globs| globs.is_match(id))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds a normalized [`TokenSet`] from parsed sources.
///
/// ## Example
///
/// ```
/// use tokenprysm_core::{MemorySink, TokenSetBuilder};
///
/// let mut builder = TokenSetBuilder::new();
/// builder
///     .add_json(
///         "tokens.json",
///         r##"{"color": {"red": {"$value": "#ff0000", "$type": "color"}}}"##,
///     )
///     .unwrap();
///
/// let mut sink = MemorySink::new();
/// let set = builder.build(&mut sink).unwrap();
/// assert_eq!(set.len(), 1);
/// assert!(sink.is_empty());
/// ```
#[derive(Default)]
pub struct TokenSetBuilder {
    options: BuildOptions,
    sources: Vec<Source>,
}

impl TokenSetBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with custom options.
    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            options,
            sources: Vec::new(),
        }
    }

    /// Queue an already-parsed source.
    ///
    /// Sources are ingested in queue order; a later source that defines an
    /// existing token replaces it.
    pub fn add_source(&mut self, source: Source) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// Parse and queue raw JSON text.
    pub fn add_json(
        &mut self,
        filename: impl Into<String>,
        src: impl Into<String>,
    ) -> Result<&mut Self, BuildError> {
        let filename = filename.into();
        let source = Source::parse(filename.clone(), src).map_err(|source| BuildError::Parse {
            filename,
            source,
        })?;
        Ok(self.add_source(source))
    }

    /// Run all three phases and return the normalized set.
    ///
    /// Diagnostics for recoverable input problems flow through `sink`;
    /// structural failures return `Err`.
    pub fn build(&mut self, sink: &mut dyn DiagnosticSink) -> Result<TokenSet, BuildError> {
        let ignore = self.options.compile()?;
        let sources = std::mem::take(&mut self.sources);

        let mut set = TokenSet::new();
        for source in &sources {
            let root = source.document.root();
            if !matches!(source.document.node(root).value, NodeValue::Object(_)) {
                return Err(BuildError::RootNotObject {
                    filename: source.filename.clone(),
                });
            }
            let mut walker = Walker {
                doc: &source.document,
                filename: &source.filename,
                ignore: &ignore,
                set: &mut set,
            };
            let mut path = Vec::new();
            walker.walk(root, &mut path);
            debug!(filename = %source.filename, tokens = set.tokens.len(), "walked source");
        }

        // Groups are final after the walk.
        for group in set.groups.values_mut() {
            sort_unique_natural(&mut group.tokens);
        }
        info!(
            tokens = set.tokens.len(),
            groups = set.groups.len(),
            "normalized token set"
        );

        let mode_refs = Resolver::run(&mut set, sink);
        linker::link(&mut set, &mode_refs);

        Ok(set)
    }
}

// ============================================================================
// Walker
// ============================================================================

struct Walker<'a> {
    doc: &'a crate::document::Document,
    filename: &'a str,
    ignore: &'a CompiledIgnore,
    set: &'a mut TokenSet,
}

impl<'a> Walker<'a> {
    /// Depth-first walk of an object node.
    ///
    /// An object with a `$value` member is a token and is not descended
    /// into; any other object is a group. `$`-prefixed group members are
    /// metadata and never produce groups or tokens, which keeps
    /// `$extensions` subtrees (including mode values that themselves carry
    /// `$value`) out of the classification.
    fn walk(&mut self, node: NodeId, path: &mut Vec<String>) {
        let doc = self.doc;
        let NodeValue::Object(members) = &doc.node(node).value else {
            return;
        };

        if members.iter().any(|member| member.name == "$value") {
            self.normalize_token(node, path);
            return;
        }

        self.index_group(node, path, members);
        for member in members {
            if member.name.starts_with('$') {
                continue;
            }
            if matches!(doc.node(member.value).value, NodeValue::Object(_)) {
                path.push(member.name.clone());
                self.walk(member.value, path);
                path.pop();
            }
        }
    }

    /// Create or update the group record at `path`.
    ///
    /// Ancestors contribute `$type`/`$description`/`$deprecated` in
    /// ascending key order with overwrite, so successively deeper prefixes
    /// win and the nearest defined ancestor value survives; local members
    /// overwrite last. Re-indexing with identical input is idempotent.
    fn index_group(&mut self, _node: NodeId, path: &[String], members: &[Member]) {
        let json_id = alias::path_to_pointer(path);
        if !self.set.groups.contains_key(&json_id) {
            self.set.groups.insert(
                json_id.clone(),
                GroupNormalized {
                    id: path.join("."),
                    json_id: json_id.clone(),
                    ..Default::default()
                },
            );
        }

        let mut ty = None;
        let mut description = None;
        let mut deprecated = None;
        for (candidate_id, candidate) in &self.set.groups {
            if !alias::is_path_prefix(candidate_id, &json_id) {
                continue;
            }
            if candidate.ty.is_some() {
                ty = candidate.ty.clone();
            }
            if candidate.description.is_some() {
                description = candidate.description.clone();
            }
            if candidate.deprecated.is_some() {
                deprecated = candidate.deprecated.clone();
            }
        }

        let doc = self.doc;
        if let Some(entry) = self.set.groups.get_mut(&json_id) {
            if ty.is_some() {
                entry.ty = ty;
            }
            if description.is_some() {
                entry.description = description;
            }
            if deprecated.is_some() {
                entry.deprecated = deprecated;
            }

            for member in members {
                match member.name.as_str() {
                    "$type" => {
                        if let NodeValue::String(text) = &doc.node(member.value).value {
                            entry.ty = Some(text.clone());
                        }
                    }
                    "$description" => {
                        if let NodeValue::String(text) = &doc.node(member.value).value {
                            entry.description = Some(text.clone());
                        }
                    }
                    "$deprecated" => {
                        let value = doc.to_value(member.value);
                        if let Some(marker) = Deprecated::from_value(&value) {
                            entry.deprecated = Some(marker);
                        }
                    }
                    "$extensions" => {
                        entry.extensions = Some(doc.to_value(member.value));
                    }
                    _ => {}
                }
            }
        }
    }

    /// Normalize the token node at `path` and register it, unless an ignore
    /// filter drops it.
    ///
    /// The token is fully assembled first so the filters can see the
    /// cascaded `$deprecated` and the final ID; a dropped token registers
    /// nothing, leaving no group entry and no modes.
    fn normalize_token(&mut self, node: NodeId, path: &[String]) {
        let json_id = alias::path_to_pointer(path);
        let id = path.join(".");
        let group_json_id = if path.is_empty() {
            String::from("#/")
        } else {
            alias::path_to_pointer(&path[..path.len() - 1])
        };

        let Some(value_node) = self.doc.member(node, "$value") else {
            return;
        };

        let original_object = self.doc.to_value(node);
        let group = self.set.groups.get(&group_json_id);

        let ty = original_object
            .get("$type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| group.and_then(|g| g.ty.clone()));
        let description = original_object
            .get("$description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let deprecated = original_object
            .get("$deprecated")
            .and_then(Deprecated::from_value)
            .or_else(|| group.and_then(|g| g.deprecated.clone()));
        let value = original_object
            .get("$value")
            .cloned()
            .unwrap_or(Value::Null);
        let extensions = original_object.get("$extensions").cloned();

        let mut mode = BTreeMap::new();
        mode.insert(
            DEFAULT_MODE.to_string(),
            TokenModeState::new(value.clone(), Some(self.source_ref(value_node))),
        );
        if let Some(ext_node) = self.doc.member(node, "$extensions") {
            if let Some(mode_node) = self.doc.member(ext_node, "mode") {
                if let NodeValue::Object(mode_members) = &self.doc.node(mode_node).value {
                    for member in mode_members {
                        mode.insert(
                            member.name.clone(),
                            TokenModeState::new(
                                self.doc.to_value(member.value),
                                Some(self.source_ref(member.value)),
                            ),
                        );
                    }
                }
            }
        }

        if self.ignore.deprecated && deprecated.as_ref().is_some_and(Deprecated::is_active) {
            debug!(token = %id, "dropping deprecated token");
            return;
        }
        if self.ignore.matches(&id) {
            debug!(token = %id, "dropping token matching ignore pattern");
            return;
        }

        if let Some(group_entry) = self.set.groups.get_mut(&group_json_id) {
            if !group_entry.tokens.contains(&id) {
                group_entry.tokens.push(id.clone());
            }
        }

        let token = TokenNormalized {
            id,
            json_id: json_id.clone(),
            ty,
            description,
            deprecated,
            value,
            extensions,
            group: group_json_id,
            source: self.source_ref(node),
            mode,
            alias_of: None,
            alias_chain: Vec::new(),
            aliased_by: Vec::new(),
            dependencies: Vec::new(),
            partial_alias_of: None,
        };
        self.set.tokens.insert(json_id, token);
    }

    fn source_ref(&self, node: NodeId) -> SourceRef {
        SourceRef {
            filename: self.filename.to_string(),
            node,
            span: self.doc.span(node),
        }
    }
}
