//! Normalized token-set model.
//!
//! This module defines the flat output of the pipeline: groups with
//! cascaded metadata, tokens with per-mode state, and the alias-graph
//! fields populated by the resolver and linker. Relations between records
//! (token → group, token → AST node, alias links) are stored as string keys
//! and node indices, never as owning references.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alias;
use crate::document::SourceRef;

/// Name of the default mode, always present on every token.
pub const DEFAULT_MODE: &str = ".";

// ============================================================================
// Deprecation Marker
// ============================================================================

/// A `$deprecated` marker: a plain flag or a human-readable reason.
///
/// An explicit `false` is meaningful (it shadows an ancestor group's
/// deprecation), so absence and `false` must stay distinguishable:
/// `Option<Deprecated>` on the records below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Deprecated {
    Bool(bool),
    Reason(String),
}

impl Deprecated {
    /// Whether the marker actually deprecates: `true`, or a non-empty reason.
    pub fn is_active(&self) -> bool {
        match self {
            Deprecated::Bool(flag) => *flag,
            Deprecated::Reason(reason) => !reason.is_empty(),
        }
    }

    /// Read a marker out of a raw `$deprecated` member, if it has a
    /// representable shape.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(Deprecated::Bool(*flag)),
            Value::String(reason) => Some(Deprecated::Reason(reason.clone())),
            _ => None,
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

/// A normalized group: cascaded metadata plus the tokens directly inside it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupNormalized {
    /// Dotted path (`color.brand`); the document root group is `""`
    pub id: String,

    /// Slash path (`#/color/brand`); the document root group is `#/`
    #[serde(rename = "jsonID")]
    pub json_id: String,

    #[serde(rename = "$type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,

    #[serde(rename = "$description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "$deprecated", skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecated>,

    #[serde(rename = "$extensions", skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,

    /// IDs of the tokens directly in this group, natural-sorted
    pub tokens: Vec<String>,
}

// ============================================================================
// Tokens
// ============================================================================

/// Per-mode state of a token: the mode-local value plus the alias fields
/// scoped to that mode.
#[derive(Debug, Clone, Serialize)]
pub struct TokenModeState {
    #[serde(rename = "$value")]
    pub value: Value,

    /// The value as written, before alias resolution
    #[serde(rename = "originalValue")]
    pub original_value: Value,

    /// Coordinates of this mode's value node in its document
    #[serde(skip)]
    pub source: Option<SourceRef>,

    #[serde(rename = "aliasOf", skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,

    #[serde(rename = "aliasChain", skip_serializing_if = "Vec::is_empty")]
    pub alias_chain: Vec<String>,

    #[serde(rename = "aliasedBy", skip_serializing_if = "Vec::is_empty")]
    pub aliased_by: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(rename = "partialAliasOf", skip_serializing_if = "Option::is_none")]
    pub partial_alias_of: Option<Value>,
}

impl TokenModeState {
    pub fn new(value: Value, source: Option<SourceRef>) -> Self {
        Self {
            original_value: value.clone(),
            value,
            source,
            alias_of: None,
            alias_chain: Vec::new(),
            aliased_by: Vec::new(),
            dependencies: Vec::new(),
            partial_alias_of: None,
        }
    }
}

/// A normalized token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenNormalized {
    /// Dotted path (`color.brand.100`)
    pub id: String,

    /// Slash path (`#/color/brand/100`)
    #[serde(rename = "jsonID")]
    pub json_id: String,

    /// Own `$type`, else the enclosing group's cascaded type
    #[serde(rename = "$type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,

    #[serde(rename = "$description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nullish chain: the token's own marker, else the group's
    #[serde(rename = "$deprecated", skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecated>,

    /// The resolved value (mirrors mode `.` after resolution)
    #[serde(rename = "$value")]
    pub value: Value,

    #[serde(rename = "$extensions", skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,

    /// `jsonID` of the enclosing group (back-reference, not ownership)
    pub group: String,

    /// Coordinates of the token node in its document
    #[serde(skip)]
    pub source: SourceRef,

    /// Per-mode state; `BTreeMap` keeps `.` first, then modes ascending
    pub mode: BTreeMap<String, TokenModeState>,

    #[serde(rename = "aliasOf", skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,

    #[serde(rename = "aliasChain", skip_serializing_if = "Vec::is_empty")]
    pub alias_chain: Vec<String>,

    #[serde(rename = "aliasedBy", skip_serializing_if = "Vec::is_empty")]
    pub aliased_by: Vec<String>,

    /// Raw `$ref` strings this token depends on, across every mode
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(rename = "partialAliasOf", skip_serializing_if = "Option::is_none")]
    pub partial_alias_of: Option<Value>,
}

impl TokenNormalized {
    /// State of the default mode `.`.
    pub fn default_mode(&self) -> &TokenModeState {
        &self.mode[DEFAULT_MODE]
    }
}

// ============================================================================
// Token Set
// ============================================================================

/// The flat, normalized output of a build.
///
/// Tokens iterate in insertion order, groups in ascending key order; both
/// orders are deterministic and survive serialization.
#[derive(Debug, Default, Serialize)]
pub struct TokenSet {
    /// Tokens keyed by `jsonID`
    pub tokens: IndexMap<String, TokenNormalized>,

    /// Groups keyed by `jsonID`
    pub groups: BTreeMap<String, GroupNormalized>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a token by `jsonID` (`#/color/brand/100`).
    pub fn token(&self, json_id: &str) -> Option<&TokenNormalized> {
        self.tokens.get(json_id)
    }

    /// Look up a token by dotted ID (`color.brand.100`).
    pub fn token_by_id(&self, id: &str) -> Option<&TokenNormalized> {
        self.tokens.get(&alias::id_to_pointer(id))
    }

    /// Look up a group by `jsonID` (`#/color/brand`).
    pub fn group(&self, json_id: &str) -> Option<&GroupNormalized> {
        self.groups.get(json_id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ============================================================================
// Composite Type Slots
// ============================================================================

/// Expected `$type`s for a member of a composite token value.
///
/// Aliases nested inside a composite value must terminate at tokens of the
/// slot's type(s); `cubicBezier` is handled separately because its value is
/// a positional array of numbers rather than a keyed object.
pub fn composite_slot(ty: &str, key: &str) -> Option<&'static [&'static str]> {
    match (ty, key) {
        ("border", "color") => Some(&["color"]),
        ("border", "stroke") => Some(&["strokeStyle"]),
        ("border", "width") => Some(&["dimension"]),
        ("gradient", "color") => Some(&["color"]),
        ("gradient", "position") => Some(&["number"]),
        ("shadow", "color") => Some(&["color"]),
        ("shadow", "offsetX") => Some(&["dimension"]),
        ("shadow", "offsetY") => Some(&["dimension"]),
        ("shadow", "blur") => Some(&["dimension"]),
        ("shadow", "spread") => Some(&["dimension"]),
        ("shadow", "inset") => Some(&["boolean"]),
        ("strokeStyle", "dashArray") => Some(&["dimension"]),
        ("transition", "duration") => Some(&["duration"]),
        ("transition", "delay") => Some(&["duration"]),
        ("transition", "timingFunction") => Some(&["cubicBezier"]),
        ("typography", "fontFamily") => Some(&["fontFamily"]),
        ("typography", "fontWeight") => Some(&["fontWeight"]),
        ("typography", "fontSize") => Some(&["dimension"]),
        ("typography", "lineHeight") => Some(&["dimension", "number"]),
        ("typography", "letterSpacing") => Some(&["dimension"]),
        _ => None,
    }
}
