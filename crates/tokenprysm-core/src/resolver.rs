//! Alias resolution (Phase 2).
//!
//! For each token and mode, the resolver walks the mode's original value,
//! replaces every alias site with the terminal token's concrete value, and
//! records each site in the mode-ref map the linker consumes. Aliases
//! resolve transitively; composite token types constrain which `$type`s the
//! nested sites may terminate at.
//!
//! Resolution is on-demand and memoized: before a terminal's value is
//! copied out, that token's own mode is resolved first, so results do not
//! depend on document order and resolving an already-resolved set is a
//! no-op. Re-entering an in-progress resolution is a cycle.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::debug;

use crate::alias;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::document::Span;
use crate::tokens::{composite_slot, TokenSet, DEFAULT_MODE};

/// Every reference site recorded during resolution, keyed by mode, then by
/// the site's JSON-Pointer location inside the owning token's value.
pub(crate) type ModeRefMap = BTreeMap<String, BTreeMap<String, RefSite>>;

/// One resolved (or type-mismatched) alias site.
#[derive(Debug, Clone)]
pub(crate) struct RefSite {
    pub filename: String,
    /// `$ref` pointers in traversal order, terminal last
    pub ref_chain: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveState {
    InProgress,
    Done,
}

/// Per-resolution context: the owning token, the mode, the source
/// coordinates for diagnostics, and the sub-path of the site being visited.
struct SiteCtx {
    owner: String,
    mode: String,
    filename: Option<String>,
    span: Option<Span>,
    subpath: Vec<String>,
}

pub(crate) struct Resolver<'a> {
    set: &'a mut TokenSet,
    sink: &'a mut dyn DiagnosticSink,
    mode_refs: ModeRefMap,
    states: HashMap<(String, String), ResolveState>,
}

impl<'a> Resolver<'a> {
    /// Resolve every token and mode in `set`, in insertion order and with
    /// the default mode first, and return the recorded reference sites.
    pub(crate) fn run(set: &'a mut TokenSet, sink: &'a mut dyn DiagnosticSink) -> ModeRefMap {
        let mut resolver = Resolver {
            set,
            sink,
            mode_refs: BTreeMap::new(),
            states: HashMap::new(),
        };

        let ids: Vec<String> = resolver.set.tokens.keys().cloned().collect();
        for json_id in ids {
            let modes: Vec<String> = resolver
                .set
                .tokens
                .get(&json_id)
                .map(|token| token.mode.keys().cloned().collect())
                .unwrap_or_default();
            for mode in modes {
                resolver.ensure_resolved(&json_id, &mode);
            }
        }
        resolver.mode_refs
    }

    /// Resolve one `(token, mode)` if it has not been resolved yet.
    ///
    /// Returns `false` when the state is currently in progress, meaning the
    /// caller has looped back into its own resolution.
    fn ensure_resolved(&mut self, json_id: &str, mode: &str) -> bool {
        let key = (json_id.to_string(), mode.to_string());
        match self.states.get(&key) {
            Some(ResolveState::Done) => return true,
            Some(ResolveState::InProgress) => return false,
            None => {}
        }
        self.states.insert(key.clone(), ResolveState::InProgress);

        let prepared = {
            let token = self.set.tokens.get(json_id);
            token.and_then(|token| {
                token.mode.get(mode).map(|state| {
                    (
                        state.original_value.clone(),
                        token.ty.clone().into_iter().collect::<Vec<String>>(),
                        state.source.as_ref().map(|source| source.filename.clone()),
                        state.source.as_ref().map(|source| source.span),
                    )
                })
            })
        };
        let Some((original, expected, filename, span)) = prepared else {
            self.states.insert(key, ResolveState::Done);
            return true;
        };

        let mut ctx = SiteCtx {
            owner: json_id.to_string(),
            mode: mode.to_string(),
            filename,
            span,
            subpath: Vec::new(),
        };
        let resolved = self.resolve_value(original, &expected, &mut ctx);

        if let Some(token) = self.set.tokens.get_mut(json_id) {
            if let Some(state) = token.mode.get_mut(mode) {
                // Resolution ran, so the result replaces the mode value even
                // when it is 0, false, or "". Failed sites already returned
                // their original sub-value.
                state.value = resolved;
                if mode == DEFAULT_MODE {
                    token.value = state.value.clone();
                }
            }
        }
        self.states.insert(key, ResolveState::Done);
        true
    }

    /// Tri-branch dispatch over the value shape.
    fn resolve_value(&mut self, value: Value, expected: &[String], ctx: &mut SiteCtx) -> Value {
        match value {
            Value::Array(items) => {
                let element_expected: Vec<String> =
                    if expected.first().map(String::as_str) == Some("cubicBezier") {
                        vec!["number".to_string()]
                    } else {
                        expected.to_vec()
                    };
                let mut resolved = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    ctx.subpath.push(index.to_string());
                    resolved.push(self.resolve_value(item, &element_expected, ctx));
                    ctx.subpath.pop();
                }
                Value::Array(resolved)
            }
            Value::Object(members) => {
                let container = expected.first().cloned();
                let mut resolved = Map::with_capacity(members.len());
                for (name, item) in members {
                    match container
                        .as_deref()
                        .and_then(|ty| composite_slot(ty, &name))
                    {
                        Some(slot) => {
                            let slot_expected: Vec<String> =
                                slot.iter().map(|ty| ty.to_string()).collect();
                            ctx.subpath.push(alias::escape_segment(&name));
                            let item = self.resolve_value(item, &slot_expected, ctx);
                            ctx.subpath.pop();
                            resolved.insert(name, item);
                        }
                        None => {
                            resolved.insert(name, item);
                        }
                    }
                }
                Value::Object(resolved)
            }
            Value::String(text) => {
                if alias::is_alias(&text) {
                    self.resolve_alias_site(text, expected, ctx)
                } else {
                    let permits_string =
                        expected.is_empty() || expected.iter().any(|ty| ty == "string");
                    if !permits_string && (text.contains('{') || text.contains('}')) {
                        self.report(DiagnosticKind::InvalidAliasSyntax, "Invalid alias syntax.", ctx);
                    }
                    Value::String(text)
                }
            }
            scalar => scalar,
        }
    }

    /// Resolve one alias site to a concrete value, or return the alias
    /// string unchanged on failure.
    fn resolve_alias_site(&mut self, text: String, expected: &[String], ctx: &mut SiteCtx) -> Value {
        let mut chain = Vec::new();
        let Some(terminal) = self.follow_alias(&text, &mut chain, ctx) else {
            return Value::String(text);
        };

        // Resolve the terminal's own mode before copying its value out, so
        // a composite terminal never leaks unresolved nested aliases.
        let terminal_mode = match self.set.tokens.get(&terminal) {
            Some(token) if token.mode.contains_key(&ctx.mode) => ctx.mode.clone(),
            _ => DEFAULT_MODE.to_string(),
        };
        if !self.ensure_resolved(&terminal, &terminal_mode) {
            self.report(DiagnosticKind::CircularAlias, "Circular alias detected.", ctx);
            return Value::String(text);
        }

        if !expected.is_empty() {
            let terminal_ty = self
                .set
                .tokens
                .get(&terminal)
                .and_then(|token| token.ty.clone());
            let permitted = terminal_ty
                .as_deref()
                .is_some_and(|ty| expected.iter().any(|candidate| candidate == ty));
            if !permitted {
                let message = format!(
                    "Cannot alias to $type \"{}\" from $type \"{}\".",
                    terminal_ty.as_deref().unwrap_or("unknown"),
                    expected.join(", "),
                );
                self.report(DiagnosticKind::TypeMismatch, message, ctx);
                self.record_ref(ctx, chain);
                return Value::String(text);
            }
        }

        self.record_ref(ctx, chain);

        match self.set.tokens.get(&terminal) {
            Some(token) => token
                .mode
                .get(&ctx.mode)
                .or_else(|| token.mode.get(DEFAULT_MODE))
                .map(|state| state.value.clone())
                .unwrap_or_else(|| token.value.clone()),
            None => Value::String(text),
        }
    }

    /// Follow an alias through transitive full-alias hops to its terminal
    /// token, appending each `$ref` to `chain`.
    fn follow_alias(
        &mut self,
        text: &str,
        chain: &mut Vec<String>,
        ctx: &SiteCtx,
    ) -> Option<String> {
        let reference = alias::alias_to_pointer(text);
        if chain.contains(&reference) {
            self.report(DiagnosticKind::CircularAlias, "Circular alias detected.", ctx);
            return None;
        }

        let target = alias::token_pointer(&reference).to_string();
        if !self.set.tokens.contains_key(&target) {
            self.report(
                DiagnosticKind::UnresolvedAlias,
                format!("Could not resolve alias {text}."),
                ctx,
            );
            return None;
        }
        chain.push(reference);

        let mut next_alias = None;
        if let Some(token) = self.set.tokens.get(&target) {
            let state = token
                .mode
                .get(&ctx.mode)
                .or_else(|| token.mode.get(DEFAULT_MODE));
            if let Some(state) = state {
                if let Value::String(candidate) = &state.original_value {
                    if alias::is_alias(candidate) {
                        next_alias = Some(candidate.clone());
                    }
                }
            }
        }

        match next_alias {
            Some(next) => self.follow_alias(&next, chain, ctx),
            None => Some(target),
        }
    }

    fn record_ref(&mut self, ctx: &SiteCtx, chain: Vec<String>) {
        let site = if ctx.subpath.is_empty() {
            format!("{}/$value", ctx.owner)
        } else {
            format!("{}/$value/{}", ctx.owner, ctx.subpath.join("/"))
        };
        debug!(mode = %ctx.mode, site = %site, hops = chain.len(), "recorded alias site");
        self.mode_refs.entry(ctx.mode.clone()).or_default().insert(
            site,
            RefSite {
                filename: ctx.filename.clone().unwrap_or_default(),
                ref_chain: chain,
            },
        );
    }

    fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, ctx: &SiteCtx) {
        let mut diagnostic = Diagnostic::new(kind, message);
        if let (Some(filename), Some(span)) = (&ctx.filename, ctx.span) {
            diagnostic = diagnostic.with_source(filename.clone(), span);
        }
        self.sink.error(diagnostic);
    }
}
