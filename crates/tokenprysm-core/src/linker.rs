//! Alias-graph linking (Phase 3).
//!
//! Consumes the mode-ref map recorded by the resolver and populates the
//! bidirectional link fields on the flat token set: forward links
//! (`alias_of`, `alias_chain`, `partial_alias_of`), reverse links
//! (`aliased_by`), and raw dependencies. Mode `.` is promoted to the token
//! root at the end; `dependencies` and `aliased_by` union across modes.

use serde_json::{Map, Value};
use tracing::debug;

use crate::alias;
use crate::order::sort_unique_natural;
use crate::resolver::ModeRefMap;
use crate::tokens::{TokenSet, DEFAULT_MODE};

/// Populate the alias graph from the recorded reference sites.
pub(crate) fn link(set: &mut TokenSet, mode_refs: &ModeRefMap) {
    for (mode, sites) in mode_refs {
        for (site, ref_site) in sites {
            let owner_ptr = alias::token_pointer(site).to_string();
            if !set.tokens.contains_key(&owner_ptr) {
                debug!(site = %site, filename = %ref_site.filename, "reference site has no owning token");
                continue;
            }
            let chain_ids: Vec<String> = ref_site
                .ref_chain
                .iter()
                .map(|reference| alias::pointer_to_id(reference))
                .collect();
            let chain_ptrs: Vec<String> = ref_site
                .ref_chain
                .iter()
                .map(|reference| alias::token_pointer(reference).to_string())
                .collect();
            let Some(terminal_id) = chain_ids.last().cloned() else {
                continue;
            };

            // Dependencies accumulate on the owning token's root across
            // every mode, and on the mode itself.
            if let Some(owner) = set.tokens.get_mut(&owner_ptr) {
                owner
                    .dependencies
                    .extend(ref_site.ref_chain.iter().cloned());
                if let Some(state) = owner.mode.get_mut(mode) {
                    state
                        .dependencies
                        .extend(ref_site.ref_chain.iter().cloned());
                }
            }

            // A site at the value root is a whole-token alias; a site below
            // it marks a position in the partial-alias mirror.
            match alias::value_subpath(site) {
                None => {
                    if let Some(owner) = set.tokens.get_mut(&owner_ptr) {
                        if let Some(state) = owner.mode.get_mut(mode) {
                            state.alias_of = Some(terminal_id.clone());
                            state.alias_chain = chain_ids.clone();
                        }
                    }
                }
                Some(subpath) => {
                    let segments: Vec<String> =
                        subpath.split('/').map(str::to_string).collect();
                    if let Some(owner) = set.tokens.get_mut(&owner_ptr) {
                        if let Some(state) = owner.mode.get_mut(mode) {
                            let original = state.original_value.clone();
                            let mut mirror =
                                state.partial_alias_of.take().unwrap_or(Value::Null);
                            set_partial_leaf(&mut mirror, Some(&original), &segments, &terminal_id);
                            state.partial_alias_of = Some(mirror);
                        }
                    }
                }
            }

            // Reverse links: every token in the chain is aliased by the
            // owner and by every upstream hop before it.
            let owner_id = set
                .tokens
                .get(&owner_ptr)
                .map(|token| token.id.clone())
                .unwrap_or_default();
            let mut upstream: Vec<String> = vec![owner_id];
            for (target_ptr, target_id) in chain_ptrs.iter().zip(chain_ids.iter()) {
                if let Some(target) = set.tokens.get_mut(target_ptr) {
                    let self_id = target.id.clone();
                    for up in &upstream {
                        if up != &self_id && !target.aliased_by.contains(up) {
                            target.aliased_by.push(up.clone());
                        }
                    }
                    let mode_key = if target.mode.contains_key(mode) {
                        mode.clone()
                    } else {
                        DEFAULT_MODE.to_string()
                    };
                    if let Some(state) = target.mode.get_mut(&mode_key) {
                        for up in &upstream {
                            if up != &self_id && !state.aliased_by.contains(up) {
                                state.aliased_by.push(up.clone());
                            }
                        }
                    }
                }
                upstream.push(target_id.clone());
            }
        }
    }

    // Promote the default mode to the token root; finalize ordering.
    for token in set.tokens.values_mut() {
        if let Some(default_state) = token.mode.get(DEFAULT_MODE) {
            token.alias_of = default_state.alias_of.clone();
            token.alias_chain = default_state.alias_chain.clone();
            token.partial_alias_of = default_state.partial_alias_of.clone();
        }
        sort_unique_natural(&mut token.dependencies);
        sort_unique_natural(&mut token.aliased_by);
        for state in token.mode.values_mut() {
            sort_unique_natural(&mut state.dependencies);
            sort_unique_natural(&mut state.aliased_by);
        }
    }
}

/// Set one leaf in the partial-alias mirror, creating containers lazily.
///
/// The mirror copies the shape of the original value at each hop: array
/// positions become arrays (padded with nulls), everything else becomes a
/// map keyed by the unescaped segment.
fn set_partial_leaf(mirror: &mut Value, value: Option<&Value>, segments: &[String], leaf: &str) {
    let Some((segment, rest)) = segments.split_first() else {
        return;
    };
    let index: Option<usize> = segment.parse().ok();
    let value_is_array = matches!(value, Some(Value::Array(_)));

    if let (Some(index), true) = (index, value_is_array) {
        if !matches!(mirror, Value::Array(_)) {
            *mirror = Value::Array(Vec::new());
        }
        if let Value::Array(items) = mirror {
            while items.len() <= index {
                items.push(Value::Null);
            }
            let next_value = match value {
                Some(Value::Array(original)) => original.get(index),
                _ => None,
            };
            if rest.is_empty() {
                items[index] = Value::String(leaf.to_string());
            } else {
                set_partial_leaf(&mut items[index], next_value, rest, leaf);
            }
        }
    } else {
        let key = alias::unescape_segment(segment);
        if !matches!(mirror, Value::Object(_)) {
            *mirror = Value::Object(Map::new());
        }
        if let Value::Object(members) = mirror {
            let next_value = match value {
                Some(Value::Object(original)) => original.get(&key),
                _ => None,
            };
            if rest.is_empty() {
                members.insert(key, Value::String(leaf.to_string()));
            } else {
                let entry = members.entry(key).or_insert(Value::Null);
                set_partial_leaf(entry, next_value, rest, leaf);
            }
        }
    }
}
