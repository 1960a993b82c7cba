//! End-to-end tests for normalization, alias resolution, and graph linking.
//!
//! Each scenario feeds a literal token document through the full pipeline
//! and asserts on the flat set: resolved values, forward links, reverse
//! links, dependencies, and diagnostics.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tokenprysm-core --test resolve
//! ```

use serde_json::json;
use tokenprysm_core::{
    DiagnosticKind, MemorySink, TokenNormalized, TokenSet, TokenSetBuilder,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn build(src: &str) -> (TokenSet, MemorySink) {
    let mut builder = TokenSetBuilder::new();
    builder
        .add_json("tokens.json", src)
        .expect("fixture should parse");
    let mut sink = MemorySink::new();
    let set = builder.build(&mut sink).expect("fixture should build");
    (set, sink)
}

fn token<'a>(set: &'a TokenSet, id: &str) -> &'a TokenNormalized {
    set.token_by_id(id)
        .unwrap_or_else(|| panic!("token {id} should exist"))
}

// ============================================================================
// Literal Scenarios
// ============================================================================

#[test]
fn test_simple_alias() {
    let (set, sink) = build(
        r##"{ "color": {
            "red": { "$value": "#ff0000", "$type": "color" },
            "danger": { "$value": "{color.red}", "$type": "color" }
        } }"##,
    );
    assert!(sink.is_empty(), "diagnostics: {:?}", sink.diagnostics());

    let danger = token(&set, "color.danger");
    assert_eq!(danger.value, json!("#ff0000"));
    assert_eq!(danger.alias_of.as_deref(), Some("color.red"));
    assert_eq!(danger.alias_chain, ["color.red"]);
    assert_eq!(danger.dependencies, ["#/color/red/$value"]);

    let red = token(&set, "color.red");
    assert_eq!(red.aliased_by, ["color.danger"]);
    assert!(red.alias_of.is_none());
}

#[test]
fn test_transitive_chain() {
    let (set, sink) = build(
        r##"{
            "a": { "$value": "{b}", "$type": "color" },
            "b": { "$value": "{c}", "$type": "color" },
            "c": { "$value": "#112233", "$type": "color" }
        }"##,
    );
    assert!(sink.is_empty());

    let a = token(&set, "a");
    assert_eq!(a.alias_chain, ["b", "c"]);
    assert_eq!(a.alias_of.as_deref(), Some("c"));
    assert_eq!(a.value, json!("#112233"));
    assert_eq!(a.dependencies, ["#/b/$value", "#/c/$value"]);

    assert_eq!(token(&set, "c").aliased_by, ["a", "b"]);
    assert_eq!(token(&set, "b").aliased_by, ["a"]);
}

#[test]
fn test_type_mismatch() {
    let (set, sink) = build(
        r##"{
            "x": { "$value": "5px", "$type": "dimension" },
            "y": { "$value": "{x}", "$type": "color" }
        }"##,
    );
    assert_eq!(sink.of_kind(DiagnosticKind::TypeMismatch).len(), 1);
    // The failing site keeps its pre-resolution value.
    assert_eq!(token(&set, "y").value, json!("{x}"));
}

#[test]
fn test_partial_alias_inside_shadow() {
    let (set, sink) = build(
        r##"{
            "color": { "red": { "$value": "#ff0000", "$type": "color" } },
            "shadow1": { "$type": "shadow", "$value": {
                "color": "{color.red}",
                "offsetX": "2px", "offsetY": "2px",
                "blur": "4px", "spread": "0", "inset": false
            } }
        }"##,
    );
    assert!(sink.is_empty(), "diagnostics: {:?}", sink.diagnostics());

    let shadow = token(&set, "shadow1");
    assert_eq!(shadow.partial_alias_of, Some(json!({"color": "color.red"})));
    assert_eq!(shadow.value["color"], json!("#ff0000"));
    assert_eq!(shadow.value["inset"], json!(false));
    // A partial alias is a full reverse link.
    assert_eq!(token(&set, "color.red").aliased_by, ["shadow1"]);
    // But not a whole-token alias.
    assert!(shadow.alias_of.is_none());
    assert!(shadow.alias_chain.is_empty());
}

#[test]
fn test_cubic_bezier_number_aliasing() {
    let (set, sink) = build(
        r##"{
            "timing": { "start": { "$value": 0.3, "$type": "number" } },
            "easing": { "$type": "cubicBezier", "$value": [0, "{timing.start}", 1, 1] }
        }"##,
    );
    assert!(sink.is_empty(), "diagnostics: {:?}", sink.diagnostics());

    let easing = token(&set, "easing");
    assert_eq!(easing.value, json!([0, 0.3, 1, 1]));
    assert_eq!(easing.dependencies, ["#/timing/start/$value"]);
    assert_eq!(easing.partial_alias_of, Some(json!([null, "timing.start"])));
}

#[test]
fn test_cycle_is_rejected() {
    let (set, sink) = build(
        r##"{
            "a": { "$value": "{b}", "$type": "color" },
            "b": { "$value": "{a}", "$type": "color" }
        }"##,
    );
    assert!(!sink.of_kind(DiagnosticKind::CircularAlias).is_empty());
    // Neither value is overwritten with nonsense.
    assert_eq!(token(&set, "a").value, json!("{b}"));
    assert_eq!(token(&set, "b").value, json!("{a}"));
}

// ============================================================================
// Universal Properties
// ============================================================================

#[test]
fn test_group_cascade_applies_to_untyped_tokens() {
    let (set, sink) = build(
        r##"{ "color": { "$type": "color",
            "brand": { "100": { "$value": "#fee" } },
            "named": { "$type": "fontFamily", "sans": { "$value": "Inter" } }
        } }"##,
    );
    assert!(sink.is_empty());
    assert_eq!(token(&set, "color.brand.100").ty.as_deref(), Some("color"));
    assert_eq!(token(&set, "color.named.sans").ty.as_deref(), Some("fontFamily"));
}

#[test]
fn test_chain_integrity() {
    let (set, _) = build(
        r##"{
            "a": { "$value": "{b}", "$type": "color" },
            "b": { "$value": "{c}", "$type": "color" },
            "c": { "$value": "{d}", "$type": "color" },
            "d": { "$value": "#000", "$type": "color" }
        }"##,
    );
    for (_, tok) in &set.tokens {
        if let Some(alias_of) = &tok.alias_of {
            assert_eq!(tok.alias_chain.last(), Some(alias_of));
            for link in &tok.alias_chain {
                assert!(set.token_by_id(link).is_some(), "missing link {link}");
            }
            // The chain terminates at a non-alias token.
            let terminal = set.token_by_id(alias_of).unwrap();
            assert!(terminal.alias_of.is_none());
        }
    }
    assert_eq!(token(&set, "a").alias_chain.len(), 3);
}

#[test]
fn test_reverse_links_match_chains() {
    let (set, _) = build(
        r##"{
            "a": { "$value": "{b}", "$type": "color" },
            "b": { "$value": "{c}", "$type": "color" },
            "c": { "$value": "#000", "$type": "color" },
            "lone": { "$value": "#fff", "$type": "color" }
        }"##,
    );
    for (_, t) in &set.tokens {
        for (_, u) in &set.tokens {
            let reverse = t.aliased_by.contains(&u.id);
            let forward = u.alias_chain.contains(&t.id);
            assert_eq!(
                reverse, forward,
                "reverse-link mismatch between {} and {}",
                t.id, u.id
            );
        }
    }
}

#[test]
fn test_resolution_and_output_are_deterministic() {
    let src = r##"{ "color": {
        "x10": { "$value": "{color.x2}", "$type": "color" },
        "x2": { "$value": "#222", "$type": "color" },
        "x1": { "$value": "{color.x2}", "$type": "color" }
    } }"##;
    let (first, _) = build(src);
    let (second, _) = build(src);

    let first_ids: Vec<_> = first.tokens.keys().cloned().collect();
    let second_ids: Vec<_> = second.tokens.keys().cloned().collect();
    assert_eq!(first_ids, second_ids);

    // Natural order in reverse links: x2 is aliased by x1 before x10.
    assert_eq!(token(&first, "color.x2").aliased_by, ["color.x1", "color.x10"]);
    assert_eq!(
        serde_json::to_value(&first.tokens["#/color/x2"]).unwrap(),
        serde_json::to_value(&second.tokens["#/color/x2"]).unwrap()
    );
}

#[test]
fn test_no_residual_aliases_after_resolution() {
    let (set, sink) = build(
        r##"{
            "base": { "$value": "#010203", "$type": "color" },
            "typography": { "body": { "$type": "typography", "$value": {
                "fontFamily": "{font.sans}", "fontSize": "{size.m}"
            } } },
            "font": { "sans": { "$value": "Inter", "$type": "fontFamily" } },
            "size": { "m": { "$value": "16px", "$type": "dimension" } },
            "ref": { "$value": "{typography.body}", "$type": "typography" }
        }"##,
    );
    assert!(sink.is_empty(), "diagnostics: {:?}", sink.diagnostics());
    let expected = json!({"fontFamily": "Inter", "fontSize": "16px"});
    assert_eq!(token(&set, "typography.body").value, expected);
    // The whole-token alias copies the already-resolved composite.
    assert_eq!(token(&set, "ref").value, expected);
}

// ============================================================================
// Modes
// ============================================================================

#[test]
fn test_mode_dependencies_union_at_root() {
    let (set, sink) = build(
        r##"{ "color": {
            "white": { "$value": "#fff", "$type": "color" },
            "black": { "$value": "#000", "$type": "color" },
            "bg": { "$value": "{color.white}", "$type": "color",
                    "$extensions": { "mode": { "dark": "{color.black}" } } }
        } }"##,
    );
    assert!(sink.is_empty());

    let bg = token(&set, "color.bg");
    // Root dependencies union across modes, natural-sorted.
    assert_eq!(
        bg.dependencies,
        ["#/color/black/$value", "#/color/white/$value"]
    );
    // Mode-scoped fields stay scoped.
    assert_eq!(bg.mode["."].dependencies, ["#/color/white/$value"]);
    assert_eq!(bg.mode["dark"].dependencies, ["#/color/black/$value"]);
    assert_eq!(bg.mode["dark"].alias_of.as_deref(), Some("color.black"));

    // Root alias fields mirror mode "." only.
    assert_eq!(bg.alias_of.as_deref(), Some("color.white"));
    assert_eq!(bg.mode["dark"].value, json!("#000"));
    assert_eq!(bg.value, json!("#fff"));
}

#[test]
fn test_reverse_links_from_non_default_modes() {
    let (set, sink) = build(
        r##"{ "color": {
            "black": { "$value": "#000", "$type": "color" },
            "bg": { "$value": "#fff", "$type": "color",
                    "$extensions": { "mode": { "dark": "{color.black}" } } }
        } }"##,
    );
    assert!(sink.is_empty());
    // A reference from any mode creates the reverse link.
    assert_eq!(token(&set, "color.black").aliased_by, ["color.bg"]);
    // The root of bg carries no whole-token alias: only mode "." promotes.
    assert!(token(&set, "color.bg").alias_of.is_none());
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_unresolved_alias_leaves_site_untouched() {
    let (set, sink) = build(
        r##"{ "shadow1": { "$type": "shadow", "$value": {
            "color": "{color.missing}",
            "offsetX": "1px", "offsetY": "1px", "blur": "0", "spread": "0",
            "inset": false
        } } }"##,
    );
    assert_eq!(sink.of_kind(DiagnosticKind::UnresolvedAlias).len(), 1);
    let shadow = token(&set, "shadow1");
    assert_eq!(shadow.value["color"], json!("{color.missing}"));
    assert!(shadow.dependencies.is_empty());
    assert!(shadow.partial_alias_of.is_none());
}

#[test]
fn test_failures_do_not_stop_other_tokens() {
    let (set, sink) = build(
        r##"{
            "bad": { "$value": "{nope}", "$type": "color" },
            "good": { "$value": "{base}", "$type": "color" },
            "base": { "$value": "#123456", "$type": "color" }
        }"##,
    );
    assert_eq!(sink.len(), 1);
    assert_eq!(token(&set, "good").value, json!("#123456"));
}

#[test]
fn test_diagnostics_carry_source_coordinates() {
    let (_, sink) = build(
        r##"{
            "y": { "$value": "{missing}", "$type": "color" }
        }"##,
    );
    let reports = sink.of_kind(DiagnosticKind::UnresolvedAlias);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].filename.as_deref(), Some("tokens.json"));
    let span = reports[0].span.expect("span should be present");
    assert_eq!(span.line, 2);
}
