//! Alias syntax and JSON-Pointer codecs.
//!
//! A token reference is the literal `{dotted.path.to.token}`. The resolver
//! and linker work on JSON-Pointer-style `$ref` strings derived from it:
//! `{color.brand.100}` → `#/color/brand/100/$value`. Inside a segment, `~`
//! encodes as `~0` and `/` as `~1`; dots between segments become slashes.

/// Returns `true` iff `s` is an alias: a `{dotted.path}` matched end-to-end.
///
/// Aliases embedded in larger strings are not aliases, and neither is a
/// string with braces inside the body.
pub fn is_alias(s: &str) -> bool {
    let Some(body) = s.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) else {
        return false;
    };
    !body.is_empty() && !body.contains('{') && !body.contains('}')
}

/// Pointer-escape a single path segment (`~` → `~0`, `/` → `~1`).
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_segment`]. Order matters: `~1` first, then `~0`.
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Encode an alias into its `$ref` pointer.
///
/// `{a.b.c}` → `#/a/b/c/$value`. The caller must have checked [`is_alias`].
pub fn alias_to_pointer(alias: &str) -> String {
    let body = alias
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(alias);
    let mut pointer = String::from("#");
    for segment in body.split('.') {
        pointer.push('/');
        pointer.push_str(&escape_segment(segment));
    }
    pointer.push_str("/$value");
    pointer
}

/// Pointer for a traversal path; the document root is `#/`.
pub fn path_to_pointer(path: &[String]) -> String {
    if path.is_empty() {
        return String::from("#/");
    }
    let mut pointer = String::from("#");
    for segment in path {
        pointer.push('/');
        pointer.push_str(&escape_segment(segment));
    }
    pointer
}

/// Strip a trailing `/$value` (and anything after it) from a pointer,
/// yielding the owning token's pointer.
pub fn token_pointer(pointer: &str) -> &str {
    if let Some(pos) = pointer.find("/$value") {
        let rest = &pointer[pos + "/$value".len()..];
        if rest.is_empty() || rest.starts_with('/') {
            return &pointer[..pos];
        }
    }
    pointer
}

/// The sub-path after `/$value/`, if the pointer addresses a position
/// *inside* a token's value rather than the value itself.
pub fn value_subpath(pointer: &str) -> Option<&str> {
    let pos = pointer.find("/$value")?;
    let rest = &pointer[pos + "/$value".len()..];
    rest.strip_prefix('/')
}

/// Decode a pointer into a dotted token ID.
///
/// Strips the leading `#/`, drops a trailing `$value` segment and anything
/// after it, unescapes each segment, and joins with `.`.
pub fn pointer_to_id(pointer: &str) -> String {
    let trimmed = token_pointer(pointer);
    let trimmed = trimmed.strip_prefix("#/").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return String::new();
    }
    trimmed
        .split('/')
        .map(unescape_segment)
        .collect::<Vec<_>>()
        .join(".")
}

/// Pointer for a dotted token ID (`color.brand` → `#/color/brand`).
pub fn id_to_pointer(id: &str) -> String {
    if id.is_empty() {
        return String::from("#/");
    }
    let mut pointer = String::from("#");
    for segment in id.split('.') {
        pointer.push('/');
        pointer.push_str(&escape_segment(segment));
    }
    pointer
}

/// Whether `ancestor` is a proper path-segment prefix of `descendant`.
///
/// Segment-aware: `#/color` is an ancestor of `#/color/brand` but `#/color2`
/// is not. The root pointer `#/` is an ancestor of every other pointer.
pub fn is_path_prefix(ancestor: &str, descendant: &str) -> bool {
    if ancestor == descendant {
        return false;
    }
    if ancestor == "#/" {
        return descendant.starts_with("#/");
    }
    descendant.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('/'))
}
