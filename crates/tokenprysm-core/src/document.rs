//! Parsed document model.
//!
//! Token documents arrive as JSON text and are parsed into an arena of
//! located nodes. The arena owns every node; the rest of the pipeline refers
//! back into it with [`NodeId`] indices so that diagnostics can point at the
//! exact source coordinates of a token, a `$value` member, or a mode entry
//! without any ownership cycles.
//!
//! Structural failures here are fatal: a document that cannot be parsed
//! never reaches normalization.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Maximum nesting depth accepted by the parser.
pub const MAX_DEPTH: usize = 512;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while parsing a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Unexpected byte where a value, member, or separator was required
    #[error("unexpected character '{found}' at line {line}, column {column}")]
    UnexpectedCharacter { found: char, line: u32, column: u32 },

    /// Input ended in the middle of a value
    #[error("unexpected end of input at line {line}, column {column}")]
    UnexpectedEnd { line: u32, column: u32 },

    /// Malformed number literal
    #[error("invalid number at line {line}, column {column}")]
    InvalidNumber { line: u32, column: u32 },

    /// Malformed `\`-escape or `\u` sequence inside a string
    #[error("invalid escape sequence at line {line}, column {column}")]
    InvalidEscape { line: u32, column: u32 },

    /// String literal without a closing quote
    #[error("unterminated string starting at line {line}, column {column}")]
    UnterminatedString { line: u32, column: u32 },

    /// Non-whitespace input after the top-level value
    #[error("trailing characters after document end at line {line}, column {column}")]
    TrailingCharacters { line: u32, column: u32 },

    /// Nesting deeper than [`MAX_DEPTH`]
    #[error("maximum nesting depth of {MAX_DEPTH} exceeded")]
    DepthExceeded,
}

// ============================================================================
// Node Model
// ============================================================================

/// Source coordinates of a node: byte offsets plus the 1-based line and
/// column of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// One object member, in declaration order.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub name_span: Span,
    pub value: NodeId,
}

/// The value carried by a node.
#[derive(Debug, Clone)]
pub enum NodeValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<NodeId>),
    Object(Vec<Member>),
}

/// A located node.
#[derive(Debug, Clone)]
pub struct Node {
    pub value: NodeValue,
    pub span: Span,
}

/// An arena-backed parsed document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Parse JSON text into a located node tree.
    pub fn parse(src: &str) -> Result<Self, DocumentError> {
        let mut parser = Parser::new(src);
        parser.skip_whitespace();
        let root = parser.parse_value(0)?;
        parser.skip_whitespace();
        if parser.pos < parser.bytes.len() {
            return Err(DocumentError::TrailingCharacters {
                line: parser.line,
                column: parser.column,
            });
        }
        Ok(Self {
            nodes: parser.nodes,
            root,
        })
    }

    /// The top-level node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    /// Look up a direct member of an object node.
    pub fn member(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match &self.node(id).value {
            NodeValue::Object(members) => members
                .iter()
                .find(|member| member.name == name)
                .map(|member| member.value),
            _ => None,
        }
    }

    pub fn has_member(&self, id: NodeId, name: &str) -> bool {
        self.member(id, name).is_some()
    }

    /// Materialize a node subtree into a plain value graph, preserving
    /// member order.
    pub fn to_value(&self, id: NodeId) -> Value {
        match &self.node(id).value {
            NodeValue::Null => Value::Null,
            NodeValue::Bool(b) => Value::Bool(*b),
            NodeValue::Number(n) => Value::Number(n.clone()),
            NodeValue::String(s) => Value::String(s.clone()),
            NodeValue::Array(items) => {
                Value::Array(items.iter().map(|item| self.to_value(*item)).collect())
            }
            NodeValue::Object(members) => {
                let mut map = Map::with_capacity(members.len());
                for member in members {
                    map.insert(member.name.clone(), self.to_value(member.value));
                }
                Value::Object(map)
            }
        }
    }
}

// ============================================================================
// Input Sources
// ============================================================================

/// One input document: a filename (or URI), its raw text, and the parsed
/// node tree.
#[derive(Debug, Clone)]
pub struct Source {
    pub filename: String,
    pub src: String,
    pub document: Document,
}

impl Source {
    /// Parse `src` and wrap it with its origin name.
    pub fn parse(
        filename: impl Into<String>,
        src: impl Into<String>,
    ) -> Result<Self, DocumentError> {
        let src = src.into();
        let document = Document::parse(&src)?;
        Ok(Self {
            filename: filename.into(),
            src,
            document,
        })
    }
}

/// Origin coordinates stored on tokens and diagnostics. Relation-only: the
/// document arena owns the node, this merely names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub filename: String,
    pub node: NodeId,
    pub span: Span,
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            nodes: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.advance();
        }
    }

    fn here(&self) -> (u32, u32) {
        (self.line, self.column)
    }

    fn unexpected(&self) -> DocumentError {
        match self.peek() {
            Some(byte) => DocumentError::UnexpectedCharacter {
                found: byte as char,
                line: self.line,
                column: self.column,
            },
            None => DocumentError::UnexpectedEnd {
                line: self.line,
                column: self.column,
            },
        }
    }

    fn push_node(&mut self, value: NodeValue, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { value, span });
        id
    }

    fn parse_value(&mut self, depth: usize) -> Result<NodeId, DocumentError> {
        if depth > MAX_DEPTH {
            return Err(DocumentError::DepthExceeded);
        }
        match self.peek() {
            Some(b'{') => self.parse_object(depth),
            Some(b'[') => self.parse_array(depth),
            Some(b'"') => {
                let start = self.pos;
                let (line, column) = self.here();
                let text = self.parse_string_literal()?;
                let span = Span {
                    start,
                    end: self.pos,
                    line,
                    column,
                };
                Ok(self.push_node(NodeValue::String(text), span))
            }
            Some(b't') => self.parse_keyword("true", NodeValue::Bool(true)),
            Some(b'f') => self.parse_keyword("false", NodeValue::Bool(false)),
            Some(b'n') => self.parse_keyword("null", NodeValue::Null),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_object(&mut self, depth: usize) -> Result<NodeId, DocumentError> {
        let start = self.pos;
        let (line, column) = self.here();
        self.advance(); // '{'
        let mut members = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.advance();
            let span = Span {
                start,
                end: self.pos,
                line,
                column,
            };
            return Ok(self.push_node(NodeValue::Object(members), span));
        }

        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.unexpected());
            }
            let name_start = self.pos;
            let (name_line, name_column) = self.here();
            let name = self.parse_string_literal()?;
            let name_span = Span {
                start: name_start,
                end: self.pos,
                line: name_line,
                column: name_column,
            };

            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(self.unexpected());
            }
            self.advance();
            self.skip_whitespace();
            let value = self.parse_value(depth + 1)?;
            members.push(Member {
                name,
                name_span,
                value,
            });

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.advance();
                }
                Some(b'}') => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }

        let span = Span {
            start,
            end: self.pos,
            line,
            column,
        };
        Ok(self.push_node(NodeValue::Object(members), span))
    }

    fn parse_array(&mut self, depth: usize) -> Result<NodeId, DocumentError> {
        let start = self.pos;
        let (line, column) = self.here();
        self.advance(); // '['
        let mut items = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.advance();
            let span = Span {
                start,
                end: self.pos,
                line,
                column,
            };
            return Ok(self.push_node(NodeValue::Array(items), span));
        }

        loop {
            self.skip_whitespace();
            items.push(self.parse_value(depth + 1)?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.advance();
                }
                Some(b']') => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }

        let span = Span {
            start,
            end: self.pos,
            line,
            column,
        };
        Ok(self.push_node(NodeValue::Array(items), span))
    }

    fn parse_keyword(
        &mut self,
        keyword: &str,
        value: NodeValue,
    ) -> Result<NodeId, DocumentError> {
        let start = self.pos;
        let (line, column) = self.here();
        for expected in keyword.bytes() {
            if self.peek() != Some(expected) {
                return Err(self.unexpected());
            }
            self.advance();
        }
        let span = Span {
            start,
            end: self.pos,
            line,
            column,
        };
        Ok(self.push_node(value, span))
    }

    fn parse_number(&mut self) -> Result<NodeId, DocumentError> {
        let start = self.pos;
        let (line, column) = self.here();
        let mut is_float = false;

        if self.peek() == Some(b'-') {
            self.advance();
        }
        if !matches!(self.peek(), Some(b'0'..=b'9')) {
            return Err(DocumentError::InvalidNumber { line, column });
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.advance();
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(DocumentError::InvalidNumber { line, column });
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.advance();
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(DocumentError::InvalidNumber { line, column });
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }

        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| DocumentError::InvalidNumber { line, column })?;
        let number = if is_float {
            let parsed: f64 = text
                .parse()
                .map_err(|_| DocumentError::InvalidNumber { line, column })?;
            Number::from_f64(parsed).ok_or(DocumentError::InvalidNumber { line, column })?
        } else if let Ok(value) = text.parse::<i64>() {
            Number::from(value)
        } else if let Ok(value) = text.parse::<u64>() {
            Number::from(value)
        } else {
            // Integer literal outside the 64-bit range
            let parsed: f64 = text
                .parse()
                .map_err(|_| DocumentError::InvalidNumber { line, column })?;
            Number::from_f64(parsed).ok_or(DocumentError::InvalidNumber { line, column })?
        };

        let span = Span {
            start,
            end: self.pos,
            line,
            column,
        };
        Ok(self.push_node(NodeValue::Number(number), span))
    }

    fn parse_string_literal(&mut self) -> Result<String, DocumentError> {
        let (line, column) = self.here();
        self.advance(); // opening quote
        let mut text = String::new();

        loop {
            match self.advance() {
                None => return Err(DocumentError::UnterminatedString { line, column }),
                Some(b'"') => return Ok(text),
                Some(b'\\') => {
                    let (esc_line, esc_column) = self.here();
                    match self.advance() {
                        Some(b'"') => text.push('"'),
                        Some(b'\\') => text.push('\\'),
                        Some(b'/') => text.push('/'),
                        Some(b'b') => text.push('\u{0008}'),
                        Some(b'f') => text.push('\u{000C}'),
                        Some(b'n') => text.push('\n'),
                        Some(b'r') => text.push('\r'),
                        Some(b't') => text.push('\t'),
                        Some(b'u') => {
                            let ch = self.parse_unicode_escape(esc_line, esc_column)?;
                            text.push(ch);
                        }
                        _ => {
                            return Err(DocumentError::InvalidEscape {
                                line: esc_line,
                                column: esc_column,
                            })
                        }
                    }
                }
                Some(byte) if byte < 0x20 => {
                    return Err(DocumentError::UnterminatedString { line, column });
                }
                Some(byte) => {
                    // Re-assemble multi-byte UTF-8 sequences byte-wise; the
                    // input is valid UTF-8 because it came from a &str.
                    if byte.is_ascii() {
                        text.push(byte as char);
                    } else {
                        let start = self.pos - 1;
                        let width = utf8_width(byte);
                        for _ in 1..width {
                            self.advance();
                        }
                        let chunk = std::str::from_utf8(&self.bytes[start..self.pos])
                            .map_err(|_| DocumentError::UnterminatedString { line, column })?;
                        text.push_str(chunk);
                    }
                }
            }
        }
    }

    fn parse_unicode_escape(&mut self, line: u32, column: u32) -> Result<char, DocumentError> {
        let high = self.parse_hex4(line, column)?;
        if (0xD800..0xDC00).contains(&high) {
            // Surrogate pair: expect a \uXXXX low surrogate next.
            if self.advance() != Some(b'\\') || self.advance() != Some(b'u') {
                return Err(DocumentError::InvalidEscape { line, column });
            }
            let low = self.parse_hex4(line, column)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(DocumentError::InvalidEscape { line, column });
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            char::from_u32(code).ok_or(DocumentError::InvalidEscape { line, column })
        } else {
            char::from_u32(high).ok_or(DocumentError::InvalidEscape { line, column })
        }
    }

    fn parse_hex4(&mut self, line: u32, column: u32) -> Result<u32, DocumentError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let byte = self
                .advance()
                .ok_or(DocumentError::InvalidEscape { line, column })?;
            let digit = (byte as char)
                .to_digit(16)
                .ok_or(DocumentError::InvalidEscape { line, column })?;
            value = value * 16 + digit;
        }
        Ok(value)
    }
}

fn utf8_width(first_byte: u8) -> usize {
    match first_byte {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(src: &str) -> Document {
        Document::parse(src).expect("document should parse")
    }

    #[test]
    fn test_scalars() {
        let doc = parse(r#"{"a": 1, "b": -2.5, "c": true, "d": null, "e": "text"}"#);
        assert_eq!(
            doc.to_value(doc.root()),
            json!({"a": 1, "b": -2.5, "c": true, "d": null, "e": "text"})
        );
    }

    #[test]
    fn test_integers_stay_integers() {
        let doc = parse(r#"[0, 1, 12]"#);
        assert_eq!(doc.to_value(doc.root()), json!([0, 1, 12]));
    }

    #[test]
    fn test_member_order_preserved() {
        let doc = parse(r#"{"z": 1, "a": 2, "m": 3}"#);
        let NodeValue::Object(members) = &doc.node(doc.root()).value else {
            panic!("root should be an object");
        };
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }

    #[test]
    fn test_nested_lookup() {
        let doc = parse(r##"{"color": {"red": {"$value": "#ff0000"}}}"##);
        let color = doc.member(doc.root(), "color").unwrap();
        let red = doc.member(color, "red").unwrap();
        assert!(doc.has_member(red, "$value"));
        assert!(!doc.has_member(red, "$type"));
    }

    #[test]
    fn test_spans_point_at_source() {
        let src = "{\n  \"a\": \"x\"\n}";
        let doc = parse(src);
        let a = doc.member(doc.root(), "a").unwrap();
        let span = doc.span(a);
        assert_eq!(&src[span.start..span.end], "\"x\"");
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 8);
    }

    #[test]
    fn test_string_escapes() {
        let doc = parse(r#"{"s": "a\"b\\c\ndA😀"}"#);
        let s = doc.member(doc.root(), "s").unwrap();
        match &doc.node(s).value {
            NodeValue::String(text) => assert_eq!(text, "a\"b\\c\ndA😀"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn test_unicode_passthrough() {
        let doc = parse(r#"{"größe": "äöü"}"#);
        assert_eq!(doc.to_value(doc.root()), json!({"größe": "äöü"}));
    }

    #[test]
    fn test_empty_containers() {
        let doc = parse(r#"{"a": {}, "b": []}"#);
        assert_eq!(doc.to_value(doc.root()), json!({"a": {}, "b": []}));
    }

    #[test]
    fn test_trailing_garbage_is_fatal() {
        assert!(matches!(
            Document::parse("{} extra"),
            Err(DocumentError::TrailingCharacters { .. })
        ));
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        assert!(matches!(
            Document::parse(r#"{"a": "unclosed}"#),
            Err(DocumentError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn test_bad_literal_is_fatal() {
        assert!(matches!(
            Document::parse(r#"{"a": truthy}"#),
            Err(DocumentError::UnexpectedCharacter { .. })
        ));
    }

    #[test]
    fn test_missing_colon_is_fatal() {
        assert!(Document::parse(r#"{"a" 1}"#).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut src = String::new();
        for _ in 0..(MAX_DEPTH + 2) {
            src.push('[');
        }
        assert!(matches!(
            Document::parse(&src),
            Err(DocumentError::DepthExceeded)
        ));
    }

    #[test]
    fn test_source_wraps_document() {
        let source = Source::parse("tokens.json", r#"{"a": {"$value": 1}}"#).unwrap();
        assert_eq!(source.filename, "tokens.json");
        assert!(source.document.member(source.document.root(), "a").is_some());
    }

    #[test]
    fn test_number_errors() {
        assert!(matches!(
            Document::parse("[1.]"),
            Err(DocumentError::InvalidNumber { .. })
        ));
        assert!(matches!(
            Document::parse("[-]"),
            Err(DocumentError::InvalidNumber { .. })
        ));
        assert!(matches!(
            Document::parse("[1e]"),
            Err(DocumentError::InvalidNumber { .. })
        ));
    }
}
