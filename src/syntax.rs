//! Python front-end
//!
//! Thin wrapper over tree-sitter: parsing, source positions and the small
//! text helpers the analyzer needs. The grammar itself lives in the
//! `tree-sitter-python` crate; everything downstream consumes `Node`s.

use tree_sitter::{Language, Node, Parser, Tree};

use crate::{Error, Result};

/// A single-line source span for a name occurrence.
///
/// Lines and columns are zero-indexed; `end_col` is exclusive. Identifier
/// tokens never span lines, which keeps ranges single-line like the LSIF
/// ranges we emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceSpan {
    pub line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl SourceSpan {
    pub fn of(node: Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            line: start.row as u32,
            start_col: start.column as u32,
            end_col: if end.row == start.row {
                end.column as u32
            } else {
                // Multi-line node: clamp to the first line.
                u32::MAX
            },
        }
    }
}

/// The Python grammar.
pub fn language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

/// Parse Python source into a concrete syntax tree.
pub fn parse(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&language())
        .map_err(|e| Error::Parse(format!("failed to load Python grammar: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| Error::Parse("tree-sitter produced no tree".to_string()))
}

/// Get the UTF-8 text of a node, or an empty string if the range is
/// malformed.
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Extract the docstring of a function or class body, if the first
/// statement is a bare string literal.
pub fn docstring(body: Node, source: &str) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = node_text(expr, source);
    Some(strip_string_quotes(raw).to_string())
}

/// Strip quote delimiters (and any string prefix) from a Python string
/// literal's source text.
fn strip_string_quotes(raw: &str) -> &str {
    let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.starts_with(quote) {
            return body
                .strip_prefix(quote)
                .and_then(|s| s.strip_suffix(quote))
                .unwrap_or(body)
                .trim();
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_module() {
        let tree = parse("x = 1\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_span_of_identifier() {
        let source = "value = 1\n";
        let tree = parse(source).unwrap();
        let assign = tree.root_node().named_child(0).unwrap().named_child(0).unwrap();
        let target = assign.child_by_field_name("left").unwrap();
        assert_eq!(node_text(target, source), "value");
        assert_eq!(
            SourceSpan::of(target),
            SourceSpan { line: 0, start_col: 0, end_col: 5 }
        );
    }

    #[test]
    fn test_docstring_extraction() {
        let source = "def f():\n    \"\"\"Docs here.\"\"\"\n    pass\n";
        let tree = parse(source).unwrap();
        let func = tree.root_node().named_child(0).unwrap();
        let body = func.child_by_field_name("body").unwrap();
        assert_eq!(docstring(body, source).as_deref(), Some("Docs here."));
    }

    #[test]
    fn test_docstring_absent_for_code_first() {
        let source = "def f():\n    x = 1\n";
        let tree = parse(source).unwrap();
        let func = tree.root_node().named_child(0).unwrap();
        let body = func.child_by_field_name("body").unwrap();
        assert_eq!(docstring(body, source), None);
    }

    #[test]
    fn test_strip_prefixed_string() {
        assert_eq!(strip_string_quotes("r'raw'"), "raw");
        assert_eq!(strip_string_quotes("'''tri'''"), "tri");
    }
}
