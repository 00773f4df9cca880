pub mod languages;

use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use crate::transform::TransformError;

use languages::language_for_extension;

/// Location and description of the first syntax error in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    pub message: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

/// Parse a source file into a tree-sitter tree, picking the grammar from the
/// file extension.
///
/// Allocates a fresh `Parser` on every call; compiles are driven one file at a
/// time by watcher events, so the overhead is negligible.
///
/// # Errors
/// - [`TransformError::UnsupportedExtension`] when no grammar matches
/// - [`TransformError::Parse`] when tree-sitter refuses the grammar or input
pub fn parse_source(path: &Path, source: &str) -> Result<Tree, TransformError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let language = language_for_extension(ext).ok_or_else(|| TransformError::UnsupportedExtension {
        extension: ext.to_string(),
    })?;

    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| TransformError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| TransformError::Parse {
            path: path.display().to_string(),
            reason: "parser returned no tree".to_string(),
        })
}

/// The first ERROR or MISSING node in document order, if any.
pub fn first_syntax_error(tree: &Tree, source: &[u8]) -> Option<SyntaxDiagnostic> {
    if !tree.root_node().has_error() {
        return None;
    }
    let node = find_error(tree.root_node())?;
    let pos = node.start_position();

    let message = if node.is_missing() {
        format!("Missing {}", describe_kind(node.kind()))
    } else {
        let text = node.utf8_text(source).unwrap_or("");
        match text.chars().next() {
            Some(c) => format!("Unexpected token {c:?}"),
            None => "Unexpected end of input".to_string(),
        }
    };

    Some(SyntaxDiagnostic {
        message,
        line: pos.row + 1,
        column: pos.column + 1,
    })
}

fn find_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find_map(find_error);
    found
}

fn describe_kind(kind: &str) -> String {
    if kind.chars().all(|c| c.is_alphanumeric() || c == '_') {
        kind.replace('_', " ")
    } else {
        format!("{kind:?}")
    }
}

/// A short excerpt of `source` around `line` with a caret under `column`.
pub fn code_frame(source: &str, line: usize, column: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || lines.is_empty() {
        return String::new();
    }
    // Errors at end of input point one line past the last one.
    let line = line.min(lines.len());
    let first = line.saturating_sub(2).max(1);
    let last = (line + 1).min(lines.len());
    let width = last.to_string().len();

    let mut out = String::new();
    for n in first..=last {
        let text = lines.get(n - 1).copied().unwrap_or("");
        let marker = if n == line { ">" } else { " " };
        out.push_str(&format!("{marker} {n:>width$} | {text}\n"));
        if n == line {
            let pad = " ".repeat(column.saturating_sub(1));
            out.push_str(&format!("  {:>width$} | {pad}^\n", ""));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_js_has_no_error() {
        let src = "const a = require('./a');\nconsole.log(a);\n";
        let tree = parse_source(Path::new("x.js"), src).unwrap();
        assert!(first_syntax_error(&tree, src.as_bytes()).is_none());
    }

    #[test]
    fn test_syntax_error_location() {
        let src = "const a = 1;\nconst = 2;\n";
        let tree = parse_source(Path::new("x.js"), src).unwrap();
        let diag = first_syntax_error(&tree, src.as_bytes()).expect("should report an error");
        assert_eq!(diag.line, 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_source(Path::new("view.ejs"), "<%= x %>").unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedExtension { ref extension } if extension == "ejs"));
    }

    #[test]
    fn test_typescript_uses_typescript_grammar() {
        let src = "let n: number = <number>value;\n";
        let tree = parse_source(Path::new("x.ts"), src).unwrap();
        assert!(first_syntax_error(&tree, src.as_bytes()).is_none());
    }

    #[test]
    fn test_code_frame_marks_line_and_column() {
        let frame = code_frame("a\nbcd\ne\n", 2, 3);
        assert!(frame.contains("> 2 | bcd"), "frame was:\n{frame}");
        assert!(frame.contains("|   ^"), "frame was:\n{frame}");
        assert!(frame.contains("  1 | a"));
        assert!(frame.contains("  3 | e"));
    }
}
