use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use tree_sitter::{Node, Tree};

use super::{DependencyDeclaration, EventFilter};
use crate::paths::RelPath;

/// Marker that opens a dependency annotation inside a comment.
pub const SENTINEL: &str = "@compileDependencies";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The JSON5 value between the sentinel's parentheses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeclarationPayload {
    /// `["./a.js", "./views/"]`: each entry with the default filter.
    List(Vec<String>),
    /// `{"./a.js": {change: false}}`
    Map(BTreeMap<String, EventFilter>),
}

impl DeclarationPayload {
    fn into_entries(self) -> Vec<(String, EventFilter)> {
        match self {
            Self::List(paths) => paths
                .into_iter()
                .map(|p| (p, EventFilter::default()))
                .collect(),
            Self::Map(map) => map.into_iter().collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("missing closing parenthesis in {payload:?}")]
    Unterminated { payload: String },

    #[error("invalid payload {payload:?}: {source}")]
    Payload {
        payload: String,
        #[source]
        source: json5::Error,
    },
}

/// Parse the raw text of one comment node.
///
/// Returns `Ok(None)` for comments that are not annotations at all.
pub fn parse_comment(raw: &str) -> Result<Option<DeclarationPayload>, AnnotationError> {
    let body = strip_delimiters(raw).trim();
    let body = body.strip_prefix('!').unwrap_or(body).trim_start();

    let Some(rest) = body.strip_prefix(SENTINEL) else {
        return Ok(None);
    };
    let Some(rest) = rest.trim_start().strip_prefix('(') else {
        return Ok(None);
    };

    let Some(end) = payload_end(rest) else {
        return Err(AnnotationError::Unterminated {
            payload: rest.to_string(),
        });
    };
    let payload = &rest[..end];

    json5::from_str::<DeclarationPayload>(payload)
        .map(Some)
        .map_err(|source| AnnotationError::Payload {
            payload: payload.to_string(),
            source,
        })
}

/// Byte index of the `)` closing the sentinel's `(`, given the text after it.
/// Brackets nest and quoted strings are skipped, so text after the payload
/// may contain parentheses of its own.
fn payload_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

fn strip_delimiters(raw: &str) -> &str {
    if let Some(line) = raw.strip_prefix("//") {
        return line;
    }
    raw.strip_prefix("/*")
        .and_then(|b| b.strip_suffix("*/"))
        .unwrap_or(raw)
}

// ---------------------------------------------------------------------------
// Tree scan
// ---------------------------------------------------------------------------

/// Extract every dependency declared by the file at `dependent`.
///
/// Malformed payloads and paths that climb out of the source root are
/// logged and skipped; they never fail the compile.
pub fn extract_declarations(tree: &Tree, source: &[u8], dependent: &RelPath) -> Vec<DependencyDeclaration> {
    let mut out = Vec::new();

    for comment in collect_comments(tree) {
        if !is_attached_to_call(comment) {
            continue;
        }
        let text = comment.utf8_text(source).unwrap_or("");
        let payload = match parse_comment(text) {
            Ok(Some(p)) => p,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(
                    "{}:{}: skipping dependency annotation: {err}",
                    dependent,
                    comment.start_position().row + 1
                );
                continue;
            }
        };

        for (raw, filter) in payload.into_entries() {
            match dependent.resolve(&raw) {
                Ok(dependency) => out.push(DependencyDeclaration {
                    dependency,
                    dependent: dependent.clone(),
                    filter,
                }),
                Err(err) => tracing::warn!("{dependent}: skipping dependency {raw:?}: {err}"),
            }
        }
    }

    out
}

/// Pre-order list of every `comment` node in the tree.
fn collect_comments(tree: &Tree) -> Vec<Node<'_>> {
    let mut comments = Vec::new();
    let mut cursor = tree.walk();

    'walk: loop {
        let node = cursor.node();
        if node.kind() == "comment" {
            comments.push(node);
        }
        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }

    comments
}

/// A comment belongs to a call when it sits inside the call's argument list,
/// directly precedes a call-bearing node, or trails one on the same line.
fn is_attached_to_call(comment: Node) -> bool {
    if let Some(parent) = comment.parent()
        && matches!(parent.kind(), "arguments" | "call_expression")
    {
        return true;
    }

    let mut next = comment.next_sibling();
    while let Some(n) = next.filter(|n| n.kind() == "comment") {
        next = n.next_sibling();
    }
    if next.is_some_and(reaches_call) {
        return true;
    }

    let mut prev = comment.prev_sibling();
    while let Some(p) = prev.filter(|p| p.kind() == "comment") {
        prev = p.prev_sibling();
    }
    prev.is_some_and(|p| p.end_position().row == comment.start_position().row && reaches_call(p))
}

/// Whether `node` is a call expression or a statement wrapping one
/// (`foo()`, `await foo()`, `const x = foo()`, `x = foo()`).
fn reaches_call(node: Node) -> bool {
    match node.kind() {
        "call_expression" => true,
        "expression_statement" | "parenthesized_expression" | "await_expression" => {
            node.named_child(0).is_some_and(reaches_call)
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "variable_declarator" && reaches_call(c));
            found
        }
        "variable_declarator" => node.child_by_field_name("value").is_some_and(reaches_call),
        "assignment_expression" => node.child_by_field_name("right").is_some_and(reaches_call),
        "export_statement" => node
            .child_by_field_name("declaration")
            .or_else(|| node.child_by_field_name("value"))
            .is_some_and(reaches_call),
        _ => false,
    }
}
