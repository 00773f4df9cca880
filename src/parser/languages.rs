use tree_sitter::Language;

/// Grammar for a source extension, or `None` when there is none.
///
/// `ts` and `tsx` need separate grammars: plain TypeScript rejects JSX, and
/// TSX rejects `<T>expr` type assertions. The JavaScript grammar covers JSX.
pub fn language_for_extension(ext: &str) -> Option<Language> {
    match ext {
        "ts" | "mts" | "cts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions_have_grammars() {
        for ext in ["js", "jsx", "mjs", "cjs", "ts", "tsx"] {
            assert!(language_for_extension(ext).is_some(), "{ext} should have a grammar");
        }
        assert!(language_for_extension("ejs").is_none());
        assert!(language_for_extension("").is_none());
    }
}
