use std::path::Path;

use super::{SourceMap, TransformError, TransformOutput, Transformer};
use crate::parser::{code_frame, first_syntax_error, parse_source};

/// Emits the source unchanged once it parses cleanly.
///
/// Syntax errors are reported with a code frame, so the pass-through still
/// exercises the full error-stub path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformer;

impl Transformer for PassthroughTransformer {
    fn transform(&self, path: &Path, source: &str) -> Result<TransformOutput, TransformError> {
        let tree = parse_source(path, source)?;

        if let Some(diag) = first_syntax_error(&tree, source.as_bytes()) {
            return Err(TransformError::Syntax {
                frame: code_frame(source, diag.line, diag.column),
                message: diag.message,
                line: diag.line,
                column: diag.column,
            });
        }

        Ok(TransformOutput {
            code: source.to_string(),
            source_map: Some(SourceMap::identity(source)),
            tree,
        })
    }
}
