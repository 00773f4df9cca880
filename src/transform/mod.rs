//! The source-to-output transform seam.
//!
//! The build engine only needs three things from a transform: the output
//! code, an optional source map, and the syntax tree of the *source* (for
//! annotation extraction). Anything that can provide those implements
//! [`Transformer`].

pub mod command;
pub mod passthrough;
pub mod sourcemap;

use std::path::Path;

use thiserror::Error;
use tree_sitter::Tree;

pub use command::CommandTransformer;
pub use passthrough::PassthroughTransformer;
pub use sourcemap::SourceMap;

/// A successful transform.
#[derive(Debug)]
pub struct TransformOutput {
    pub code: String,
    pub source_map: Option<SourceMap>,
    /// Syntax tree of the input source.
    pub tree: Tree,
}

/// Why a file could not be transformed. Rendered into the error stub.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{message} ({line}:{column})\n\n{frame}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
        frame: String,
    },

    #[error("transform command `{program}` exited with {status}\n{stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("failed to run transform command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no grammar for extension {extension:?}")]
    UnsupportedExtension { extension: String },

    #[error("could not parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl TransformError {
    /// Constructor name used when the stub rethrows this error.
    pub fn name(&self) -> &'static str {
        match self {
            TransformError::Syntax { .. } => "SyntaxError",
            _ => "TransformError",
        }
    }

    /// 1-based source position, when the error has one.
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            TransformError::Syntax { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

/// Turns one source file into output code.
///
/// Implementations are synchronous; the compile unit calls them on a
/// blocking worker thread.
pub trait Transformer: Send + Sync {
    fn transform(&self, path: &Path, source: &str) -> Result<TransformOutput, TransformError>;
}

/// The transformer selected by configuration: an external command when one
/// is configured, otherwise the syntax-checking pass-through.
pub fn from_command(command: Option<&[String]>) -> Box<dyn Transformer> {
    match command {
        Some([program, args @ ..]) => Box::new(CommandTransformer::new(program.clone(), args.to_vec())),
        _ => Box::new(PassthroughTransformer),
    }
}
