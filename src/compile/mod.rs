//! Per-file actions on the output tree: compile, copy, remove, mkdir.
//!
//! ## Compile protocol
//!
//! 1. Read the source and run the [`Transformer`] on a blocking thread.
//! 2. Success: extract `@compileDependencies` declarations from the source
//!    tree and replace the file's entries in the [`DependencyIndex`]; write the
//!    code atomically, plus a sidecar `.map` when source maps are enabled.
//! 3. Failure: write an error stub in place of the output (see [`stub`]);
//!    the file's index entries are left as they were.
//! 4. Either way, copy the source permission bits onto the output.

pub mod output;
pub mod stub;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::deps::annotations::extract_declarations;
use crate::deps::{DependencyDeclaration, DependencyIndex};
use crate::error::{Result, io_err};
use crate::paths::{PathMapper, RelPath, relative_between};
use crate::transform::{SourceMap, TransformError, Transformer};

use output::{copy_permissions, file_name_of, parent_of, remove_path, slash_path, write_atomic, write_plain};
use stub::{ErrorReport, render_stub, stub_map};

/// What a single transform produced, before anything is written.
pub enum CompileResult {
    Success {
        code: String,
        source_map: Option<SourceMap>,
        declarations: Vec<DependencyDeclaration>,
    },
    Failure {
        stub_code: String,
        stub_map: Option<SourceMap>,
        error: TransformError,
    },
}

/// Outcome of [`CompileUnit::compile`] once the output is on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled { declarations: usize },
    Stubbed,
}

/// Run the transformer over `source` and shape the result.
///
/// Pure apart from the transformer itself; the tree never leaves this call.
pub fn compile_source(
    transformer: &dyn Transformer,
    source_path: &Path,
    rel: &RelPath,
    source: &str,
) -> CompileResult {
    match transformer.transform(source_path, source) {
        Ok(out) => CompileResult::Success {
            declarations: extract_declarations(&out.tree, source.as_bytes(), rel),
            code: out.code,
            source_map: out.source_map,
        },
        Err(error) => {
            let report = ErrorReport::from_error(&error, source_path);
            CompileResult::Failure {
                stub_code: render_stub(&report),
                stub_map: stub_map(&report),
                error,
            }
        }
    }
}

pub struct CompileUnit {
    mapper: PathMapper,
    transformer: Arc<dyn Transformer>,
    index: Arc<RwLock<DependencyIndex>>,
    compile_extensions: HashSet<String>,
    source_maps: bool,
    verbose: bool,
}

impl CompileUnit {
    pub fn new(
        mapper: PathMapper,
        transformer: Arc<dyn Transformer>,
        index: Arc<RwLock<DependencyIndex>>,
        compile_extensions: &[String],
        source_maps: bool,
        verbose: bool,
    ) -> Self {
        Self {
            mapper,
            transformer,
            index,
            compile_extensions: compile_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            source_maps,
            verbose,
        }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Whether `rel` is transformed rather than copied.
    pub fn is_compiled(&self, rel: &RelPath) -> bool {
        rel.extension()
            .is_some_and(|ext| self.compile_extensions.contains(ext))
    }

    pub async fn compile(&self, rel: &RelPath) -> Result<CompileOutcome> {
        let src = self.mapper.to_source(rel);
        let out = self.mapper.to_output(rel);

        // Decoded lossily: invalid UTF-8 must still produce an output.
        let bytes = tokio::fs::read(&src).await.map_err(|e| io_err(&src, e))?;
        let source = String::from_utf8_lossy(&bytes).into_owned();

        let transformer = Arc::clone(&self.transformer);
        let (src_path, rel_owned) = (src.clone(), rel.clone());
        let result = tokio::task::spawn_blocking(move || {
            compile_source(transformer.as_ref(), &src_path, &rel_owned, &source)
        })
        .await?;

        let outcome = match result {
            CompileResult::Success {
                code,
                source_map,
                declarations,
            } => {
                self.index
                    .write()
                    .await
                    .replace_declarations(rel, &declarations);
                self.write_output(rel, &src, &out, code, source_map).await?;
                if self.verbose {
                    tracing::info!("{} -> {}", src.display(), out.display());
                }
                CompileOutcome::Compiled {
                    declarations: declarations.len(),
                }
            }
            CompileResult::Failure {
                stub_code,
                stub_map,
                error,
            } => {
                tracing::warn!("failed to compile {}: {error}", src.display());
                self.write_output(rel, &src, &out, stub_code, stub_map).await?;
                CompileOutcome::Stubbed
            }
        };

        copy_permissions(&src, &out).await?;
        Ok(outcome)
    }

    async fn write_output(
        &self,
        rel: &RelPath,
        src: &Path,
        out: &Path,
        mut code: String,
        map: Option<SourceMap>,
    ) -> Result<()> {
        let map_path = self.mapper.to_output_map(rel);

        match map.filter(|_| self.source_maps) {
            Some(map) => {
                let map_name = file_name_of(&map_path);
                let sources = slash_path(&relative_between(&parent_of(out), src));
                let json = map.with_files(file_name_of(out), sources).to_json()?;
                if !code.ends_with('\n') {
                    code.push('\n');
                }
                code.push_str(&format!("//# sourceMappingURL={map_name}\n"));
                write_atomic(out, code.into_bytes()).await?;
                write_plain(&map_path, json).await?;
            }
            None => {
                write_atomic(out, code.into_bytes()).await?;
                if self.source_maps {
                    remove_path(&map_path).await?;
                }
            }
        }
        Ok(())
    }

    /// Byte-for-byte copy, permission bits included.
    pub async fn copy(&self, rel: &RelPath) -> Result<()> {
        let src = self.mapper.to_source(rel);
        let out = self.mapper.to_output(rel);
        let parent = parent_of(&out);
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| io_err(&parent, e))?;
        tokio::fs::copy(&src, &out)
            .await
            .map_err(|e| io_err(&src, e))?;
        if self.verbose {
            tracing::info!("{} -> {}", src.display(), out.display());
        }
        Ok(())
    }

    /// Remove the output for a deleted source file, and its map.
    ///
    /// Does nothing if the source exists again by the time this runs: an
    /// atomic save can deliver its unlink after the add that replaced it.
    pub async fn remove_file(&self, rel: &RelPath) -> Result<()> {
        if self.source_exists(rel).await {
            tracing::debug!("{rel} reappeared, keeping its output");
            return Ok(());
        }
        let out = self.mapper.to_output(rel);
        let removed = remove_path(&out).await?;
        if self.is_compiled(rel) {
            remove_path(&self.mapper.to_output_map(rel)).await?;
        }
        if removed && self.verbose {
            tracing::info!("{} x", out.display());
        }
        Ok(())
    }

    /// Remove the output subtree for a deleted source directory.
    pub async fn remove_dir(&self, rel: &RelPath) -> Result<()> {
        if self.source_exists(rel).await {
            tracing::debug!("{rel} reappeared, keeping its output");
            return Ok(());
        }
        let out = self.mapper.to_output(rel);
        if remove_path(&out).await? && self.verbose {
            tracing::info!("{} x", out.display());
        }
        Ok(())
    }

    async fn source_exists(&self, rel: &RelPath) -> bool {
        tokio::fs::symlink_metadata(self.mapper.to_source(rel))
            .await
            .is_ok()
    }

    pub async fn ensure_dir(&self, rel: &RelPath) -> Result<()> {
        let out = self.mapper.to_output(rel);
        tokio::fs::create_dir_all(&out)
            .await
            .map_err(|e| io_err(&out, e))?;
        if self.verbose {
            tracing::debug!("{} +", out.display());
        }
        Ok(())
    }
}
