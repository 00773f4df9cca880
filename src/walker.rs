use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::compile::output::remove_path;
use crate::error::{BuildError, Result, io_err};
use crate::watcher::event::BuildEvent;
use crate::watcher::incremental::{EventReconciler, HandleOutcome};

/// Counters reported after the initial build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub directories: usize,
    pub compiled: usize,
    pub stubbed: usize,
    pub copied: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl BuildStats {
    /// Files that produced an output, stubs included.
    pub fn files(&self) -> usize {
        self.compiled + self.stubbed + self.copied
    }

    fn record(&mut self, outcome: HandleOutcome) {
        match outcome {
            HandleOutcome::Compiled => self.compiled += 1,
            HandleOutcome::Stubbed => self.stubbed += 1,
            HandleOutcome::Copied => self.copied += 1,
            HandleOutcome::DirCreated => self.directories += 1,
            HandleOutcome::Ignored => self.ignored += 1,
            HandleOutcome::Rejected | HandleOutcome::Failed => self.failed += 1,
            HandleOutcome::Removed | HandleOutcome::DirRemoved => {}
        }
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s) in {} dir(s): {} compiled, {} copied, {} failed to compile, {} ignored",
            self.files(),
            self.directories,
            self.compiled,
            self.copied,
            self.stubbed,
            self.ignored,
        )?;
        if self.failed > 0 {
            write!(f, ", {} error(s)", self.failed)?;
        }
        Ok(())
    }
}

/// Rebuilds the whole output tree from the source tree.
pub struct InitialBuildRunner {
    reconciler: Arc<EventReconciler>,
}

impl InitialBuildRunner {
    pub fn new(reconciler: Arc<EventReconciler>) -> Self {
        Self { reconciler }
    }

    /// Clear the output root and the dependency index, then replay every
    /// entry under the source root as an `AddDir`/`Add` event.
    pub async fn run(&self) -> Result<BuildStats> {
        let mapper = self.reconciler.unit().mapper();
        let source_root = mapper.source_root().to_path_buf();
        let output_root = mapper.output_root().to_path_buf();

        if source_root.starts_with(&output_root) {
            return Err(BuildError::Config(format!(
                "source root {} lies inside output root {}",
                source_root.display(),
                output_root.display()
            )));
        }

        remove_path(&output_root).await?;
        tokio::fs::create_dir_all(&output_root)
            .await
            .map_err(|e| io_err(&output_root, e))?;
        self.reconciler.index().write().await.clear();

        let mut stats = BuildStats::default();
        let mut entries = walk_source_tree(source_root);
        while let Some(event) = entries.recv().await {
            let outcome = self.reconciler.handle(&event, true).await;
            stats.record(outcome);
        }

        tracing::debug!(
            "initial build indexed {} dependency key(s)",
            self.reconciler.index().read().await.len()
        );
        Ok(stats)
    }
}

/// Walk `root` on a blocking thread, streaming one event per entry in
/// parent-before-child order. The root itself is not reported.
///
/// No standard filters apply: hidden and gitignored files all reach the
/// ignore matcher. Symlinks are classified by their target and not followed.
fn walk_source_tree(root: PathBuf) -> mpsc::Receiver<BuildEvent> {
    let (tx, rx) = mpsc::channel(256);

    tokio::task::spawn_blocking(move || {
        let walker = ignore::WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(false)
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!("walk: {err}");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path().to_path_buf();
            let is_dir = match entry.file_type() {
                Some(ft) if ft.is_symlink() => match std::fs::metadata(&path) {
                    Ok(meta) => meta.is_dir(),
                    Err(err) => {
                        tracing::warn!("skipping dangling link {}: {err}", path.display());
                        continue;
                    }
                },
                Some(ft) => ft.is_dir(),
                None => false,
            };

            let event = if is_dir {
                BuildEvent::AddDir(path)
            } else {
                BuildEvent::Add(path)
            };
            if tx.blocking_send(event).is_err() {
                return;
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::RwLock;

    use tempfile::TempDir;

    use crate::compile::CompileUnit;
    use crate::deps::DependencyIndex;
    use crate::ignore_rules::IgnoreMatcher;
    use crate::paths::{PathMapper, RelPath};
    use crate::transform::PassthroughTransformer;

    fn runner(src: &std::path::Path, dist: &std::path::Path, ignore: IgnoreMatcher) -> InitialBuildRunner {
        let index = Arc::new(RwLock::new(DependencyIndex::new()));
        let unit = CompileUnit::new(
            PathMapper::new(src, dist),
            Arc::new(PassthroughTransformer),
            Arc::clone(&index),
            &["js".to_string()],
            true,
            false,
        );
        InitialBuildRunner::new(Arc::new(EventReconciler::new(ignore, unit, index)))
    }

    #[tokio::test]
    async fn test_bootstrap_mirrors_the_source_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dist = dir.path().join("dist");
        std::fs::create_dir_all(src.join("lib/empty")).unwrap();
        std::fs::write(src.join("index.js"), "require('./lib/a');\n").unwrap();
        std::fs::write(src.join("lib/a.js"), "// @compileDependencies(['../data.json'])\nload();\n").unwrap();
        std::fs::write(src.join("lib/broken.js"), "let = ;\n").unwrap();
        std::fs::write(src.join("data.json"), "{\"a\": 1}").unwrap();
        std::fs::write(src.join(".env"), "SECRET=1").unwrap();

        // Stale output from a previous run is cleared.
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join("stale.js"), "old").unwrap();

        let runner = runner(&src, &dist, IgnoreMatcher::new(true, &["**/.goutputstream-*"]).unwrap());
        let stats = runner.run().await.unwrap();

        assert_eq!(stats.compiled, 2);
        assert_eq!(stats.stubbed, 1);
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.directories, 2);
        assert_eq!(stats.files(), 4);

        assert!(!dist.join("stale.js").exists());
        assert!(!dist.join(".env").exists());
        assert!(dist.join("lib/empty").is_dir());
        assert_eq!(std::fs::read(dist.join("data.json")).unwrap(), b"{\"a\": 1}");
        assert!(std::fs::read_to_string(dist.join("index.js")).unwrap().starts_with("require('./lib/a');"));
        assert!(std::fs::read_to_string(dist.join("lib/broken.js")).unwrap().contains("throw error;"));

        let index = runner.reconciler.index().read().await;
        let dependents = index.lookup_dependents(&RelPath::parse("data.json").unwrap());
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].0, RelPath::parse("lib/a.js").unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_does_not_cascade() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("a.js"), "a();\n").unwrap();
        std::fs::write(src.join("b.js"), "// @compileDependencies(['./a.js'])\nb();\n").unwrap();

        let stats = runner(&src, &dir.path().join("dist"), IgnoreMatcher::default())
            .run()
            .await
            .unwrap();
        assert_eq!(stats.compiled, 2, "each file is compiled exactly once");
    }

    #[tokio::test]
    async fn test_output_enclosing_source_is_refused() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("keep.js"), "keep();\n").unwrap();

        let err = runner(&src, dir.path(), IgnoreMatcher::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
        assert!(src.join("keep.js").exists());
    }

    #[test]
    fn test_stats_display() {
        let stats = BuildStats {
            directories: 1,
            compiled: 2,
            stubbed: 1,
            copied: 3,
            ignored: 0,
            failed: 0,
        };
        assert_eq!(
            stats.to_string(),
            "6 file(s) in 1 dir(s): 2 compiled, 3 copied, 1 failed to compile, 0 ignored"
        );
    }
}
