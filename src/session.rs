//! Wires the components together for one run of the tool.

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::sync::{RwLock, watch};

use crate::compile::CompileUnit;
use crate::config::BuildConfig;
use crate::deps::DependencyIndex;
use crate::ignore_rules::IgnoreMatcher;
use crate::paths::PathMapper;
use crate::supervisor::Supervisor;
use crate::transform::{self, Transformer};
use crate::walker::{BuildStats, InitialBuildRunner};
use crate::watcher::incremental::EventReconciler;
use crate::watcher::start_watcher;

/// Build the output tree, then (unless `once`) keep it in sync with the
/// source tree and run the entry points until Ctrl-C.
///
/// The watcher is armed before the initial build so edits made while it runs
/// are queued and replayed afterwards.
pub async fn run(config: BuildConfig, once: bool) -> anyhow::Result<BuildStats> {
    let source_root = config
        .source_root
        .canonicalize()
        .with_context(|| format!("source directory {} not found", config.source_root.display()))?;
    tokio::fs::create_dir_all(&config.output_root)
        .await
        .with_context(|| format!("failed to create {}", config.output_root.display()))?;
    let output_root = config.output_root.canonicalize()?;

    if output_root.starts_with(&source_root) {
        bail!(
            "output directory {} must not be inside the source directory {}",
            output_root.display(),
            source_root.display()
        );
    }

    let ignore = IgnoreMatcher::new(config.ignore_dot_files, &config.ignore_globs)?;
    let index = Arc::new(RwLock::new(DependencyIndex::new()));
    let transformer: Arc<dyn Transformer> = Arc::from(transform::from_command(config.transform_command.as_deref()));
    let unit = CompileUnit::new(
        PathMapper::new(&source_root, &output_root),
        transformer,
        Arc::clone(&index),
        &config.compile_extensions,
        config.source_maps,
        config.verbose,
    );
    let reconciler = Arc::new(EventReconciler::new(ignore, unit, index));

    let watcher = if once {
        None
    } else {
        Some(start_watcher(&source_root).context("failed to watch the source directory")?)
    };

    let stats = InitialBuildRunner::new(Arc::clone(&reconciler))
        .run()
        .await
        .context("initial build failed")?;
    tracing::info!("built {} -> {}: {stats}", source_root.display(), output_root.display());

    let Some((_handle, mut events)) = watcher else {
        return Ok(stats);
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor = tokio::spawn(Supervisor::new(config.supervisor_config(&output_root)).run(shutdown_rx));

    tracing::info!("watching {}", source_root.display());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(event) => {
                    let reconciler = Arc::clone(&reconciler);
                    tokio::spawn(async move {
                        reconciler.handle(&event, false).await;
                    });
                }
                None => break,
            },
        }
    }

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    match supervisor.await {
        Ok(result) => result?,
        Err(err) => tracing::warn!("supervisor task failed: {err}"),
    }
    Ok(stats)
}
