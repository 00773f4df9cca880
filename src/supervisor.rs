//! Runs the built entry points and restarts them when the output changes.
//!
//! Each entry point gets one child: `<runtime> <runtime_args..> <dist>/<entry>`.
//! The output root (recursively) and every extra watch path are observed
//! through a debounced watcher; a settled change to a file with a watched
//! extension, or to an extra path itself, kills and respawns every child.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub runtime: String,
    pub runtime_args: Vec<String>,
    /// Absolute paths of the scripts to run, inside the output root.
    pub entry_points: Vec<PathBuf>,
    pub output_root: PathBuf,
    pub watch_extensions: Vec<String>,
    /// Absolute paths watched in addition to the output root.
    pub watch_extra: Vec<PathBuf>,
}

pub struct Supervisor {
    config: SupervisorConfig,
    watch_extensions: HashSet<String>,
}

/// A spawned child and the task that owns it.
struct RunningChild {
    kill: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let watch_extensions = config
            .watch_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        Self {
            config,
            watch_extensions,
        }
    }

    /// Whether a settled change at `path` warrants a restart.
    pub fn should_restart(&self, path: &Path) -> bool {
        if self.config.watch_extra.iter().any(|p| p == path) {
            return true;
        }
        path.starts_with(&self.config.output_root)
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| self.watch_extensions.contains(ext))
    }

    /// Spawn the children and restart them on change until `shutdown` flips
    /// to true or its sender is dropped. Children are killed on the way out.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        if self.config.entry_points.is_empty() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(DEBOUNCE, move |res| {
            let _ = tx.send(res);
        })?;
        debouncer
            .watcher()
            .watch(&self.config.output_root, RecursiveMode::Recursive)?;
        for extra in &self.config.watch_extra {
            // Watch the parent so an extra file that appears later is seen.
            let target = match extra.parent() {
                Some(parent) if !extra.is_dir() => parent,
                _ => extra.as_path(),
            };
            if let Err(err) = debouncer.watcher().watch(target, RecursiveMode::NonRecursive) {
                tracing::warn!("cannot watch {}: {err}", extra.display());
            }
        }

        let mut children = self.spawn_all();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(result) = rx.recv() => match result {
                    Ok(events) => {
                        let trigger = events.iter().find(|e| self.should_restart(&e.path));
                        if let Some(event) = trigger {
                            tracing::info!("{} changed, restarting", event.path.display());
                            stop_all(children).await;
                            children = self.spawn_all();
                        }
                    }
                    Err(err) => tracing::warn!("output watcher error: {err:?}"),
                },
            }
        }

        stop_all(children).await;
        Ok(())
    }

    fn spawn_all(&self) -> Vec<RunningChild> {
        self.config
            .entry_points
            .iter()
            .filter_map(|entry| self.spawn(entry))
            .collect()
    }

    fn spawn(&self, entry: &Path) -> Option<RunningChild> {
        let mut cmd = Command::new(&self.config.runtime);
        cmd.args(&self.config.runtime_args)
            .arg(entry)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if std::env::var_os("NODE_ENV").is_none() {
            cmd.env("NODE_ENV", "development");
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                tracing::error!("failed to start {} {}: {err}", self.config.runtime, entry.display());
                return None;
            }
        };
        tracing::info!("started {} {}", self.config.runtime, entry.display());

        let (kill, mut killed) = oneshot::channel::<()>();
        let entry = entry.to_path_buf();
        let task = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => tracing::info!(
                        "{} exited ({status}); waiting for changes before restart",
                        entry.display()
                    ),
                    Err(err) => tracing::warn!("waiting on {}: {err}", entry.display()),
                },
                _ = &mut killed => {
                    if let Err(err) = child.kill().await {
                        tracing::warn!("failed to stop {}: {err}", entry.display());
                    }
                }
            }
        });

        Some(RunningChild { kill, task })
    }
}

async fn stop_all(children: Vec<RunningChild>) {
    for child in children {
        let _ = child.kill.send(());
        let _ = child.task.await;
    }
}
