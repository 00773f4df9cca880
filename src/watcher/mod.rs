pub mod event;
pub mod incremental;

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind as RawKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;

use event::BuildEvent;

/// Handle to a running watcher. Dropping it stops watching.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    _bridge_task: JoinHandle<()>,
}

/// Start a recursive, undebounced watcher on `root`.
///
/// Raw notify events are classified into [`BuildEvent`]s on a blocking bridge
/// task and forwarded into a tokio channel. Events queue up in the channel
/// until the receiver starts consuming, so a watcher started before the
/// initial build loses nothing.
pub fn start_watcher(root: &Path) -> anyhow::Result<(WatcherHandle, tokio_mpsc::Receiver<BuildEvent>)> {
    let (std_tx, std_rx) = std::sync::mpsc::channel::<notify::Result<Event>>();

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = std_tx.send(res);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<BuildEvent>(1024);

    let bridge_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(raw) => {
                    for build_event in classify_event(&raw) {
                        if tokio_tx.blocking_send(build_event).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => tracing::warn!("watcher error: {err}"),
            }
        }
    });

    Ok((
        WatcherHandle {
            _watcher: watcher,
            _bridge_task: bridge_task,
        },
        tokio_rx,
    ))
}

/// Translate one raw notify event into build events.
///
/// | raw kind                    | build event                          |
/// |-----------------------------|--------------------------------------|
/// | create                      | `Add` / `AddDir` (+ contents)        |
/// | modify data or metadata     | `Change`, files only                 |
/// | remove                      | `Unlink` / `UnlinkDir`               |
/// | rename from                 | `Unlink`                             |
/// | rename to                   | `Add` / `AddDir` (+ contents)        |
/// | rename both                 | `Unlink` then `Add` / `AddDir`       |
/// | access, other               | nothing                              |
///
/// Where the backend does not say whether a path is a directory, the
/// filesystem is asked. A rename-from whose kind is unknown maps to `Unlink`;
/// output removal is recursive, so a vanished directory is still cleared.
pub fn classify_event(raw: &Event) -> Vec<BuildEvent> {
    let mut out = Vec::new();
    match raw.kind {
        RawKind::Create(CreateKind::File) => {
            out.extend(raw.paths.iter().cloned().map(BuildEvent::Add));
        }
        RawKind::Create(CreateKind::Folder) => {
            for path in &raw.paths {
                appeared_dir(path, &mut out);
            }
        }
        RawKind::Create(_) => {
            for path in &raw.paths {
                appeared(path, &mut out);
            }
        }

        RawKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            out.extend(raw.paths.iter().cloned().map(BuildEvent::Unlink));
        }
        RawKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in &raw.paths {
                appeared(path, &mut out);
            }
        }
        RawKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to, ..] = raw.paths.as_slice() {
                out.push(BuildEvent::Unlink(from.clone()));
                appeared(to, &mut out);
            }
        }
        RawKind::Modify(ModifyKind::Name(_)) => {
            // Backend could not tell the direction; the filesystem can.
            for path in &raw.paths {
                if path.symlink_metadata().is_ok() {
                    appeared(path, &mut out);
                } else {
                    out.push(BuildEvent::Unlink(path.clone()));
                }
            }
        }
        RawKind::Modify(ModifyKind::Data(_) | ModifyKind::Metadata(_) | ModifyKind::Any) => {
            for path in &raw.paths {
                if path.is_file() {
                    out.push(BuildEvent::Change(path.clone()));
                }
            }
        }

        RawKind::Remove(RemoveKind::Folder) => {
            out.extend(raw.paths.iter().cloned().map(BuildEvent::UnlinkDir));
        }
        RawKind::Remove(_) => {
            out.extend(raw.paths.iter().cloned().map(BuildEvent::Unlink));
        }

        RawKind::Modify(ModifyKind::Other) | RawKind::Access(_) | RawKind::Any | RawKind::Other => {}
    }
    out
}

fn appeared(path: &Path, out: &mut Vec<BuildEvent>) {
    if path.is_dir() {
        appeared_dir(path, out);
    } else if path.symlink_metadata().is_ok() {
        out.push(BuildEvent::Add(path.to_path_buf()));
    }
}

/// `AddDir` for `dir`, then events for everything already inside it. Files
/// written into a directory before the watch on it is armed raise no events
/// of their own.
fn appeared_dir(dir: &Path, out: &mut Vec<BuildEvent>) {
    out.push(BuildEvent::AddDir(dir.to_path_buf()));

    let walker = ignore::WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(false)
        .build();
    for entry in walker.flatten() {
        if entry.depth() == 0 {
            continue;
        }
        let path: PathBuf = entry.into_path();
        if path.is_dir() {
            out.push(BuildEvent::AddDir(path));
        } else {
            out.push(BuildEvent::Add(path));
        }
    }
}
