use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::compile::{CompileOutcome, CompileUnit};
use crate::deps::DependencyIndex;
use crate::error::Result;
use crate::ignore_rules::IgnoreMatcher;
use crate::paths::RelPath;

use super::event::{BuildEvent, EventKind};

type LockTable = HashMap<RelPath, Arc<Mutex<()>>>;

/// One async mutex per output path. Every write to an output path happens
/// while holding its guard, so a direct edit and a cascade never interleave.
///
/// An entry lives only while someone holds or waits for it.
#[derive(Default)]
pub struct PathLocks {
    locks: StdMutex<LockTable>,
}

impl PathLocks {
    pub async fn lock(&self, rel: &RelPath) -> PathGuard<'_> {
        let entry = Arc::clone(self.table().entry(rel.clone()).or_default());
        PathGuard {
            locks: self,
            rel: rel.clone(),
            guard: Some(entry.lock_owned().await),
        }
    }

    /// Number of paths currently locked or waited on.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held lock on one path. Dropping it releases the lock and forgets the
/// path once no other task holds or waits for it.
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    rel: RelPath,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut table = self.locks.table();
        // Waiters clone the entry under the table lock, so a count of one
        // means only the table refers to it.
        if table.get(&self.rel).is_some_and(|e| Arc::strong_count(e) == 1) {
            table.remove(&self.rel);
        }
    }
}

/// What handling an event did to the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Compiled,
    Stubbed,
    Copied,
    Removed,
    DirCreated,
    DirRemoved,
    Ignored,
    /// The path was not under the source root.
    Rejected,
    /// A filesystem operation failed; already logged.
    Failed,
}

/// Maps filesystem events to output actions and cascades to dependents.
pub struct EventReconciler {
    ignore: IgnoreMatcher,
    unit: CompileUnit,
    index: Arc<RwLock<DependencyIndex>>,
    locks: PathLocks,
}

impl EventReconciler {
    pub fn new(ignore: IgnoreMatcher, unit: CompileUnit, index: Arc<RwLock<DependencyIndex>>) -> Self {
        Self {
            ignore,
            unit,
            index,
            locks: PathLocks::default(),
        }
    }

    pub fn unit(&self) -> &CompileUnit {
        &self.unit
    }

    pub fn index(&self) -> &Arc<RwLock<DependencyIndex>> {
        &self.index
    }

    /// Handle one event. Returns once every output write it caused is done.
    ///
    /// Outside bootstrap, first-degree dependents of the path are recompiled
    /// afterwards; those recompiles never cascade themselves, so a dependency
    /// cycle costs one recompile per file per edit.
    pub async fn handle(&self, event: &BuildEvent, bootstrap: bool) -> HandleOutcome {
        let kind = event.kind();
        let rel = match self.unit.mapper().relative(event.path()) {
            Ok(rel) => rel,
            Err(err) => {
                tracing::warn!("dropping {kind} event: {err}");
                return HandleOutcome::Rejected;
            }
        };

        if self.ignore.should_ignore(&rel) {
            tracing::debug!("ignored {kind} {rel}");
            return HandleOutcome::Ignored;
        }

        let outcome = {
            let _guard = self.locks.lock(&rel).await;
            match self.dispatch(kind, &rel).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!("{kind} {rel}: {err}");
                    HandleOutcome::Failed
                }
            }
        };

        if !bootstrap {
            self.cascade(kind, &rel).await;
        }

        outcome
    }

    async fn dispatch(&self, kind: EventKind, rel: &RelPath) -> Result<HandleOutcome> {
        match kind {
            EventKind::Add | EventKind::Change => {
                if self.unit.is_compiled(rel) {
                    Ok(match self.unit.compile(rel).await? {
                        CompileOutcome::Compiled { .. } => HandleOutcome::Compiled,
                        CompileOutcome::Stubbed => HandleOutcome::Stubbed,
                    })
                } else {
                    self.unit.copy(rel).await?;
                    Ok(HandleOutcome::Copied)
                }
            }
            EventKind::Unlink => {
                self.unit.remove_file(rel).await?;
                Ok(HandleOutcome::Removed)
            }
            EventKind::AddDir => {
                self.unit.ensure_dir(rel).await?;
                Ok(HandleOutcome::DirCreated)
            }
            EventKind::UnlinkDir => {
                self.unit.remove_dir(rel).await?;
                Ok(HandleOutcome::DirRemoved)
            }
        }
    }

    /// Recompile every dependent of `changed` whose filter permits `kind`.
    /// Dependents that no longer exist are pruned from the index instead.
    /// Returns the number of recompiles.
    async fn cascade(&self, kind: EventKind, changed: &RelPath) -> usize {
        let dependents: BTreeSet<RelPath> = {
            let index = self.index.read().await;
            index
                .lookup_dependents(changed)
                .into_iter()
                .filter(|(dependent, filter)| dependent != changed && filter.permits(kind))
                .map(|(dependent, _)| dependent)
                .collect()
        };

        let mut recompiled = 0;
        for dependent in dependents {
            let source = self.unit.mapper().to_source(&dependent);
            let exists = tokio::fs::metadata(&source)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);

            if !exists {
                tracing::debug!("pruning missing dependent {dependent}");
                self.index.write().await.prune(&dependent);
                continue;
            }

            tracing::debug!("{kind} {changed}: recompiling dependent {dependent}");
            let _guard = self.locks.lock(&dependent).await;
            match self.unit.compile(&dependent).await {
                Ok(_) => recompiled += 1,
                Err(err) => tracing::error!("recompiling {dependent}: {err}"),
            }
        }
        recompiled
    }
}
