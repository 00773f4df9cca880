//! Reverse dependency index built from `@compileDependencies` annotations.
//!
//! Keys are the paths a file depends on (exact files or directory prefixes);
//! values are the dependents that must be recompiled when a key changes,
//! each with the event kinds it reacts to.

pub mod annotations;

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::paths::RelPath;
use crate::watcher::event::EventKind;

/// Per-event enable flags of one declaration. A missing entry means enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub add: Option<bool>,
    pub change: Option<bool>,
    pub unlink: Option<bool>,
    pub add_dir: Option<bool>,
    pub unlink_dir: Option<bool>,
}

impl EventFilter {
    pub fn permits(&self, kind: EventKind) -> bool {
        let flag = match kind {
            EventKind::Add => self.add,
            EventKind::Change => self.change,
            EventKind::Unlink => self.unlink,
            EventKind::AddDir => self.add_dir,
            EventKind::UnlinkDir => self.unlink_dir,
        };
        flag.unwrap_or(true)
    }
}

/// One declared edge: `dependent` is recompiled when `dependency` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub dependency: RelPath,
    pub dependent: RelPath,
    pub filter: EventFilter,
}

/// `dependency -> dependent -> filter`.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    entries: HashMap<RelPath, BTreeMap<RelPath, EventFilter>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a single edge. A repeated registration from the same dependent
    /// replaces its filter for that dependency.
    pub fn register(&mut self, dependency: RelPath, dependent: RelPath, filter: EventFilter) {
        self.entries
            .entry(dependency)
            .or_default()
            .insert(dependent, filter);
    }

    /// Entries keyed by `changed` itself or by any directory prefix above it.
    ///
    /// A dependent reached through several keys is listed once per key.
    pub fn lookup_dependents(&self, changed: &RelPath) -> Vec<(RelPath, EventFilter)> {
        let mut out = Vec::new();
        let exact = std::iter::once(changed.clone());
        for key in exact.chain(changed.ancestor_prefixes()) {
            if let Some(dependents) = self.entries.get(&key) {
                out.extend(dependents.iter().map(|(d, f)| (d.clone(), *f)));
            }
        }
        out
    }

    /// Drop `dependent` from every key. Keys left without dependents go too.
    pub fn prune(&mut self, dependent: &RelPath) {
        self.entries.retain(|_, dependents| {
            dependents.remove(dependent);
            !dependents.is_empty()
        });
    }

    /// Replace everything `dependent` declared before with `declarations`.
    pub fn replace_declarations(&mut self, dependent: &RelPath, declarations: &[DependencyDeclaration]) {
        self.prune(dependent);
        for decl in declarations {
            self.register(decl.dependency.clone(), decl.dependent.clone(), decl.filter);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of dependency keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
