use std::fmt;
use std::path::{Path, PathBuf};

/// The kind of a filesystem change, independent of the path it happened to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
}

impl EventKind {
    /// Name used in dependency filter objects (`{change: false}`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Change => "change",
            EventKind::Unlink => "unlink",
            EventKind::AddDir => "addDir",
            EventKind::UnlinkDir => "unlinkDir",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change under the source root, carrying the absolute source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// A file appeared.
    Add(PathBuf),
    /// A file's content or metadata changed.
    Change(PathBuf),
    /// A file was removed.
    Unlink(PathBuf),
    /// A directory appeared.
    AddDir(PathBuf),
    /// A directory was removed.
    UnlinkDir(PathBuf),
}

impl BuildEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BuildEvent::Add(_) => EventKind::Add,
            BuildEvent::Change(_) => EventKind::Change,
            BuildEvent::Unlink(_) => EventKind::Unlink,
            BuildEvent::AddDir(_) => EventKind::AddDir,
            BuildEvent::UnlinkDir(_) => EventKind::UnlinkDir,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            BuildEvent::Add(p)
            | BuildEvent::Change(p)
            | BuildEvent::Unlink(p)
            | BuildEvent::AddDir(p)
            | BuildEvent::UnlinkDir(p) => p,
        }
    }
}
