use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// A normalized path relative to the source (and output) root.
///
/// Components are joined with `/` and never contain `.` or `..`. The `dir`
/// flag marks a directory prefix (written with a trailing separator in
/// dependency declarations) that matches every path beneath it. The empty
/// path is the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath {
    path: String,
    dir: bool,
}

impl RelPath {
    /// The source root itself.
    pub fn root() -> Self {
        Self {
            path: String::new(),
            dir: false,
        }
    }

    /// Parse a root-relative string such as `lib/a.js` or `lib/`.
    ///
    /// Backslashes are accepted as separators. `..` that would climb above
    /// the root is rejected.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        Self::root().join_raw(raw)
    }

    /// Resolve a dependency string declared in the file at `self`.
    ///
    /// Relative values are taken from the declaring file's directory; a value
    /// starting with `/` is taken from the source root. A trailing separator
    /// is preserved as the directory-prefix flag.
    pub fn resolve(&self, raw: &str) -> Result<Self, PathError> {
        if raw.starts_with('/') || raw.starts_with('\\') {
            return Self::parse(raw.trim_start_matches(['/', '\\']));
        }
        self.directory().join_raw(raw)
    }

    fn join_raw(&self, raw: &str) -> Result<Self, PathError> {
        let mut parts: Vec<&str> = self.components().collect();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(PathError::EscapesRoot {
                            path: raw.to_string(),
                        });
                    }
                }
                other => parts.push(other),
            }
        }
        Ok(Self {
            path: parts.join("/"),
            dir: raw.ends_with('/') || raw.ends_with('\\'),
        })
    }

    /// The directory containing this path, as a plain (non-prefix) path.
    pub fn directory(&self) -> Self {
        let path = match self.path.rfind('/') {
            Some(idx) => self.path[..idx].to_string(),
            None => String::new(),
        };
        Self { path, dir: false }
    }

    /// The same path marked as a directory prefix.
    pub fn as_prefix(&self) -> Self {
        Self {
            path: self.path.clone(),
            dir: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_dir_prefix(&self) -> bool {
        self.dir
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|c| !c.is_empty())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components().last()
    }

    /// Extension of the last component, without the dot. Dotfiles such as
    /// `.env` have none.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// Every directory prefix that contains this path, root prefix first.
    pub fn ancestor_prefixes(&self) -> Vec<RelPath> {
        let parts: Vec<&str> = self.components().collect();
        (0..parts.len())
            .map(|n| Self {
                path: parts[..n].join("/"),
                dir: true,
            })
            .collect()
    }

    /// Whether `self` lies beneath the directory prefix `prefix`.
    pub fn is_under(&self, prefix: &RelPath) -> bool {
        if !prefix.dir || self.path == prefix.path {
            return false;
        }
        prefix.path.is_empty()
            || self
                .path
                .strip_prefix(prefix.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Join onto an absolute root directory.
    pub fn to_path_under(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for component in self.components() {
            out.push(component);
        }
        out
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.path.is_empty(), self.dir) {
            (true, true) => f.write_str("./"),
            (true, false) => f.write_str("."),
            (false, true) => write!(f, "{}/", self.path),
            (false, false) => f.write_str(&self.path),
        }
    }
}

/// Translates between absolute paths and [`RelPath`]s on both sides of the
/// mirror.
#[derive(Debug, Clone)]
pub struct PathMapper {
    source_root: PathBuf,
    output_root: PathBuf,
}

impl PathMapper {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Map an absolute source path to its root-relative form.
    pub fn relative(&self, path: &Path) -> Result<RelPath, PathError> {
        let rest = path
            .strip_prefix(&self.source_root)
            .map_err(|_| PathError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.source_root.clone(),
            })?;

        let mut parts: Vec<&str> = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(os) => {
                    let part = os.to_str().ok_or_else(|| PathError::NonUtf8 {
                        path: path.to_path_buf(),
                    })?;
                    parts.push(part);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(PathError::EscapesRoot {
                            path: path.display().to_string(),
                        });
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::OutsideRoot {
                        path: path.to_path_buf(),
                        root: self.source_root.clone(),
                    });
                }
            }
        }

        Ok(RelPath {
            path: parts.join("/"),
            dir: false,
        })
    }

    pub fn to_source(&self, rel: &RelPath) -> PathBuf {
        rel.to_path_under(&self.source_root)
    }

    pub fn to_output(&self, rel: &RelPath) -> PathBuf {
        rel.to_path_under(&self.output_root)
    }

    /// Sidecar source map path: `<output>.map`.
    pub fn to_output_map(&self, rel: &RelPath) -> PathBuf {
        let mut os: OsString = self.to_output(rel).into_os_string();
        os.push(".map");
        PathBuf::from(os)
    }
}

/// Relative path from directory `from` to `to`, both absolute.
pub fn relative_between(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> RelPath {
        RelPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes_separators_and_dots() {
        let p = rel("./lib\\util/./a.js");
        assert_eq!(p.as_str(), "lib/util/a.js");
        assert!(!p.is_dir_prefix());
        assert_eq!(rel("lib/x/../b.js").as_str(), "lib/b.js");
    }

    #[test]
    fn test_parse_rejects_climbing_out() {
        assert!(matches!(
            RelPath::parse("../secret.js"),
            Err(PathError::EscapesRoot { .. })
        ));
        assert!(RelPath::parse("a/../../b").is_err());
    }

    #[test]
    fn test_resolve_relative_to_declaring_directory() {
        let dependent = rel("lib/b.js");
        assert_eq!(dependent.resolve("./a.js").unwrap().as_str(), "lib/a.js");
        assert_eq!(dependent.resolve("../top.json").unwrap().as_str(), "top.json");
        assert_eq!(dependent.resolve("/conf/x.json").unwrap().as_str(), "conf/x.json");
        assert!(dependent.resolve("../../out.js").is_err());
    }

    #[test]
    fn test_resolve_keeps_trailing_separator_as_prefix() {
        let dependent = rel("b.js");
        let prefix = dependent.resolve("./templates/").unwrap();
        assert_eq!(prefix.as_str(), "templates");
        assert!(prefix.is_dir_prefix());
        assert_eq!(prefix.to_string(), "templates/");

        let root = dependent.resolve("./").unwrap();
        assert!(root.is_root() && root.is_dir_prefix());
    }

    #[test]
    fn test_extension_and_file_name() {
        assert_eq!(rel("a/b.test.js").extension(), Some("js"));
        assert_eq!(rel("a/.env").extension(), None);
        assert_eq!(rel("Makefile").extension(), None);
        assert_eq!(rel("a/b.js").file_name(), Some("b.js"));
    }

    #[test]
    fn test_ancestor_prefixes_and_is_under() {
        let p = rel("a/b/c.js");
        let names: Vec<String> = p.ancestor_prefixes().iter().map(|a| a.to_string()).collect();
        assert_eq!(names, vec!["./", "a/", "a/b/"]);

        assert!(p.is_under(&rel("a/")));
        assert!(p.is_under(&rel("a/b/")));
        assert!(!p.is_under(&rel("a/b")), "plain path is not a prefix");
        assert!(!rel("ab/c.js").is_under(&rel("a/")));
        assert!(p.is_under(&RelPath::root().as_prefix()));
    }

    #[test]
    fn test_mapper_round_trip() {
        let mapper = PathMapper::new("/work/src", "/work/dist");
        let r = mapper.relative(Path::new("/work/src/lib/a.js")).unwrap();
        assert_eq!(r.as_str(), "lib/a.js");
        assert_eq!(mapper.to_source(&r), PathBuf::from("/work/src/lib/a.js"));
        assert_eq!(mapper.to_output(&r), PathBuf::from("/work/dist/lib/a.js"));
        assert_eq!(mapper.to_output_map(&r), PathBuf::from("/work/dist/lib/a.js.map"));
    }

    #[test]
    fn test_mapper_rejects_outside_paths() {
        let mapper = PathMapper::new("/work/src", "/work/dist");
        assert!(matches!(
            mapper.relative(Path::new("/work/other/a.js")),
            Err(PathError::OutsideRoot { .. })
        ));
        assert!(matches!(
            mapper.relative(Path::new("/work/src/../../etc/passwd")),
            Err(PathError::EscapesRoot { .. })
        ));
        assert!(mapper.relative(Path::new("/work/src")).unwrap().is_root());
    }

    #[test]
    fn test_relative_between() {
        assert_eq!(
            relative_between(Path::new("/w/dist/lib"), Path::new("/w/src/lib/a.js")),
            PathBuf::from("../../src/lib/a.js")
        );
        assert_eq!(
            relative_between(Path::new("/w/dist"), Path::new("/w/dist/a.js")),
            PathBuf::from("a.js")
        );
    }
}
