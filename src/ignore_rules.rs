use glob::{MatchOptions, Pattern};

use crate::error::BuildError;
use crate::paths::RelPath;

/// `*` and `?` stop at `/`; only `**` spans directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Decides whether a source-relative path is excluded from processing.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    ignore_dot_files: bool,
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    /// Compile the configured glob list. An invalid pattern is reported
    /// rather than silently dropped.
    pub fn new<S: AsRef<str>>(ignore_dot_files: bool, globs: &[S]) -> Result<Self, BuildError> {
        let patterns = globs
            .iter()
            .map(|g| {
                Pattern::new(g.as_ref()).map_err(|source| BuildError::Pattern {
                    pattern: g.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ignore_dot_files,
            patterns,
        })
    }

    /// True when the path is a dotfile (or lives under a dot-directory) and
    /// dotfiles are ignored, or when any glob matches the whole relative path.
    pub fn should_ignore(&self, rel: &RelPath) -> bool {
        if rel.is_root() {
            return false;
        }

        if self.ignore_dot_files && rel.components().any(|c| c.starts_with('.')) {
            return true;
        }

        self.patterns
            .iter()
            .any(|p| p.matches_with(rel.as_str(), MATCH_OPTIONS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> RelPath {
        RelPath::parse(s).unwrap()
    }

    #[test]
    fn test_dotfiles_ignored_only_when_enabled() {
        let off = IgnoreMatcher::new::<&str>(false, &[]).unwrap();
        let on = IgnoreMatcher::new::<&str>(true, &[]).unwrap();

        assert!(!off.should_ignore(&rel(".env")));
        assert!(on.should_ignore(&rel(".env")));
        assert!(on.should_ignore(&rel("lib/.hidden.js")));
        assert!(on.should_ignore(&rel(".cache/data.json")), "files under a dot-directory");
        assert!(!on.should_ignore(&rel("lib/a.js")));
    }

    #[test]
    fn test_glob_matches_whole_relative_path() {
        let m = IgnoreMatcher::new(false, &["*.tmp", "fixtures/**", "**/.goutputstream-*"]).unwrap();

        assert!(m.should_ignore(&rel("scratch.tmp")));
        assert!(!m.should_ignore(&rel("lib/scratch.tmp")), "* must not cross a separator");
        assert!(m.should_ignore(&rel("fixtures/deep/x.js")));
        assert!(m.should_ignore(&rel(".goutputstream-ABC123")));
        assert!(m.should_ignore(&rel("lib/.goutputstream-ABC123")));
        assert!(!m.should_ignore(&rel("lib/a.js")));
    }

    #[test]
    fn test_question_mark_matches_single_char() {
        let m = IgnoreMatcher::new(false, &["lib/?.js"]).unwrap();
        assert!(m.should_ignore(&rel("lib/a.js")));
        assert!(!m.should_ignore(&rel("lib/ab.js")));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let err = IgnoreMatcher::new(false, &["a/***"]).unwrap_err();
        assert!(matches!(err, BuildError::Pattern { .. }));
    }

    #[test]
    fn test_root_never_ignored() {
        let m = IgnoreMatcher::new(true, &["**"]).unwrap();
        assert!(!m.should_ignore(&RelPath::root()));
    }
}
