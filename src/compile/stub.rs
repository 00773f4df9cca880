//! Error stubs: the artifact written in place of a file that failed to
//! transform. Executing it rethrows the original error with its source
//! location, so a broken file fails loudly at the point it is loaded.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::transform::{SourceMap, TransformError};

/// The serialized form of a transform failure embedded in a stub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorReport {
    pub name: String,
    pub message: String,
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ErrorReport {
    pub fn from_error(err: &TransformError, file: &Path) -> Self {
        let (line, column) = match err.location() {
            Some((l, c)) => (Some(l), Some(c)),
            None => (None, None),
        };
        Self {
            name: err.name().to_string(),
            message: err.to_string(),
            file: file.display().to_string(),
            line,
            column,
        }
    }

    fn to_json(&self) -> String {
        json!({
            "name": self.name,
            "message": self.message,
            "file": self.file,
            "line": self.line,
            "column": self.column,
        })
        .to_string()
    }
}

/// Render the stub program. The report travels as a JSON document inside a
/// JSON string literal, which is also a valid JavaScript string literal.
pub fn render_stub(report: &ErrorReport) -> String {
    let literal = Value::String(report.to_json()).to_string();
    format!(
        r#"// mirrorwatch: this file failed to compile; loading it rethrows the error.
var report = JSON.parse({literal});
var error = new Error(report.message);
error.name = report.name;
error.file = report.file;
var where = report.line ? report.file + ":" + report.line + ":" + report.column : report.file;
error.stack = report.name + ": " + report.message + "\n    at " + where;
throw error;
"#
    )
}

/// A map pointing the stub's first line at the error location, when known.
pub fn stub_map(report: &ErrorReport) -> Option<SourceMap> {
    match (report.line, report.column) {
        (Some(line), Some(column)) => Some(SourceMap::point(line, column)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax_error() -> TransformError {
        TransformError::Syntax {
            message: "Unexpected token ')'".into(),
            line: 3,
            column: 7,
            frame: "> 3 | foo(a));\n".into(),
        }
    }

    fn embedded_report(stub: &str) -> ErrorReport {
        let line = stub
            .lines()
            .find_map(|l| l.strip_prefix("var report = JSON.parse("))
            .expect("stub should embed the report");
        let literal = line.strip_suffix(");").expect("statement should close");
        let json: String = serde_json::from_str(literal).expect("valid string literal");
        serde_json::from_str(&json).expect("valid report json")
    }

    #[test]
    fn test_stub_round_trips_report() {
        let report = ErrorReport::from_error(&syntax_error(), Path::new("/w/src/a.js"));
        let stub = render_stub(&report);

        assert_eq!(embedded_report(&stub), report);
        assert!(stub.contains("throw error;"));
        assert_eq!(report.name, "SyntaxError");
        assert_eq!(report.line, Some(3));
        assert!(report.message.contains("Unexpected token"));
    }

    #[test]
    fn test_stub_escapes_quotes_and_newlines() {
        let err = TransformError::Command {
            program: "babel".into(),
            status: "exit status: 1".into(),
            stderr: "line one\n\"quoted\" </script>\u{2028}".into(),
        };
        let report = ErrorReport::from_error(&err, Path::new("x.js"));
        let stub = render_stub(&report);

        assert_eq!(embedded_report(&stub).message, report.message);
        assert_eq!(report.name, "TransformError");
    }

    #[cfg(unix)]
    #[test]
    fn test_stub_rethrows_under_node() {
        use std::process::Command;

        // Skipped where no node is installed.
        let has_node = Command::new("node")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success());
        if !has_node {
            return;
        }

        let dir = tempfile::TempDir::new().unwrap();
        let stub_path = dir.path().join("a.js");
        let report = ErrorReport::from_error(&syntax_error(), Path::new("/w/src/a.js"));
        std::fs::write(&stub_path, render_stub(&report)).unwrap();

        let out = Command::new("node").arg(&stub_path).output().unwrap();
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(!out.status.success());
        assert!(stderr.contains("Unexpected token ')'"), "stderr was: {stderr}");
        assert!(stderr.contains("/w/src/a.js:3:7"), "stderr was: {stderr}");
    }

    #[test]
    fn test_stub_map_only_with_location() {
        let located = ErrorReport::from_error(&syntax_error(), Path::new("a.js"));
        assert_eq!(stub_map(&located).unwrap().mappings, "AAEM");

        let unlocated = ErrorReport::from_error(
            &TransformError::UnsupportedExtension { extension: "coffee".into() },
            Path::new("a.coffee"),
        );
        assert!(stub_map(&unlocated).is_none());
    }
}
