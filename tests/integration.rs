/// End-to-end tests driving the compiled `mirrorwatch` binary against a
/// throwaway project directory. `--once` builds and exits, so no test has to
/// manage a long-running watcher.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mirrorwatch"))
}

/// Run mirrorwatch in `cwd` and return (success, stdout, stderr).
fn run_in(cwd: &Path, args: &[&str]) -> (bool, String, String) {
    let out = Command::new(binary())
        .current_dir(cwd)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke mirrorwatch binary");
    (
        out.status.success(),
        String::from_utf8_lossy(&out.stdout).to_string(),
        String::from_utf8_lossy(&out.stderr).to_string(),
    )
}

fn run_success(cwd: &Path, args: &[&str]) -> String {
    let (ok, stdout, stderr) = run_in(cwd, args);
    assert!(ok, "command {args:?} failed\nstdout: {stdout}\nstderr: {stderr}");
    stdout
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "src/index.js", "const lib = require('./lib/util');\nlib.run();\n");
    write(root, "src/lib/util.js", "// @compileDependencies(['../views/'])\nconst views = loadViews(__dirname + '/../views');\nexports.run = () => views;\n");
    write(root, "src/lib/broken.js", "function (\n");
    write(root, "src/views/home.ejs", "<h1><%= title %></h1>\n");
    write(root, "src/.secret", "token\n");
    tmp
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_once_mirrors_project() {
    let tmp = project();
    let root = tmp.path();

    let stdout = run_success(root, &["--once"]);
    assert!(stdout.contains("2 compiled"), "summary was: {stdout}");
    assert!(stdout.contains("1 failed to compile"), "summary was: {stdout}");

    let index = fs::read_to_string(root.join("dist/index.js")).unwrap();
    assert!(index.starts_with("const lib = require('./lib/util');"));
    assert!(index.ends_with("//# sourceMappingURL=index.js.map\n"));
    assert!(root.join("dist/index.js.map").exists());

    assert_eq!(
        fs::read(root.join("dist/views/home.ejs")).unwrap(),
        fs::read(root.join("src/views/home.ejs")).unwrap()
    );

    let stub = fs::read_to_string(root.join("dist/lib/broken.js")).unwrap();
    assert!(stub.contains("SyntaxError"));
    assert!(stub.contains("throw error;"));

    // Dotfiles are kept unless asked otherwise.
    assert!(root.join("dist/.secret").exists());
}

#[test]
fn test_once_respects_flags() {
    let tmp = project();
    let root = tmp.path();

    run_success(
        root,
        &["--once", "--dist", "build", "--ignore-dot-files", "--no-source-maps", "--ignore", "**/*.ejs"],
    );

    assert!(root.join("build/index.js").exists());
    assert!(!root.join("build/index.js.map").exists());
    assert!(!root.join("build/.secret").exists());
    assert!(!root.join("build/views/home.ejs").exists());
    assert!(!root.join("dist").exists());
}

#[test]
fn test_once_reads_config_file() {
    let tmp = project();
    let root = tmp.path();
    write(root, "mirrorwatch.toml", "dist = \"out\"\nsource_maps = false\n");

    run_success(root, &["--once"]);
    assert!(root.join("out/index.js").exists());
    assert!(!root.join("out/index.js.map").exists());

    // A flag beats the file.
    run_success(root, &["--once", "--dist", "flagged"]);
    assert!(root.join("flagged/index.js").exists());
}

#[test]
fn test_once_clears_stale_output() {
    let tmp = project();
    let root = tmp.path();
    write(root, "dist/removed.js", "old();\n");

    run_success(root, &["--once"]);
    assert!(!root.join("dist/removed.js").exists());
}

#[test]
fn test_missing_source_dir_fails() {
    let tmp = TempDir::new().unwrap();
    let (ok, _stdout, stderr) = run_in(tmp.path(), &["--once"]);
    assert!(!ok);
    assert!(stderr.contains("source directory"), "stderr was: {stderr}");
}

#[test]
fn test_output_inside_source_is_rejected() {
    let tmp = project();
    let (ok, _stdout, stderr) = run_in(tmp.path(), &["--once", "--dist", "src/out"]);
    assert!(!ok);
    assert!(stderr.contains("must not be inside"), "stderr was: {stderr}");
}

#[cfg(unix)]
#[test]
fn test_transform_command() {
    let tmp = project();
    let root = tmp.path();
    fs::remove_file(root.join("src/lib/broken.js")).unwrap();

    run_success(root, &["--once", "--transform-cmd", "tr a-z A-Z"]);
    let index = fs::read_to_string(root.join("dist/index.js")).unwrap();
    assert!(index.starts_with("CONST LIB = REQUIRE"));
    // Command output has no source map.
    assert!(!root.join("dist/index.js.map").exists());
}
