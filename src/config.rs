use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::supervisor::SupervisorConfig;

/// Optional config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "mirrorwatch.toml";

/// Flags given to `node` when no runtime arguments are configured.
pub const NODE_RUNTIME_ARGS: &[&str] = &[
    "--trace-warnings",
    "--pending-deprecation",
    "--stack-trace-limit=1000",
    "--stack-size=1024",
];

/// One layer of settings. Every field is optional so layers can be stacked
/// (defaults, then the config file, then command-line flags).
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct PartialConfig {
    pub src: Option<PathBuf>,
    pub dist: Option<PathBuf>,
    pub ignore_dot_files: Option<bool>,
    pub ignore: Option<Vec<String>>,
    pub compile_extensions: Option<Vec<String>>,
    pub watch_extensions: Option<Vec<String>>,
    pub watch_extra: Option<Vec<PathBuf>>,
    pub source_maps: Option<bool>,
    pub verbose: Option<bool>,
    pub entry_points: Option<Vec<String>>,
    /// Program and arguments of an external transformer reading stdin.
    pub transform_command: Option<Vec<String>>,
    pub runtime: Option<String>,
    pub runtime_args: Option<Vec<String>>,
}

impl PartialConfig {
    /// Load `path` if it exists.
    ///
    /// Returns an empty layer if the file does not exist or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse {}: {err}. Using defaults.", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read {}: {err}. Using defaults.", path.display());
                Self::default()
            }
        }
    }
}

/// Fully resolved settings for one build session.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub ignore_dot_files: bool,
    pub ignore_globs: Vec<String>,
    /// Extensions run through the transformer; everything else is copied.
    pub compile_extensions: Vec<String>,
    /// Output extensions whose change restarts the entry points.
    pub watch_extensions: Vec<String>,
    pub watch_extra: Vec<PathBuf>,
    pub source_maps: bool,
    pub verbose: bool,
    /// Scripts to run, relative to the output root.
    pub entry_points: Vec<String>,
    pub transform_command: Option<Vec<String>>,
    pub runtime: String,
    /// `None` picks the runtime's defaults, see [`BuildConfig::effective_runtime_args`].
    pub runtime_args: Option<Vec<String>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            source_root: PathBuf::from("src"),
            output_root: PathBuf::from("dist"),
            ignore_dot_files: false,
            // Editor save temporaries (gvfs).
            ignore_globs: strings(&["**/.goutputstream-*"]),
            compile_extensions: strings(&["js", "jsx"]),
            watch_extensions: strings(&["js", "ejs"]),
            watch_extra: vec![PathBuf::from(".env")],
            source_maps: true,
            verbose: true,
            entry_points: strings(&["index.js"]),
            transform_command: None,
            runtime: "node".to_string(),
            runtime_args: None,
        }
    }
}

impl BuildConfig {
    /// Apply every field `layer` sets on top of `self`.
    pub fn merge(mut self, layer: PartialConfig) -> Self {
        if let Some(v) = layer.src {
            self.source_root = v;
        }
        if let Some(v) = layer.dist {
            self.output_root = v;
        }
        if let Some(v) = layer.ignore_dot_files {
            self.ignore_dot_files = v;
        }
        if let Some(v) = layer.ignore {
            self.ignore_globs = v;
        }
        if let Some(v) = layer.compile_extensions {
            self.compile_extensions = v;
        }
        if let Some(v) = layer.watch_extensions {
            self.watch_extensions = v;
        }
        if let Some(v) = layer.watch_extra {
            self.watch_extra = v;
        }
        if let Some(v) = layer.source_maps {
            self.source_maps = v;
        }
        if let Some(v) = layer.verbose {
            self.verbose = v;
        }
        if let Some(v) = layer.entry_points {
            self.entry_points = v;
        }
        if let Some(v) = layer.transform_command.filter(|c| !c.is_empty()) {
            self.transform_command = Some(v);
        }
        if let Some(v) = layer.runtime {
            self.runtime = v;
        }
        if let Some(v) = layer.runtime_args {
            self.runtime_args = Some(v);
        }
        self
    }

    /// Configured runtime arguments, or the Node flags when the runtime is
    /// `node` and none are configured.
    pub fn effective_runtime_args(&self) -> Vec<String> {
        if let Some(args) = &self.runtime_args {
            return args.clone();
        }
        let is_node = Path::new(&self.runtime)
            .file_stem()
            .is_some_and(|stem| stem == "node");
        if is_node {
            NODE_RUNTIME_ARGS.iter().map(|a| a.to_string()).collect()
        } else {
            Vec::new()
        }
    }

    /// Supervisor settings against the canonical output root. Extra watch
    /// paths are made absolute against the working directory.
    pub fn supervisor_config(&self, output_root: &Path) -> SupervisorConfig {
        SupervisorConfig {
            runtime: self.runtime.clone(),
            runtime_args: self.effective_runtime_args(),
            entry_points: self
                .entry_points
                .iter()
                .map(|e| output_root.join(e))
                .collect(),
            output_root: output_root.to_path_buf(),
            watch_extensions: self.watch_extensions.clone(),
            watch_extra: self
                .watch_extra
                .iter()
                .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
                .collect(),
        }
    }
}
