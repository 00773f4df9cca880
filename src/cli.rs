use std::path::PathBuf;

use clap::Parser;

use mirrorwatch::config::PartialConfig;

/// Mirror a source directory into an output directory, compiling scripts and
/// copying everything else, then keep it in sync and run the result.
///
/// Settings come from flags, then `mirrorwatch.toml` in the working
/// directory, then built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "mirrorwatch", version, about, long_about = None)]
pub struct Cli {
    /// Scripts to run from the output directory [default: index.js].
    pub entry_points: Vec<String>,

    /// Source directory [default: src].
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Output directory, cleared on start [default: dist].
    #[arg(long)]
    pub dist: Option<PathBuf>,

    /// Skip files and directories whose name starts with a dot.
    #[arg(long)]
    pub ignore_dot_files: bool,

    /// Glob patterns of source paths to skip (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Extensions to compile; others are copied (comma-separated) [default: js,jsx].
    #[arg(long, value_delimiter = ',')]
    pub compile_extensions: Vec<String>,

    /// Output extensions that restart the entry points (comma-separated) [default: js,ejs].
    #[arg(long, value_delimiter = ',')]
    pub watch_extensions: Vec<String>,

    /// Extra paths that restart the entry points (comma-separated) [default: .env].
    #[arg(long, value_delimiter = ',')]
    pub watch_extra: Vec<PathBuf>,

    /// Do not write `.map` files.
    #[arg(long)]
    pub no_source_maps: bool,

    /// Only log warnings and errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// External transformer reading source on stdin, e.g. "babel --filename {file}".
    #[arg(long)]
    pub transform_cmd: Option<String>,

    /// Program used to run entry points [default: node].
    #[arg(long)]
    pub runtime: Option<String>,

    /// Argument passed to the runtime before the entry point (repeatable).
    /// Replaces the default node flags.
    #[arg(long = "runtime-arg", allow_hyphen_values = true)]
    pub runtime_args: Vec<String>,

    /// Config file to read instead of ./mirrorwatch.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Build once and exit without watching or running anything.
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// The settings given on the command line, as the top config layer.
    pub fn overrides(&self) -> PartialConfig {
        fn non_empty<T: Clone>(v: &[T]) -> Option<Vec<T>> {
            (!v.is_empty()).then(|| v.to_vec())
        }

        PartialConfig {
            src: self.src.clone(),
            dist: self.dist.clone(),
            ignore_dot_files: self.ignore_dot_files.then_some(true),
            ignore: non_empty(&self.ignore),
            compile_extensions: non_empty(&self.compile_extensions),
            watch_extensions: non_empty(&self.watch_extensions),
            watch_extra: non_empty(&self.watch_extra),
            source_maps: self.no_source_maps.then_some(false),
            verbose: self.quiet.then_some(false),
            entry_points: non_empty(&self.entry_points),
            transform_command: self
                .transform_cmd
                .as_deref()
                .map(|cmd| cmd.split_whitespace().map(str::to_string).collect()),
            runtime: self.runtime.clone(),
            runtime_args: non_empty(&self.runtime_args),
        }
    }
}
