use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use super::{TransformError, TransformOutput, Transformer};
use crate::parser::parse_source;

/// Placeholder in command arguments replaced by the source file path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Pipes the source through an external command and uses its stdout as the
/// output code, e.g. `["npx", "babel", "--filename", "{file}"]`.
///
/// The source tree for annotation extraction still comes from tree-sitter; a
/// source the grammar cannot fully parse is left for the command to judge.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    program: String,
    args: Vec<String>,
}

impl CommandTransformer {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    fn run(&self, path: &Path, source: &str) -> Result<String, TransformError> {
        let file = path.display().to_string();
        let args = self.args.iter().map(|a| a.replace(FILE_PLACEHOLDER, &file));

        let spawn_err = |source| TransformError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // stdin is fed from its own thread: the command may fill its stdout
        // pipe before it has read all of its input.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = source.to_owned();
            std::thread::spawn(move || match stdin.write_all(input.as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            })
        });
        let output = child.wait_with_output().map_err(spawn_err)?;
        if let Some(Ok(Err(e))) = writer.map(|w| w.join()) {
            return Err(spawn_err(e));
        }

        if !output.status.success() {
            return Err(TransformError::Command {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Transformer for CommandTransformer {
    fn transform(&self, path: &Path, source: &str) -> Result<TransformOutput, TransformError> {
        let tree = parse_source(path, source)?;
        let code = self.run(path, source)?;
        Ok(TransformOutput {
            code,
            source_map: None,
            tree,
        })
    }
}
