//! Scratch-directory management for transcode operations.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory for one probe/segment/reencode run. Segment and
/// reencode output is written under [`Workspace::temp_dir`]; the workspace
/// (and its directory) is dropped once the coordinator has read the output,
/// nothing is moved back over the original input.
pub struct Workspace {
    temp_dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Create a new workspace for processing a file.
    pub fn new<P: AsRef<Path>>(input: P) -> Result<Self> {
        let input = input.as_ref();
        let temp_dir = TempDir::new().map_err(|e| Error::Workspace(e.to_string()))?;

        let input_path = input.to_path_buf();

        // Output will be named same as input, in temp dir initially
        let file_name = input
            .file_name()
            .ok_or_else(|| Error::InvalidInput("Invalid input file path".to_string()))?;
        let output_path = temp_dir.path().join(file_name);

        Ok(Self {
            temp_dir,
            input_path,
            output_path,
        })
    }

    /// Get the input file path.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Get the output file path.
    pub fn output(&self) -> &Path {
        &self.output_path
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a temp file path with the given name.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_workspace_paths() {
        let temp_file = NamedTempFile::new().unwrap();
        let workspace = Workspace::new(temp_file.path()).unwrap();

        assert_eq!(workspace.input(), temp_file.path());
        assert!(workspace.output().starts_with(workspace.temp_dir()));
        assert_eq!(workspace.output().file_name(), temp_file.path().file_name());
    }

    #[test]
    fn test_temp_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let workspace = Workspace::new(temp_file.path()).unwrap();

        let intermediate = workspace.temp_file("test.hevc");
        assert!(intermediate.starts_with(workspace.temp_dir()));
        assert_eq!(intermediate.file_name().unwrap(), "test.hevc");
    }
}
