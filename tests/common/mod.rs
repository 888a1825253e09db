#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a metadata document as pretty JSON and returns its path.
    pub fn write_metadata(&self, name: &str, document: &serde_json::Value) -> PathBuf {
        self.write(
            name,
            &serde_json::to_string_pretty(document).expect("serialise metadata"),
        )
    }
}

/// Runs a full validation of the metadata file with small batches so the
/// worker pool actually exercises multi-batch folding.
pub fn validate_file(metadata_path: &Path) -> csvw_validate::report::WarningsAndErrors {
    let options = csvw_validate::table::PipelineOptions {
        row_grouping: 2,
        parallelism: 2,
    };
    csvw_validate::validate::validate_source(
        metadata_path.to_str().expect("utf-8 path"),
        None,
        &csvw_validate::fetch::DefaultByteSource,
        &options,
    )
    .expect("validation run")
}

/// Collects the `type` fields of a finding list for compact assertions.
pub fn kinds(issues: &[csvw_validate::report::Issue]) -> Vec<&str> {
    issues.iter().map(|issue| issue.kind.as_str()).collect()
}
