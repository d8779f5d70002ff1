//! Sidecar SBOM generation via an external scanner command.
//!
//! The scanner is a black box: given a plaintext file path and a target
//! sidecar path, it is expected to write a structured bill-of-materials to
//! the sidecar. The storage engine only records the sidecar path in the
//! object's custom metadata; a failed or missing scanner means the
//! annotation is omitted, never that the upload fails.

use std::path::Path;
use tokio::process::Command;
use tracing::warn;

/// Suffix appended to the object filename for the sidecar artifact.
pub const SIDECAR_SUFFIX: &str = ".sbom.json";

#[derive(Clone)]
pub struct SbomScanner {
    command: Option<String>,
}

impl SbomScanner {
    /// Wrap an external command, invoked as `<command> <input> <sidecar>`.
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    pub fn is_enabled(&self) -> bool {
        self.command.is_some()
    }

    /// Run the scanner against `input`, asking it to write `sidecar`.
    /// Returns the sidecar path on success, `None` on any failure.
    pub async fn scan(&self, input: &Path, sidecar: &Path) -> Option<String> {
        let command = self.command.as_ref()?;
        match Command::new(command).arg(input).arg(sidecar).status().await {
            Ok(status) if status.success() => Some(sidecar.display().to_string()),
            Ok(status) => {
                warn!(
                    "sbom scanner `{}` exited with {} for {}",
                    command,
                    status,
                    input.display()
                );
                None
            }
            Err(err) => {
                warn!(
                    "failed to run sbom scanner `{}` for {}: {}",
                    command,
                    input.display(),
                    err
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn disabled_scanner_yields_no_sidecar() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, b"hello").unwrap();

        let scanner = SbomScanner::new(None);
        assert!(!scanner.is_enabled());
        let sidecar = dir.path().join("a.txt.sbom.json");
        assert!(scanner.scan(&input, &sidecar).await.is_none());
    }

    #[tokio::test]
    async fn failing_scanner_is_a_logged_omission() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, b"hello").unwrap();

        let scanner = SbomScanner::new(Some("false".into()));
        let sidecar = dir.path().join("a.txt.sbom.json");
        assert!(scanner.scan(&input, &sidecar).await.is_none());
    }

    #[tokio::test]
    async fn successful_scanner_returns_sidecar_path() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, b"hello").unwrap();

        // `cp input sidecar` stands in for a real scanner.
        let scanner = SbomScanner::new(Some("cp".into()));
        let sidecar = dir.path().join("a.txt.sbom.json");
        let recorded = scanner.scan(&input, &sidecar).await.unwrap();
        assert_eq!(recorded, sidecar.display().to_string());
        assert!(sidecar.exists());
    }
}
