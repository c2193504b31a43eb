//! File staging.
//!
//! The staging manager owns every file a request puts on disk: the staged
//! input and the committed output. It is the only component allowed to delete
//! them, and it never touches a path outside its configured roots.

use crate::config::StagingConfig;
use crate::dispatcher::OutputKind;
use crate::error::{ProtectionError, ProtectionResult};
use crate::request::{validate_file_name, FilePayload};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub retained: Vec<PathBuf>,
    /// Paths refused because they were outside the staging roots.
    pub refused: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Staged input and output locations.
#[derive(Debug, Clone)]
pub struct StagingManager {
    input_root: PathBuf,
    protected_root: PathBuf,
    unprotected_root: PathBuf,
}

impl StagingManager {
    pub fn new(config: &StagingConfig) -> Self {
        Self {
            input_root: config.input_dir.clone(),
            protected_root: config.protected_dir.clone(),
            unprotected_root: config.unprotected_dir.clone(),
        }
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self, kind: OutputKind) -> &Path {
        match kind {
            OutputKind::Protected => &self.protected_root,
            OutputKind::Unprotected => &self.unprotected_root,
        }
    }

    /// All roots staging may write to or delete from.
    pub fn roots(&self) -> [&Path; 3] {
        [&self.input_root, &self.protected_root, &self.unprotected_root]
    }

    /// Write a request payload into the input root.
    pub async fn stage(&self, payload: &FilePayload, declared_name: &str) -> ProtectionResult<PathBuf> {
        stage_in(&self.input_root, payload, declared_name).await
    }

    /// Reserve a free output path for `file_name` under the operation's root.
    ///
    /// The file is created empty so concurrent requests never share a path;
    /// the engine overwrites it on commit.
    pub async fn allocate_output(&self, kind: OutputKind, file_name: &str) -> ProtectionResult<PathBuf> {
        validate_file_name(file_name)?;
        let root = self.output_root(kind);
        fs::create_dir_all(root).await?;

        let mut target = root.join(file_name);
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await
            {
                Ok(_) => return Ok(target),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    target = root.join(prefixed(file_name));
                    debug!(path = %target.display(), "Output name taken, trying prefixed name");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Check a committed output path before it is read back.
    ///
    /// The path must sit under the operation's output root and must not
    /// contain a `..` component.
    pub fn checked_output_path(&self, path: &Path, kind: OutputKind) -> ProtectionResult<PathBuf> {
        let root = self.output_root(kind);
        if has_parent_component(path) || !path.starts_with(root) {
            return Err(ProtectionError::InvalidOutputPath(format!(
                "{} is not under {}",
                path.display(),
                root.display()
            )));
        }
        Ok(path.to_path_buf())
    }

    /// Delete staged files unless retained.
    ///
    /// Each path is handled independently. Failures are logged and reported,
    /// never returned.
    #[instrument(skip(self))]
    pub async fn cleanup(
        &self,
        input: Option<&Path>,
        output: Option<&Path>,
        retain_input: bool,
        retain_output: bool,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        for (path, retain) in [(input, retain_input), (output, retain_output)] {
            if let Some(path) = path {
                self.remove(path, retain, &mut report).await;
            }
        }
        report
    }

    async fn remove(&self, path: &Path, retain: bool, report: &mut CleanupReport) {
        if retain {
            debug!(path = %path.display(), "Retaining staged file");
            report.retained.push(path.to_path_buf());
            return;
        }

        if has_parent_component(path) || !self.roots().iter().any(|root| path.starts_with(root)) {
            warn!(path = %path.display(), "Refusing to delete path outside staging roots");
            report.refused.push(path.to_path_buf());
            return;
        }

        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted staged file");
                report.removed.push(path.to_path_buf());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete staged file");
                report.failed.push(path.to_path_buf());
            }
        }
    }
}

/// Write `payload` to `dir/declared_name`, never overwriting.
///
/// When the name is taken, a random prefix is prepended until a free name
/// is found.
pub async fn stage_in(dir: &Path, payload: &FilePayload, declared_name: &str) -> ProtectionResult<PathBuf> {
    validate_file_name(declared_name)?;
    let bytes = payload.decode()?;

    fs::create_dir_all(dir).await?;

    let mut target = dir.join(declared_name);
    loop {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => {
                fill_staged(file, &target, &bytes).await?;
                debug!(path = %target.display(), size = bytes.len(), "Staged input");
                return Ok(target);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                target = dir.join(prefixed(declared_name));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Write `bytes` to a freshly created staged file.
///
/// On failure the partial file is removed before the error is returned,
/// since the caller never learns its path and cannot clean it up.
async fn fill_staged<W>(mut writer: W, target: &Path, bytes: &[u8]) -> ProtectionResult<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        warn!(path = %target.display(), error = %e, "Staging write failed, discarding partial file");
        match fs::remove_file(target).await {
            Ok(()) => {}
            Err(remove) if remove.kind() == ErrorKind::NotFound => {}
            Err(remove) => {
                warn!(path = %target.display(), error = %remove, "Failed to delete partial staged file")
            }
        }
        return Err(e.into());
    }
    Ok(())
}

fn prefixed(name: &str) -> String {
    format!("{}_{}", Uuid::now_v7().simple(), name)
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    /// Writer that fails every write, as a full disk would.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(ErrorKind::Other, "no space left on device")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn manager(dir: &TempDir) -> StagingManager {
        StagingManager::new(&StagingConfig {
            input_dir: dir.path().join("in"),
            protected_dir: dir.path().join("protected"),
            unprotected_dir: dir.path().join("unprotected"),
            retain_input: false,
            retain_output: false,
            unsupported_extensions: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("upload.docx");
        std::fs::write(&target, b"partial").unwrap();

        let err = fill_staged(FullDisk, &target, b"full document").await.unwrap_err();

        assert!(matches!(err, ProtectionError::Io(_)));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_successful_write_keeps_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("upload.docx");
        let file = fs::File::create(&target).await.unwrap();

        fill_staged(file, &target, b"full document").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"full document");
    }

    #[tokio::test]
    async fn test_stage_twice_yields_distinct_paths() {
        let dir = TempDir::new().unwrap();
        let staging = manager(&dir);

        let first = staging
            .stage(&FilePayload::Bytes(b"one".to_vec()), "a.txt")
            .await
            .unwrap();
        let second = staging
            .stage(&FilePayload::Encoded("dHdv".to_string()), "a.txt")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(first.file_name().unwrap(), "a.txt");
        assert!(second.file_name().unwrap().to_str().unwrap().ends_with("_a.txt"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_stage_rejects_traversal_without_writing() {
        let dir = TempDir::new().unwrap();
        let staging = manager(&dir);

        let err = staging
            .stage(&FilePayload::Bytes(b"x".to_vec()), "../escape.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, ProtectionError::Validation(_)));
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!dir.path().join("in").exists());
    }

    #[tokio::test]
    async fn test_allocate_output_avoids_existing_file() {
        let dir = TempDir::new().unwrap();
        let staging = manager(&dir);

        let first = staging
            .allocate_output(OutputKind::Protected, "a_protected.txt")
            .await
            .unwrap();
        assert_eq!(first, dir.path().join("protected").join("a_protected.txt"));

        std::fs::write(&first, b"taken").unwrap();
        let second = staging
            .allocate_output(OutputKind::Protected, "a_protected.txt")
            .await
            .unwrap();
        assert_ne!(first, second);
        assert!(second.starts_with(dir.path().join("protected")));
    }

    #[test]
    fn test_checked_output_path() {
        let dir = TempDir::new().unwrap();
        let staging = manager(&dir);
        let root = dir.path().join("protected");

        assert!(staging
            .checked_output_path(&root.join("a.txt"), OutputKind::Protected)
            .is_ok());
        assert!(matches!(
            staging.checked_output_path(&root.join("a.txt"), OutputKind::Unprotected),
            Err(ProtectionError::InvalidOutputPath(_))
        ));
        assert!(matches!(
            staging.checked_output_path(&root.join("..").join("a.txt"), OutputKind::Protected),
            Err(ProtectionError::InvalidOutputPath(_))
        ));

        // Prefix match is per component, not per character
        let sibling = dir.path().join("protected-other").join("a.txt");
        assert!(staging
            .checked_output_path(&sibling, OutputKind::Protected)
            .is_err());
    }

    #[tokio::test]
    async fn test_cleanup_respects_retention() {
        let dir = TempDir::new().unwrap();
        let staging = manager(&dir);

        let input = staging
            .stage(&FilePayload::Bytes(b"in".to_vec()), "doc.txt")
            .await
            .unwrap();
        let output = staging
            .allocate_output(OutputKind::Protected, "doc_protected.txt")
            .await
            .unwrap();
        std::fs::write(&output, b"out").unwrap();

        let report = staging
            .cleanup(Some(&input), Some(&output), false, true)
            .await;

        assert!(!input.exists());
        assert!(output.exists());
        assert_eq!(report.removed, vec![input]);
        assert_eq!(report.retained, vec![output]);
    }

    #[tokio::test]
    async fn test_cleanup_refuses_paths_outside_roots() {
        let dir = TempDir::new().unwrap();
        let staging = manager(&dir);

        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, b"keep").unwrap();
        let sneaky = dir.path().join("in").join("..").join("keep.txt");

        let report = staging.cleanup(Some(&outside), Some(&sneaky), false, false).await;

        assert!(outside.exists());
        assert_eq!(report.refused.len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_of_missing_files_is_quiet() {
        let dir = TempDir::new().unwrap();
        let staging = manager(&dir);
        let missing = dir.path().join("in").join("gone.txt");

        let report = staging.cleanup(Some(&missing), None, false, false).await;
        assert_eq!(report, CleanupReport::default());
    }
}
