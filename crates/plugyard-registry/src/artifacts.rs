//! Artifact storage: per-uploader staging and permanent version storage.
//!
//! [`LocalArtifactStore`] keeps both on the local filesystem.
//!
//! Layout:
//! ```text
//! <staging>/
//!   <uploader>/
//!     <file>                         staged, not yet published
//! <artifacts>/
//!   <owner>/<project>/versions/
//!     <version>/
//!       <PLATFORM>/
//!         <file>                     published copy per platform
//! ```

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use plugyard_core::{is_path_safe, Platform};
use tracing::debug;
use uuid::Uuid;

use crate::error::{RegistryError, Result};

/// Storage for staged and published artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Write `reader` into the uploader's staging area as `file_name`,
    /// replacing any earlier upload of the same name.
    fn stage(&self, uploader: &str, file_name: &str, reader: &mut dyn Read) -> io::Result<PathBuf>;

    /// Where `file_name` lives in the uploader's staging area.
    fn staged_path(&self, uploader: &str, file_name: &str) -> PathBuf;

    /// Open a stored file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Copy a staged file into permanent storage for one platform,
    /// overwriting an existing copy. Returns the permanent path.
    fn relocate(
        &self,
        staged: &Path,
        owner: &str,
        project: &str,
        version: &str,
        platform: Platform,
    ) -> Result<PathBuf>;

    fn exists(&self, path: &Path) -> bool;

    /// Remove a file. Removing a missing file is not an error.
    fn delete(&self, path: &Path) -> io::Result<()>;
}

/// Filesystem-backed artifact store.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    staging_root: PathBuf,
    artifact_root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(staging_root: impl Into<PathBuf>, artifact_root: impl Into<PathBuf>) -> Self {
        LocalArtifactStore {
            staging_root: staging_root.into(),
            artifact_root: artifact_root.into(),
        }
    }

    /// Directory holding all platform copies of one version.
    pub fn version_dir(&self, owner: &str, project: &str, version: &str) -> Result<PathBuf> {
        Ok(self
            .artifact_root
            .join(component(owner)?)
            .join(component(project)?)
            .join("versions")
            .join(component(version)?))
    }
}

fn component(name: &str) -> Result<&str> {
    if is_path_safe(name) {
        Ok(name)
    } else {
        Err(RegistryError::InvalidName {
            name: name.to_string(),
        })
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn stage(&self, uploader: &str, file_name: &str, reader: &mut dyn Read) -> io::Result<PathBuf> {
        let invalid = |e: RegistryError| io::Error::new(io::ErrorKind::InvalidInput, e);
        let dir = self.staging_root.join(component(uploader).map_err(invalid)?);
        let file_name = component(file_name).map_err(invalid)?;
        fs::create_dir_all(&dir)?;

        // Each upload writes its own temp file; the rename makes the last
        // finished upload win without interleaving bytes.
        let part = dir.join(format!(".{file_name}.{}.part", Uuid::new_v4()));
        let dest = dir.join(file_name);
        let written = (|| -> io::Result<()> {
            let mut file = File::create(&part)?;
            io::copy(reader, &mut file)?;
            file.flush()?;
            file.sync_all()?;
            fs::rename(&part, &dest)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&part);
            return Err(e);
        }

        debug!(uploader, path = %dest.display(), "staged upload");
        Ok(dest)
    }

    fn staged_path(&self, uploader: &str, file_name: &str) -> PathBuf {
        self.staging_root.join(uploader).join(file_name)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(io::BufReader::new(File::open(path)?)))
    }

    fn relocate(
        &self,
        staged: &Path,
        owner: &str,
        project: &str,
        version: &str,
        platform: Platform,
    ) -> Result<PathBuf> {
        let file_name = staged.file_name().ok_or_else(|| RegistryError::NotRelocated {
            path: staged.to_path_buf(),
        })?;
        let dest = self
            .version_dir(owner, project, version)?
            .join(platform.dir_name())
            .join(file_name);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(staged, &dest)?;
        if !dest.is_file() {
            return Err(RegistryError::NotRelocated { path: dest });
        }
        debug!(path = %dest.display(), "relocated artifact");
        Ok(dest)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> LocalArtifactStore {
        LocalArtifactStore::new(root.join("staging"), root.join("plugins"))
    }

    #[test]
    fn stage_creates_uploader_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());

        let path = artifacts
            .stage("alice", "gadget.jar", &mut &b"jar bytes"[..])
            .unwrap();
        assert_eq!(path, dir.path().join("staging/alice/gadget.jar"));
        assert_eq!(fs::read(&path).unwrap(), b"jar bytes");
        assert_eq!(artifacts.staged_path("alice", "gadget.jar"), path);

        let mut read_back = Vec::new();
        artifacts.open(&path).unwrap().read_to_end(&mut read_back).unwrap();
        assert_eq!(read_back, b"jar bytes");
    }

    #[test]
    fn restage_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());

        artifacts.stage("alice", "g.jar", &mut &b"first"[..]).unwrap();
        let path = artifacts.stage("alice", "g.jar", &mut &b"second"[..]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");

        let entries: Vec<_> = fs::read_dir(dir.path().join("staging/alice"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("g.jar")]);
    }

    #[test]
    fn failed_read_leaves_nothing_staged() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("connection reset"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());
        assert!(artifacts.stage("alice", "g.jar", &mut Broken).is_err());
        assert!(!artifacts.exists(&artifacts.staged_path("alice", "g.jar")));
        assert_eq!(fs::read_dir(dir.path().join("staging/alice")).unwrap().count(), 0);
    }

    #[test]
    fn relocate_per_platform() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());
        let staged = artifacts.stage("alice", "g.jar", &mut &b"data"[..]).unwrap();

        let paper = artifacts
            .relocate(&staged, "alice", "Gadget", "1.0", Platform::Paper)
            .unwrap();
        let velocity = artifacts
            .relocate(&staged, "alice", "Gadget", "1.0", Platform::Velocity)
            .unwrap();

        assert_eq!(
            paper,
            dir.path().join("plugins/alice/Gadget/versions/1.0/PAPER/g.jar")
        );
        assert!(artifacts.exists(&paper));
        assert!(artifacts.exists(&velocity));
        assert!(artifacts.exists(&staged));
    }

    #[test]
    fn traversing_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());

        let err = artifacts.stage("..", "g.jar", &mut &b"data"[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = artifacts.stage("alice", "../g.jar", &mut &b"data"[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!dir.path().join("g.jar").exists());

        let staged = artifacts.stage("alice", "g.jar", &mut &b"data"[..]).unwrap();
        for (owner, project, version) in [
            ("alice", "Gadget", ".."),
            ("alice", "..", "1.0"),
            ("../..", "Gadget", "1.0"),
            ("alice", "Gadget", "1.0/../.."),
        ] {
            let err = artifacts
                .relocate(&staged, owner, project, version, Platform::Paper)
                .unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidName { .. }),
                "{owner}/{project}/{version}"
            );
        }
        assert!(!dir.path().join("plugins").exists());
    }

    #[test]
    fn relocate_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());
        let staged = artifacts.stage("alice", "g.jar", &mut &b"old"[..]).unwrap();
        artifacts
            .relocate(&staged, "alice", "Gadget", "1.0", Platform::Paper)
            .unwrap();

        let staged = artifacts.stage("alice", "g.jar", &mut &b"new"[..]).unwrap();
        let dest = artifacts
            .relocate(&staged, "alice", "Gadget", "1.0", Platform::Paper)
            .unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"new");
    }

    #[test]
    fn relocate_missing_source_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());
        let err = artifacts
            .relocate(
                &dir.path().join("staging/alice/none.jar"),
                "alice",
                "Gadget",
                "1.0",
                Platform::Paper,
            )
            .unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = store(dir.path());
        artifacts.delete(&dir.path().join("nothing")).unwrap();
    }
}
