use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use bootcfg::BootloaderConfig;
use log::{debug, error, info};
use types::UsnError;

const STAGING_DIR_NAME: &str = "ubuntu-installer";

/// The netboot tree being assembled
///
/// Until [`StagingTree::persist`] is called, dropping the tree removes it: the staging directory
/// if the user provided the output directory, the whole temporary directory otherwise.
#[derive(Debug)]
pub(crate) struct StagingTree {
    dir: PathBuf,
    cleanup: Option<PathBuf>,
}

impl StagingTree {
    pub(crate) fn create(out_dir: Option<&Path>) -> Result<Self, UsnError> {
        if let Some(root) = out_dir {
            fs::create_dir_all(root)?;

            let dir = root.join(STAGING_DIR_NAME);
            fs::create_dir(&dir)?;

            return Ok(Self {
                cleanup: Some(dir.clone()),
                dir,
            });
        }

        let root = tempfile::Builder::new()
            .prefix("ubuntu-server-netboot.")
            .tempdir()?
            .keep();

        let tree = Self {
            dir: root.join(STAGING_DIR_NAME),
            cleanup: Some(root),
        };

        fs::create_dir(&tree.dir)?;
        Ok(tree)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn join(&self, path: &str) -> PathBuf {
        self.dir.join(path)
    }

    pub(crate) fn copy_host_file(&self, src: &Path, package: &str) -> Result<PathBuf, UsnError> {
        let file_name = src.file_name().ok_or_else(|| {
            UsnError::Config(format!("{} isn't a file path", src.display()))
        })?;
        let dest = self.dir.join(file_name);

        debug!("Copying {} to {}", src.display(), dest.display());

        fs::copy(src, &dest).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} not found. Try installing {package}.", src.display()),
                )
            } else {
                e
            }
        })?;

        Ok(dest)
    }

    pub(crate) fn write_config(&self, cfg: &BootloaderConfig) -> Result<PathBuf, UsnError> {
        let path = self.join(cfg.kind().config_path());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("Writing {}", path.display());

        fs::write(&path, cfg.as_str())?;
        Ok(path)
    }

    /// Checks that every file loaded by the given configurations is part of the tree
    pub(crate) fn verify(&self, configs: &[BootloaderConfig]) -> Result<(), UsnError> {
        for cfg in configs {
            for file in cfg.referenced_files() {
                let inside = Path::new(&file)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));

                if !inside || !self.join(&file).is_file() {
                    return Err(UsnError::Extraction(format!(
                        "{} loads {file}, which is missing from the netboot tree",
                        cfg.kind().config_path()
                    )));
                }
            }
        }

        Ok(())
    }

    pub(crate) fn persist(mut self) -> PathBuf {
        self.cleanup = None;
        self.dir.clone()
    }
}

impl Drop for StagingTree {
    fn drop(&mut self) {
        if let Some(dir) = self.cleanup.take() {
            info!("Cleaning up {}", dir.display());

            if let Err(e) = fs::remove_dir_all(&dir) {
                error!("Couldn't remove {}: {e}", dir.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use bootcfg::BootloaderConfig;
    use tempfile::TempDir;
    use test_log::test;
    use types::UsnError;

    use crate::tree::StagingTree;

    #[test]
    fn test_out_dir_cleanup() {
        let out = TempDir::new().unwrap();

        let tree = StagingTree::create(Some(out.path())).unwrap();
        assert_eq!(tree.path(), out.path().join("ubuntu-installer"));
        assert!(tree.path().is_dir());

        drop(tree);
        assert!(out.path().exists());
        assert!(!out.path().join("ubuntu-installer").exists());
    }

    #[test]
    fn test_out_dir_persist() {
        let out = TempDir::new().unwrap();

        let path = StagingTree::create(Some(out.path())).unwrap().persist();
        assert!(path.is_dir());
    }

    #[test]
    fn test_existing_staging_dir_kept() {
        let out = TempDir::new().unwrap();
        let existing = out.path().join("ubuntu-installer");
        fs::create_dir(&existing).unwrap();
        fs::write(existing.join("keep-me"), b"").unwrap();

        let err = StagingTree::create(Some(out.path())).unwrap_err();
        assert!(matches!(err, UsnError::Filesystem(_)));
        assert!(existing.join("keep-me").exists());
    }

    #[test]
    fn test_temporary_root_cleanup() {
        let tree = StagingTree::create(None).unwrap();
        let root = tree.path().parent().unwrap().to_path_buf();
        assert!(root.is_dir());

        drop(tree);
        assert!(!root.exists());
    }

    #[test]
    fn test_missing_host_file() {
        let out = TempDir::new().unwrap();
        let tree = StagingTree::create(Some(out.path())).unwrap();

        let err = tree
            .copy_host_file(&out.path().join("pxelinux.0"), "pxelinux")
            .unwrap_err();

        let UsnError::Filesystem(e) = err else {
            panic!("Unexpected error {err:?}");
        };
        assert!(e.to_string().contains("Try installing pxelinux."));
    }

    #[test]
    fn test_verify_missing_reference() {
        let out = TempDir::new().unwrap();
        let tree = StagingTree::create(Some(out.path())).unwrap();
        let cfg = BootloaderConfig::pxelinux();
        tree.write_config(&cfg).unwrap();

        fs::create_dir(tree.join("casper")).unwrap();
        fs::write(tree.join("casper/vmlinuz"), b"kernel").unwrap();

        let err = tree.verify(&[cfg.clone()]).unwrap_err();
        assert!(matches!(err, UsnError::Extraction(_)));

        fs::write(tree.join("casper/initrd"), b"initrd").unwrap();
        tree.verify(&[cfg]).unwrap();
        assert!(tree.join("pxelinux.cfg/default").is_file());
    }

    #[test]
    fn test_verify_reference_outside_tree() {
        let out = TempDir::new().unwrap();
        let tree = StagingTree::create(Some(out.path())).unwrap();
        fs::write(out.path().join("vmlinuz"), b"kernel").unwrap();

        let cfg = BootloaderConfig::grub("linux /../vmlinuz ---\n");

        let err = tree.verify(&[cfg]).unwrap_err();
        assert!(matches!(err, UsnError::Extraction(_)));
    }
}
