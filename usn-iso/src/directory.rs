use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use types::UsnError;

use crate::{iso_relative_path, missing_file, IsoImage};

/// An image whose content is already available as a directory tree, either extracted or mounted
#[derive(Debug)]
pub struct DirectoryImage {
    root: PathBuf,
}

impl DirectoryImage {
    /// Opens a directory as an image
    ///
    /// # Errors
    ///
    /// Returns an error if the path isn't a directory
    pub fn open(root: &Path) -> Result<Self, UsnError> {
        if !root.is_dir() {
            return Err(UsnError::Extraction(format!(
                "{} isn't a directory",
                root.display()
            )));
        }

        debug!("Reading image content from {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn host_path(&self, path: &str) -> PathBuf {
        self.root.join(iso_relative_path(path))
    }
}

impl IsoImage for DirectoryImage {
    fn has_file(&self, path: &str) -> Result<bool, UsnError> {
        Ok(self.host_path(path).is_file())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, UsnError> {
        fs::read(self.host_path(path)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                missing_file(path)
            } else {
                e.into()
            }
        })
    }

    fn extract_file(&self, path: &str, dest: &Path) -> Result<(), UsnError> {
        if !self.has_file(path)? {
            return Err(missing_file(path));
        }

        debug!("Copying {path} to {}", dest.display());

        fs::copy(self.host_path(path), dest)?;
        Ok(())
    }
}
