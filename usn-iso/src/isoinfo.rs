use std::{
    collections::BTreeSet,
    fs::File,
    io,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

use log::{debug, trace};
use types::UsnError;

use crate::{iso_relative_path, missing_file, IsoImage};

const ISOINFO: &str = "isoinfo";

fn isoinfo_error(e: io::Error) -> UsnError {
    if e.kind() == io::ErrorKind::NotFound {
        UsnError::Extraction(String::from(
            "isoinfo not found. Try installing genisoimage.",
        ))
    } else {
        e.into()
    }
}

fn check_output(image: &Path, output: &Output) -> Result<(), UsnError> {
    if output.status.success() {
        return Ok(());
    }

    Err(UsnError::Extraction(format!(
        "isoinfo couldn't read {}: {}",
        image.display(),
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

// `isoinfo -f` lists directories along with files, one absolute path per line. Only the paths
// nothing else is nested under are kept.
fn parse_listing(listing: &str) -> BTreeSet<String> {
    let paths = listing
        .lines()
        .map(|l| iso_relative_path(l.trim()))
        .filter(|l| !l.is_empty())
        .map(ToOwned::to_owned)
        .collect::<BTreeSet<_>>();

    paths
        .iter()
        .filter(|path| {
            let prefix = format!("{path}/");

            !paths
                .range(prefix.clone()..)
                .next()
                .is_some_and(|next| next.starts_with(&prefix))
        })
        .cloned()
        .collect()
}

/// An ISO image read through `isoinfo`, using its Joliet tree
#[derive(Debug)]
pub struct IsoInfoImage {
    path: PathBuf,
    entries: BTreeSet<String>,
}

impl IsoInfoImage {
    /// Opens an ISO image and lists its content
    ///
    /// # Errors
    ///
    /// Returns an error if `isoinfo` isn't available, or if the image can't be read
    pub fn open(path: &Path) -> Result<Self, UsnError> {
        debug!("Listing the content of {}", path.display());

        let output = Command::new(ISOINFO)
            .args(["-J", "-f", "-i"])
            .arg(path.as_os_str())
            .stdin(Stdio::null())
            .output()
            .map_err(isoinfo_error)?;

        check_output(path, &output)?;

        let entries = parse_listing(&String::from_utf8_lossy(&output.stdout));

        if entries.is_empty() {
            return Err(UsnError::Extraction(format!(
                "{} has no content, is it an ISO image?",
                path.display()
            )));
        }

        trace!("Image entries: {entries:?}");

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn extract_command(&self, path: &str) -> Command {
        let mut command = Command::new(ISOINFO);

        command
            .args(["-J", "-i"])
            .arg(self.path.as_os_str())
            .arg("-x")
            .arg(format!("/{}", iso_relative_path(path)))
            .stdin(Stdio::null());

        command
    }
}

impl IsoImage for IsoInfoImage {
    // isoinfo reports success when extracting a file that doesn't exist, so every access is
    // checked against the listing first.
    fn has_file(&self, path: &str) -> Result<bool, UsnError> {
        Ok(self.entries.contains(iso_relative_path(path)))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, UsnError> {
        if !self.has_file(path)? {
            return Err(missing_file(path));
        }

        debug!("Reading {path} from {}", self.path.display());

        let output = self
            .extract_command(path)
            .output()
            .map_err(isoinfo_error)?;

        check_output(&self.path, &output)?;

        Ok(output.stdout)
    }

    fn extract_file(&self, path: &str, dest: &Path) -> Result<(), UsnError> {
        if !self.has_file(path)? {
            return Err(missing_file(path));
        }

        debug!("Extracting {path} to {}", dest.display());

        let output = self
            .extract_command(path)
            .stdout(File::create(dest)?)
            .stderr(Stdio::piped())
            .output()
            .map_err(isoinfo_error)?;

        check_output(&self.path, &output)
    }
}
