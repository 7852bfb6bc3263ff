use std::{
    io::BufWriter,
    path::{Path, PathBuf},
};

use fetch::{default_cache_dir, url_file_name, Fetcher};
use log::{debug, info, warn};
use tempfile::NamedTempFile;
use types::UsnError;
use url::Url;

#[derive(Debug)]
pub(crate) enum ImageSource {
    Local(PathBuf),
    Remote(Url),
}

impl ImageSource {
    pub(crate) fn from_args(url: Option<&str>, iso: Option<&Path>) -> Result<Self, UsnError> {
        match (url, iso) {
            (None, None) => Err(UsnError::Config(String::from(
                "Either --url or --iso is required",
            ))),
            (url, Some(iso)) => {
                if let Some(url) = url.and_then(|u| Url::parse(u).ok()) {
                    let remote_name = url_file_name(&url).ok();
                    let local_name = iso.file_name().and_then(|n| n.to_str());

                    if iso.extension().is_some() && remote_name != local_name {
                        warn!(
                            "{} and {url} don't look like the same image, the installer will download the latter",
                            iso.display()
                        );
                    }
                }

                Ok(Self::Local(iso.to_path_buf()))
            }
            (Some(url), None) => Ok(Self::Remote(Url::parse(url)?)),
        }
    }

    pub(crate) fn acquire(
        &self,
        fetcher: &Fetcher,
        cache: bool,
    ) -> Result<AcquiredImage, UsnError> {
        match self {
            Self::Local(path) => {
                if !path.exists() {
                    return Err(UsnError::Config(format!("{} doesn't exist", path.display())));
                }

                debug!("Using local image {}", path.display());

                Ok(AcquiredImage {
                    path: path.clone(),
                    _download: None,
                })
            }
            Self::Remote(url) if cache => Ok(AcquiredImage {
                path: fetcher.download_cached(url, &default_cache_dir()?)?,
                _download: None,
            }),
            Self::Remote(url) => {
                info!("Downloading {url}");

                let mut file = tempfile::Builder::new()
                    .prefix("ubuntu-server-netboot.")
                    .suffix(".iso")
                    .tempfile()?;

                fetcher.download(url, &mut BufWriter::new(file.as_file_mut()))?;

                Ok(AcquiredImage {
                    path: file.path().to_path_buf(),
                    _download: Some(file),
                })
            }
        }
    }
}

/// A readable image. Temporary downloads are removed when dropped.
#[derive(Debug)]
pub(crate) struct AcquiredImage {
    path: PathBuf,
    _download: Option<NamedTempFile>,
}

impl AcquiredImage {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
