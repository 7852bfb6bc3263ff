#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

use core::time::Duration;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};
use reqwest::{
    blocking::{Client, Response},
    header::CONTENT_LENGTH,
};
use types::{Architecture, Release, UsnError};
use url::Url;

mod progress;
use progress::ProgressReader;

const ARCHIVE_MIRROR_URL_STR: &str = "http://archive.ubuntu.com/ubuntu";
const PORTS_MIRROR_URL_STR: &str = "http://ports.ubuntu.com/ubuntu-ports";

const CACHE_DIR_NAME: &str = "ubuntu-server-netboot";

/// The Ubuntu archive mirrors to fetch bootloaders from
#[derive(Clone, Debug, PartialEq)]
pub struct Mirrors {
    /// Mirror serving the primary architectures (amd64 and i386)
    pub archive: Url,

    /// Mirror serving every other architecture
    pub ports: Url,
}

impl Mirrors {
    /// Returns the mirror serving the given architecture
    #[must_use]
    pub fn select(&self, arch: Architecture) -> &Url {
        if arch.is_primary_archive() {
            &self.archive
        } else {
            &self.ports
        }
    }
}

impl Default for Mirrors {
    fn default() -> Self {
        Self {
            archive: Url::parse(ARCHIVE_MIRROR_URL_STR).expect("Static URL is valid"),
            ports: Url::parse(PORTS_MIRROR_URL_STR).expect("Static URL is valid"),
        }
    }
}

/// Returns the name of the network GRUB binary for the given architecture, if it has one
#[must_use]
pub fn bootloader_file_name(arch: Architecture) -> Option<String> {
    arch.uefi_abbrev().map(|abbrev| format!("grubnet{abbrev}.efi"))
}

/// Returns the candidate URLs of the signed network GRUB binary, in lookup order
///
/// # Errors
///
/// Returns an error if the mirror URL can't be extended into a valid URL
pub fn bootloader_urls(
    mirrors: &Mirrors,
    release: &Release,
    arch: Architecture,
) -> Result<Vec<Url>, UsnError> {
    let Some(abbrev) = arch.uefi_abbrev() else {
        return Ok(Vec::new());
    };

    let mirror = mirrors.select(arch).as_str().trim_end_matches('/');

    release
        .pockets()
        .iter()
        .map(|pocket| {
            Url::parse(&format!(
                "{mirror}/dists/{pocket}/main/uefi/grub2-{arch}/current/grubnet{abbrev}.efi.signed"
            ))
            .map_err(UsnError::from)
        })
        .collect()
}

/// Returns the directory downloaded images are cached into
///
/// # Errors
///
/// Returns an error if the user cache directory can't be determined or created
pub fn default_cache_dir() -> Result<PathBuf, UsnError> {
    Ok(xdg::BaseDirectories::new()
        .map_err(<xdg::BaseDirectoriesError as Into<io::Error>>::into)?
        .create_cache_directory(CACHE_DIR_NAME)?)
}

fn content_length(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Returns the last path segment of a URL, used to name local copies
///
/// # Errors
///
/// Returns an error if the URL doesn't end with a file name
pub fn url_file_name(url: &Url) -> Result<&str, UsnError> {
    url.path_segments()
        .and_then(Iterator::last)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| UsnError::Config(format!("{url} doesn't point to a file")))
}

/// Blocking HTTP client used for every download of a run
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a new Fetcher
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client can't be initialized
    pub fn new() -> Result<Self, UsnError> {
        // Images are several GiB, the blocking client's default 30s total timeout would abort them
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Option::<Duration>::None)
            .build()?;

        Ok(Self { client })
    }

    fn get(&self, url: &Url) -> Result<Response, UsnError> {
        debug!("GET {url}");

        let resp = self.client.get(url.clone()).send()?;

        debug!("{url} returned {}", resp.status());

        Ok(resp)
    }

    fn copy_body(resp: Response, name: &str, out: &mut impl Write) -> Result<u64, UsnError> {
        let total = content_length(&resp);
        let mut reader = ProgressReader::new(resp, name, total);

        io::copy(&mut reader, out)?;
        out.flush()?;

        Ok(reader.bytes_read())
    }

    /// Downloads the given URL into a writer, logging progress along the way
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, if the server doesn't return a success status,
    /// or if writing fails.
    pub fn download(&self, url: &Url, out: &mut impl Write) -> Result<u64, UsnError> {
        let resp = self.get(url)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UsnError::Download(format!("{url} returned {status}")));
        }

        let name = url_file_name(url).unwrap_or(url.as_str()).to_owned();
        let size = Self::copy_body(resp, &name, out)?;

        info!("Downloaded {name} ({size} bytes)");

        Ok(size)
    }

    fn try_from_cache(&self, url: &Url, path: &Path) -> Result<bool, UsnError> {
        if !path.exists() {
            return Ok(false);
        }

        debug!("File already exists, checking its size");

        let local_size = path.metadata()?.len();

        let resp = self.client.head(url.clone()).send()?;
        if !resp.status().is_success() {
            debug!("{url} returned {} on HEAD", resp.status());
            return Ok(false);
        }

        match content_length(&resp) {
            Some(remote_size) if remote_size == local_size => Ok(true),
            Some(remote_size) => {
                info!(
                    "Cached copy {} is {local_size} bytes, {remote_size} expected. Downloading again.",
                    path.display()
                );
                Ok(false)
            }
            None => {
                debug!("Server didn't report a length, can't validate the cache");
                Ok(false)
            }
        }
    }

    /// Downloads the given URL into a cache directory, reusing a previous download if its size
    /// matches the remote file
    ///
    /// # Errors
    ///
    /// Returns an error if the URL doesn't point to a file, if the connection fails, or if
    /// there's any error accessing the local file.
    pub fn download_cached(&self, url: &Url, cache_dir: &Path) -> Result<PathBuf, UsnError> {
        let file_path = cache_dir.join(url_file_name(url)?);
        debug!("Cache File Path {}", file_path.display());

        if self.try_from_cache(url, &file_path)? {
            info!("Using cached copy {}", file_path.display());
            return Ok(file_path);
        }

        fs::create_dir_all(cache_dir)?;

        let partial_path = file_path.with_extension("part");
        let mut partial = BufWriter::new(File::create(&partial_path)?);

        info!("Downloading {url}");
        if let Err(e) = self.download(url, &mut partial) {
            drop(partial);

            if let Err(err) = fs::remove_file(&partial_path) {
                debug!("Couldn't remove {}: {err}", partial_path.display());
            }

            return Err(e);
        }

        drop(partial);
        fs::rename(&partial_path, &file_path)?;

        Ok(file_path)
    }

    /// Downloads the signed network GRUB binary for the given release and architecture into
    /// `destdir`, trying the updates pocket first.
    ///
    /// Returns `None` if the architecture doesn't boot through a network GRUB.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, if no pocket provides the binary, or if the file
    /// can't be written.
    pub fn fetch_bootloader(
        &self,
        mirrors: &Mirrors,
        release: &Release,
        arch: Architecture,
        destdir: &Path,
    ) -> Result<Option<PathBuf>, UsnError> {
        let Some(file_name) = bootloader_file_name(arch) else {
            info!("No network bootloader for {arch}, skipping");
            return Ok(None);
        };

        let outfile = destdir.join(&file_name);

        let mut last_url = None;
        for url in bootloader_urls(mirrors, release, arch)? {
            info!("Attempting to download {url}");

            let resp = self.get(&url)?;
            if !resp.status().is_success() {
                debug!("{url} returned {}, trying the next pocket", resp.status());
                last_url = Some(url);
                continue;
            }

            let mut out = BufWriter::new(File::create(&outfile)?);
            Self::copy_body(resp, &file_name, &mut out)?;

            return Ok(Some(outfile));
        }

        Err(UsnError::Download(format!(
            "Could not download {}",
            last_url.map_or_else(|| file_name.clone(), String::from)
        )))
    }
}
