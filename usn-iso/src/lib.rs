#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

use core::fmt;
use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use serde::Deserialize;
use types::{Architecture, Release, UsnError};

mod directory;
mod disk_info;
mod isoinfo;
mod mount;

pub use directory::DirectoryImage;
pub use disk_info::DiskInfo;
pub use isoinfo::IsoInfoImage;
pub use mount::MountedImage;

const DISK_INFO_PATH: &str = "/.disk/info";
const GRUB_CFG_PATH: &str = "/boot/grub/grub.cfg";
const KERNEL_PATH: &str = "/casper/vmlinuz";
const INITRD_PATH: &str = "/casper/initrd";
const HWE_KERNEL_PATH: &str = "/casper/hwe-vmlinuz";
const HWE_INITRD_PATH: &str = "/casper/hwe-initrd";

pub(crate) fn iso_relative_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

pub(crate) fn missing_file(path: &str) -> UsnError {
    UsnError::Extraction(format!("{path} not found on Ubuntu Server ISO"))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Read-only access to the files of an image
pub trait IsoImage: fmt::Debug {
    /// Whether the image contains a regular file at the given absolute path
    ///
    /// # Errors
    ///
    /// Returns an error if the image can't be accessed
    fn has_file(&self, path: &str) -> Result<bool, UsnError>;

    /// Returns the content of a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, or if it can't be read
    fn read_file(&self, path: &str) -> Result<Vec<u8>, UsnError>;

    /// Copies a file out of the image
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, or if it can't be read or written
    fn extract_file(&self, path: &str, dest: &Path) -> Result<(), UsnError> {
        if !self.has_file(path)? {
            return Err(missing_file(path));
        }

        fs::write(dest, self.read_file(path)?)?;
        Ok(())
    }
}

/// The way ISO files are read
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Extractor {
    /// Read the image with `isoinfo`
    #[default]
    #[value(name = "isoinfo")]
    IsoInfo,

    /// Attach the image to a loop device and mount it
    Mount,
}

/// Hardware Enablement kernel shipped next to the default one
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HweArtifacts {
    /// Path to the extracted HWE kernel
    pub kernel: PathBuf,

    /// Path to the extracted HWE initrd
    pub initrd: PathBuf,
}

/// The files extracted from an image
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtractedArtifacts {
    /// Path to the extracted kernel
    pub kernel: PathBuf,

    /// Path to the extracted initial ramdisk
    pub initrd: PathBuf,

    /// HWE kernel and initrd, if the image ships them
    pub hwe: Option<HweArtifacts>,

    /// The image's GRUB configuration
    pub grub_cfg: String,
}

/// An Ubuntu Server Live image
#[derive(Debug)]
pub struct ServerLiveIso {
    image: Box<dyn IsoImage>,
    info: DiskInfo,
}

impl ServerLiveIso {
    /// Identifies an image from its `.disk/info` file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or doesn't describe an Ubuntu Server image
    pub fn new(image: Box<dyn IsoImage>) -> Result<Self, UsnError> {
        let raw = image.read_file(DISK_INFO_PATH)?;
        let info: DiskInfo = String::from_utf8_lossy(&raw).parse()?;

        info!("Found {info}");

        Ok(Self { image, info })
    }

    /// Opens the image at the given path, which can be an ISO file or a directory holding the
    /// image content.
    ///
    /// # Errors
    ///
    /// Returns an error if the image can't be read or isn't an Ubuntu Server image
    pub fn open(path: &Path, extractor: Extractor) -> Result<Self, UsnError> {
        let image: Box<dyn IsoImage> = if path.is_dir() {
            Box::new(DirectoryImage::open(path)?)
        } else {
            match extractor {
                Extractor::IsoInfo => Box::new(IsoInfoImage::open(path)?),
                Extractor::Mount => Box::new(MountedImage::open(path)?),
            }
        };

        Self::new(image)
    }

    /// Returns the image identification
    #[must_use]
    pub fn info(&self) -> &DiskInfo {
        &self.info
    }

    /// Returns the image architecture
    #[must_use]
    pub fn architecture(&self) -> Architecture {
        self.info.architecture
    }

    /// Returns the image release
    #[must_use]
    pub fn release(&self) -> &Release {
        &self.info.release
    }

    fn extract_hwe(&self, casper_dir: &Path) -> Result<Option<HweArtifacts>, UsnError> {
        let has_kernel = self.image.has_file(HWE_KERNEL_PATH)?;
        let has_initrd = self.image.has_file(HWE_INITRD_PATH)?;

        match (has_kernel, has_initrd) {
            (true, true) => {
                let kernel = casper_dir.join(file_name(HWE_KERNEL_PATH));
                let initrd = casper_dir.join(file_name(HWE_INITRD_PATH));

                self.image.extract_file(HWE_KERNEL_PATH, &kernel)?;
                self.image.extract_file(HWE_INITRD_PATH, &initrd)?;

                Ok(Some(HweArtifacts { kernel, initrd }))
            }
            (false, false) => {
                info!("No HWE boot files found, skipping");
                Ok(None)
            }
            (true, false) | (false, true) => {
                warn!("Incomplete HWE boot files, skipping");
                Ok(None)
            }
        }
    }

    /// Extracts the kernel, initrd and GRUB configuration needed to netboot the image. Kernels
    /// and initrds are written to `casper_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if any required file is missing from the image, or if it can't be
    /// extracted.
    pub fn extract_artifacts(&self, casper_dir: &Path) -> Result<ExtractedArtifacts, UsnError> {
        for path in [KERNEL_PATH, INITRD_PATH, GRUB_CFG_PATH] {
            if !self.image.has_file(path)? {
                return Err(missing_file(path));
            }
        }

        let grub_cfg = String::from_utf8(self.image.read_file(GRUB_CFG_PATH)?).map_err(|_e| {
            UsnError::Extraction(format!("{GRUB_CFG_PATH} isn't valid UTF-8"))
        })?;

        fs::create_dir_all(casper_dir)?;

        let kernel = casper_dir.join(file_name(KERNEL_PATH));
        let initrd = casper_dir.join(file_name(INITRD_PATH));

        info!("Extracting {KERNEL_PATH} and {INITRD_PATH}");
        self.image.extract_file(KERNEL_PATH, &kernel)?;
        self.image.extract_file(INITRD_PATH, &initrd)?;

        let hwe = self.extract_hwe(casper_dir)?;

        debug!("Extraction done");

        Ok(ExtractedArtifacts {
            kernel,
            initrd,
            hwe,
            grub_cfg,
        })
    }

    /// Extracts a file loaded by a bootloader configuration to `dest`, if the image has it.
    /// Returns whether the file was extracted.
    ///
    /// # Errors
    ///
    /// Returns an error if the image can't be accessed, or if the file can't be written
    pub fn extract_boot_file(&self, path: &str, dest: &Path) -> Result<bool, UsnError> {
        let path = format!("/{}", iso_relative_path(path));

        if !self.image.has_file(&path)? {
            return Ok(false);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("Extracting {path}");
        self.image.extract_file(&path, dest)?;

        Ok(true)
    }
}
