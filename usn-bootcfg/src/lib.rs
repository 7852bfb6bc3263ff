#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

use log::{debug, warn};
use types::UsnError;
use url::Url;

mod bootloader;
pub use bootloader::{BootloaderConfig, BootloaderKind};

/// Kernel arguments needed to boot the installer from a RAM disk over the network
pub const NETBOOT_ARGS: &[&str] = &["root=/dev/ram0", "ramdisk_size=1500000", "ip=dhcp"];

pub(crate) const KERNEL_ARGS_MARKER: &str = "---";

fn validate_url(kind: &str, url: &str) -> Result<(), UsnError> {
    let parsed =
        Url::parse(url).map_err(|e| UsnError::Config(format!("Invalid {kind} URL {url}: {e}")))?;

    debug!("{kind} URL {parsed}");

    Ok(())
}

/// User provided parameters of the netboot tree
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetbootConfig {
    install_url: String,
    autoinstall_url: Option<String>,
    extra_args: Option<String>,
}

impl NetbootConfig {
    /// Creates a new configuration
    ///
    /// The URLs are kept verbatim, so that the installer gets exactly what the user passed.
    ///
    /// # Errors
    ///
    /// Returns an error if the install URL is missing, or if any URL is malformed
    pub fn new(
        install_url: Option<&str>,
        autoinstall_url: Option<&str>,
        extra_args: Option<&str>,
    ) -> Result<Self, UsnError> {
        let install_url = install_url.filter(|u| !u.is_empty()).ok_or_else(|| {
            UsnError::Config(String::from(
                "An install URL is required, the installer downloads the ISO from it",
            ))
        })?;
        validate_url("install", install_url)?;

        if let Some(url) = autoinstall_url {
            validate_url("autoinstall", url)?;

            if !url.ends_with('/') {
                warn!(
                    "Autoinstall URL {url} doesn't end with a slash, cloud-init won't find user-data"
                );
            }
        }

        Ok(Self {
            install_url: install_url.to_owned(),
            autoinstall_url: autoinstall_url.map(ToOwned::to_owned),
            extra_args: extra_args
                .filter(|a| !a.trim().is_empty())
                .map(ToOwned::to_owned),
        })
    }

    /// Returns the URL the installer downloads the ISO from
    #[must_use]
    pub fn install_url(&self) -> &str {
        &self.install_url
    }

    /// Returns the URL of the autoinstall data source, if any
    #[must_use]
    pub fn autoinstall_url(&self) -> Option<&str> {
        self.autoinstall_url.as_deref()
    }

    /// Returns the kernel arguments to add to the bootloader configurations, on top of the given
    /// netboot arguments
    #[must_use]
    pub fn kernel_params<S: AsRef<str>>(&self, netboot_args: &[S]) -> KernelParams {
        let mut install = netboot_args
            .iter()
            .map(|a| a.as_ref().to_owned())
            .collect::<Vec<_>>();

        install.push(format!("url={}", self.install_url));

        if let Some(url) = &self.autoinstall_url {
            install.push(format!("autoinstall \"ds=nocloud-net;s={url};\""));
        }

        KernelParams {
            install,
            extra: self.extra_args.clone(),
        }
    }
}

/// Kernel arguments to add to a bootloader configuration
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KernelParams {
    /// Arguments for the installer, inserted before the `---` marker
    pub install: Vec<String>,

    /// Arguments appended at the end of the kernel command line
    pub extra: Option<String>,
}
