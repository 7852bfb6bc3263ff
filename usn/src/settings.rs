use std::{
    fs, io,
    path::{Path, PathBuf},
};

use bootcfg::NETBOOT_ARGS;
use fetch::Mirrors;
use iso::Extractor;
use log::debug;
use serde::Deserialize;
use types::UsnError;
use url::Url;

const SETTINGS_PREFIX: &str = "ubuntu-server-netboot";
const SETTINGS_FILE_NAME: &str = "config.toml";

const PXELINUX_PATH: &str = "/usr/lib/PXELINUX/pxelinux.0";
const PXELINUX_PACKAGE: &str = "pxelinux";
const LDLINUX_PATH: &str = "/usr/lib/syslinux/modules/bios/ldlinux.c32";
const LDLINUX_PACKAGE: &str = "syslinux-common";

/// A BIOS boot file copied from the host, and the Ubuntu package shipping it
#[derive(Debug)]
pub(crate) struct HostBootFile<'a> {
    pub(crate) path: &'a Path,
    pub(crate) package: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct Settings {
    pub(crate) archive_mirror: Url,
    pub(crate) ports_mirror: Url,
    pub(crate) pxelinux: PathBuf,
    pub(crate) ldlinux: PathBuf,
    pub(crate) netboot_args: Vec<String>,
    pub(crate) extractor: Extractor,
}

impl Default for Settings {
    fn default() -> Self {
        let mirrors = Mirrors::default();

        Self {
            archive_mirror: mirrors.archive,
            ports_mirror: mirrors.ports,
            pxelinux: PathBuf::from(PXELINUX_PATH),
            ldlinux: PathBuf::from(LDLINUX_PATH),
            netboot_args: NETBOOT_ARGS.iter().map(|a| String::from(*a)).collect(),
            extractor: Extractor::default(),
        }
    }
}

impl Settings {
    pub(crate) fn from_toml(content: &str) -> Result<Self, UsnError> {
        Ok(toml::from_str(content)?)
    }

    pub(crate) fn from_path(path: &Path) -> Result<Self, UsnError> {
        debug!("Loading settings from {}", path.display());

        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Loads the settings from the given file, or from the user configuration directory if
    /// there's one there. Defaults are used otherwise.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, UsnError> {
        if let Some(path) = path {
            return Self::from_path(path);
        }

        let user_file = xdg::BaseDirectories::with_prefix(SETTINGS_PREFIX)
            .map_err(<xdg::BaseDirectoriesError as Into<io::Error>>::into)?
            .find_config_file(SETTINGS_FILE_NAME);

        match user_file {
            Some(path) => Self::from_path(&path),
            None => {
                debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub(crate) fn mirrors(&self) -> Mirrors {
        Mirrors {
            archive: self.archive_mirror.clone(),
            ports: self.ports_mirror.clone(),
        }
    }

    pub(crate) fn host_boot_files(&self) -> [HostBootFile<'_>; 2] {
        [
            HostBootFile {
                path: &self.pxelinux,
                package: PXELINUX_PACKAGE,
            },
            HostBootFile {
                path: &self.ldlinux,
                package: LDLINUX_PACKAGE,
            },
        ]
    }
}
