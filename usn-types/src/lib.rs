#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

use core::{fmt, str::FromStr};
use std::io;

/// Representation of an Ubuntu hardware architecture
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Architecture {
    /// Intel's X86-64 Architecture
    Amd64,

    /// ARM's AARCH64 Architecture
    Arm64,

    /// Intel's x86 Architecture
    I386,

    /// IBM's Little-Endian POWER Architecture
    Ppc64el,

    /// RISC-V 64-bit Architecture
    Riscv64,

    /// IBM's Z Architecture
    S390x,
}

impl Architecture {
    /// Returns the Debian architecture name
    #[must_use]
    pub fn as_ubuntu_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::I386 => "i386",
            Self::Ppc64el => "ppc64el",
            Self::Riscv64 => "riscv64",
            Self::S390x => "s390x",
        }
    }

    /// Returns the architecture abbreviation used in UEFI binary names, if the architecture boots
    /// through a signed network GRUB
    #[must_use]
    pub fn uefi_abbrev(self) -> Option<&'static str> {
        match self {
            Self::Amd64 => Some("x64"),
            Self::Arm64 => Some("aa64"),
            Self::I386 | Self::Ppc64el | Self::Riscv64 | Self::S390x => None,
        }
    }

    /// Whether the architecture is served by the primary archive rather than the ports mirror
    #[must_use]
    pub fn is_primary_archive(self) -> bool {
        matches!(self, Self::Amd64 | Self::I386)
    }

    /// Whether the architecture can boot through PXELINUX
    #[must_use]
    pub fn has_pxelinux(self) -> bool {
        matches!(self, Self::Amd64)
    }
}

impl FromStr for Architecture {
    type Err = UsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "amd64" => Self::Amd64,
            "arm64" => Self::Arm64,
            "i386" => Self::I386,
            "ppc64el" => Self::Ppc64el,
            "riscv64" => Self::Riscv64,
            "s390x" => Self::S390x,
            _ => return Err(UsnError::Extraction(format!("Unknown architecture: {s}"))),
        })
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ubuntu_str())
    }
}

const KNOWN_RELEASES: &[(&str, &str)] = &[
    ("18.04", "bionic"),
    ("18.10", "cosmic"),
    ("19.04", "disco"),
    ("19.10", "eoan"),
    ("20.04", "focal"),
    ("20.10", "groovy"),
    ("21.04", "hirsute"),
    ("21.10", "impish"),
    ("22.04", "jammy"),
    ("22.10", "kinetic"),
    ("23.04", "lunar"),
    ("23.10", "mantic"),
    ("24.04", "noble"),
    ("24.10", "oracular"),
    ("25.04", "plucky"),
    ("25.10", "questing"),
];

/// Returns the codename of a known Ubuntu release from its `YY.MM` version
#[must_use]
pub fn codename_for_version(version: &str) -> Option<&'static str> {
    KNOWN_RELEASES
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, codename)| *codename)
}

/// An Ubuntu Release
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Release {
    /// The `YY.MM` version, without point release
    pub version: String,

    /// Whether the release is a Long Term Support one
    pub lts: bool,

    /// The lowercase release codename, as used in archive suites
    pub codename: String,
}

impl Release {
    /// Returns the archive pockets to look up, most recent first
    #[must_use]
    pub fn pockets(&self) -> [String; 2] {
        [format!("{}-updates", self.codename), self.codename.clone()]
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)?;

        if self.lts {
            write!(f, " LTS")?;
        }

        write!(f, " ({})", self.codename)
    }
}

/// Our Error Type
#[derive(thiserror::Error, Debug)]
pub enum UsnError {
    /// The user provided an invalid or incomplete configuration
    #[error("Configuration Error: {0}")]
    Config(String),

    /// An error has occurred when connecting to a remote server
    #[error("Download Error: Connection Failure")]
    Connection(#[from] reqwest::Error),

    /// A remote file couldn't be retrieved
    #[error("Download Error: {0}")]
    Download(String),

    /// The image is unreadable, incomplete or unsupported
    #[error("Extraction Error: {0}")]
    Extraction(String),

    /// An error has occurred when accessing the local filesystem or files
    #[error("Filesystem Error")]
    Filesystem(#[from] io::Error),

    /// An error has occurred when parsing the settings file
    #[error("Configuration File Format Error")]
    Settings(#[from] toml::de::Error),

    /// An error has occurred when parsing a URL
    #[error("Invalid URL")]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::{codename_for_version, Architecture, Release};

    #[test]
    fn test_architecture_roundtrip_names() {
        for name in ["amd64", "arm64", "i386", "ppc64el", "riscv64", "s390x"] {
            let arch: Architecture = name.parse().unwrap();
            assert_eq!(arch.to_string(), name);
        }
    }

    #[test]
    fn test_architecture_unknown() {
        "sparc".parse::<Architecture>().unwrap_err();
    }

    #[test]
    fn test_uefi_abbrev() {
        assert_eq!(Architecture::Amd64.uefi_abbrev(), Some("x64"));
        assert_eq!(Architecture::Arm64.uefi_abbrev(), Some("aa64"));
        assert_eq!(Architecture::S390x.uefi_abbrev(), None);
    }

    #[test]
    fn test_primary_archive() {
        assert!(Architecture::Amd64.is_primary_archive());
        assert!(Architecture::I386.is_primary_archive());
        assert!(!Architecture::Arm64.is_primary_archive());
    }

    #[test]
    fn test_codename_lookup() {
        assert_eq!(codename_for_version("20.04"), Some("focal"));
        assert_eq!(codename_for_version("24.04"), Some("noble"));
        assert_eq!(codename_for_version("99.04"), None);
    }

    #[test]
    fn test_pockets_order() {
        let release = Release {
            version: String::from("22.04"),
            lts: true,
            codename: String::from("jammy"),
        };

        assert_eq!(release.pockets(), ["jammy-updates", "jammy"]);
        assert_eq!(release.to_string(), "22.04 LTS (jammy)");
    }
}
