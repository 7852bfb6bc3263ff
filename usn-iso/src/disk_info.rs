use core::{fmt, str::FromStr};

use types::{codename_for_version, Architecture, Release, UsnError};

const DISK_INFO_PREFIX: &str = "Ubuntu-Server ";

fn invalid(line: &str, reason: &str) -> UsnError {
    UsnError::Extraction(format!("Unsupported .disk/info \"{line}\": {reason}"))
}

fn parse_version(token: &str) -> Option<String> {
    let mut parts = token.split('.');
    let year = parts.next()?;
    let month = parts.next()?;

    let is_two_digits = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !is_two_digits(year) || !is_two_digits(month) {
        return None;
    }

    if !parts.all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    Some(format!("{year}.{month}"))
}

/// The identification of an Ubuntu Server image, as found in its `.disk/info` file
///
/// The file holds a single line such as
/// `Ubuntu-Server 20.04.2 LTS "Focal Fossa" - Release arm64 (20210201.2)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskInfo {
    /// Release the image installs
    pub release: Release,

    /// Full version, including the point release if any
    pub full_version: String,

    /// Architecture the image boots on
    pub architecture: Architecture,

    /// Kind of build (`Release`, `Daily`, `Beta`...)
    pub build_kind: String,

    /// Build serial, if present
    pub serial: Option<String>,
}

impl FromStr for DiskInfo {
    type Err = UsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.lines().next().unwrap_or_default().trim();

        let rest = line
            .strip_prefix(DISK_INFO_PREFIX)
            .ok_or_else(|| invalid(line, "not an Ubuntu Server image"))?;

        let (head, name, tail) = if let Some((head, quoted)) = rest.split_once('"') {
            let (name, tail) = quoted
                .split_once('"')
                .ok_or_else(|| invalid(line, "unterminated release name"))?;

            (head, Some(name), tail)
        } else {
            let (head, tail) = rest
                .split_once(" - ")
                .ok_or_else(|| invalid(line, "missing build description"))?;

            (head, None, tail)
        };

        let mut head_tokens = head.split_whitespace();
        let full_version = head_tokens
            .next()
            .ok_or_else(|| invalid(line, "missing version"))?;
        let version =
            parse_version(full_version).ok_or_else(|| invalid(line, "malformed version"))?;
        let lts = head_tokens.any(|t| t == "LTS");

        let codename = match name.and_then(|n| n.split_whitespace().next()) {
            Some(word) => word.to_lowercase(),
            None => codename_for_version(&version)
                .ok_or_else(|| invalid(line, "unknown release"))?
                .to_owned(),
        };

        let mut tail_tokens: Vec<&str> = tail
            .trim()
            .trim_start_matches('-')
            .split_whitespace()
            .collect();

        let serial = match tail_tokens.last() {
            Some(t) if t.starts_with('(') && t.ends_with(')') => {
                let serial = t.trim_start_matches('(').trim_end_matches(')').to_owned();
                tail_tokens.pop();
                Some(serial)
            }
            Some(_) | None => None,
        };

        let architecture = tail_tokens
            .pop()
            .ok_or_else(|| invalid(line, "missing architecture"))?
            .parse()?;

        Ok(Self {
            release: Release {
                version,
                lts,
                codename,
            },
            full_version: full_version.to_owned(),
            architecture,
            build_kind: tail_tokens.join(" "),
            serial,
        })
    }
}

impl fmt::Display for DiskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ubuntu Server {} ({}) for {}",
            self.full_version, self.release.codename, self.architecture
        )
    }
}
