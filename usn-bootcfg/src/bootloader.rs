use core::fmt;
use std::collections::BTreeSet;

use log::debug;

use crate::{KernelParams, KERNEL_ARGS_MARKER};

const PXELINUX_TEMPLATE: &str = "DEFAULT install
LABEL install
  KERNEL casper/vmlinuz
  INITRD casper/initrd
  APPEND ---
";

/// Bootloaders we generate configurations for
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootloaderKind {
    /// GRUB, for UEFI network boot
    Grub,

    /// PXELINUX, for BIOS network boot
    Pxelinux,
}

impl BootloaderKind {
    /// Returns the path of the configuration file, relative to the netboot tree root
    #[must_use]
    pub fn config_path(self) -> &'static str {
        match self {
            Self::Grub => "grub/grub.cfg",
            Self::Pxelinux => "pxelinux.cfg/default",
        }
    }
}

fn is_boot_file_path(arg: &str) -> bool {
    !arg.is_empty() && !arg.contains('$') && !arg.starts_with('(') && !arg.contains('=')
}

/// A bootloader configuration file
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BootloaderConfig {
    kind: BootloaderKind,
    cfg: String,
}

impl BootloaderConfig {
    /// Creates a GRUB configuration from the one shipped on the image
    #[must_use]
    pub fn grub(seed: &str) -> Self {
        Self {
            kind: BootloaderKind::Grub,
            cfg: seed.to_owned(),
        }
    }

    /// Creates a PXELINUX configuration booting the installer. Unlike GRUB, the image doesn't
    /// ship one we could start from.
    #[must_use]
    pub fn pxelinux() -> Self {
        Self {
            kind: BootloaderKind::Pxelinux,
            cfg: PXELINUX_TEMPLATE.to_owned(),
        }
    }

    /// Returns the bootloader this configuration is for
    #[must_use]
    pub fn kind(&self) -> BootloaderKind {
        self.kind
    }

    /// Returns the configuration content
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.cfg
    }

    /// Adds kernel arguments to every kernel command line of the configuration, and returns the
    /// number of command lines modified.
    ///
    /// Installer arguments are inserted before the first `---` marker of the line, extra
    /// arguments are appended at the end of the line.
    pub fn add_kernel_params(&mut self, params: &KernelParams) -> usize {
        let install = params.install.join(" ");

        let mut modified = 0;
        let mut rendered = String::with_capacity(self.cfg.len());
        for raw in self.cfg.split_inclusive('\n') {
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            let line = line.strip_suffix('\r').unwrap_or(line);
            let ending = raw.get(line.len()..).filter(|e| !e.is_empty()).unwrap_or("\n");

            if let Some((head, tail)) = line.split_once(KERNEL_ARGS_MARKER) {
                debug!("Adding kernel parameters to \"{}\"", line.trim());

                rendered.push_str(head);
                rendered.push_str(&install);
                rendered.push(' ');
                rendered.push_str(KERNEL_ARGS_MARKER);
                rendered.push_str(tail);

                if let Some(extra) = &params.extra {
                    rendered.push(' ');
                    rendered.push_str(extra);
                }

                modified += 1;
            } else {
                rendered.push_str(line);
            }

            rendered.push_str(ending);
        }

        self.cfg = rendered;
        modified
    }

    /// Returns the files the configuration loads, relative to the netboot tree root
    #[must_use]
    pub fn referenced_files(&self) -> BTreeSet<String> {
        let mut files = BTreeSet::new();

        for line in self.cfg.lines() {
            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };

            let args: Vec<&str> = match keyword.to_ascii_lowercase().as_str() {
                "linux" | "linuxefi" | "kernel" => tokens.next().into_iter().collect(),
                "initrd" | "initrdefi" => tokens.flat_map(|t| t.split(',')).collect(),
                _ => continue,
            };

            files.extend(
                args.into_iter()
                    .filter(|a| is_boot_file_path(a))
                    .map(|a| a.trim_start_matches('/').to_owned()),
            );
        }

        files
    }
}

impl fmt::Display for BootloaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::{BootloaderConfig, BootloaderKind, KernelParams};

    fn params(extra: Option<&str>) -> KernelParams {
        KernelParams {
            install: vec![String::from("ip=dhcp"), String::from("url=http://h/x.iso")],
            extra: extra.map(String::from),
        }
    }

    #[test]
    fn test_pxelinux_render() {
        let mut cfg = BootloaderConfig::pxelinux();

        assert_eq!(cfg.add_kernel_params(&params(None)), 1);
        assert_eq!(
            cfg.to_string(),
            "DEFAULT install\nLABEL install\n  KERNEL casper/vmlinuz\n  INITRD casper/initrd\n  APPEND ip=dhcp url=http://h/x.iso ---\n"
        );
        assert_eq!(cfg.kind().config_path(), "pxelinux.cfg/default");
    }

    #[test]
    fn test_extra_args_end_the_line() {
        let mut cfg = BootloaderConfig::grub("linux /casper/vmlinuz quiet --- splash\n");
        cfg.add_kernel_params(&params(Some("console=ttyS0")));

        assert_eq!(
            cfg.as_str(),
            "linux /casper/vmlinuz quiet ip=dhcp url=http://h/x.iso --- splash console=ttyS0\n"
        );
    }

    #[test]
    fn test_lines_without_marker_untouched() {
        let seed = "set timeout=5\nmenuentry 'UEFI Firmware Settings' {\n\tfwsetup\n}\n";
        let mut cfg = BootloaderConfig::grub(seed);

        assert_eq!(cfg.add_kernel_params(&params(Some("console=ttyS0"))), 0);
        assert_eq!(cfg.as_str(), seed);
        assert_eq!(cfg.kind(), BootloaderKind::Grub);
    }

    #[test]
    fn test_crlf_line_endings_kept() {
        let mut cfg = BootloaderConfig::grub(
            "set timeout=5\r\nmenuentry x {\r\n\tlinux /casper/vmlinuz ---\r\n}\r\n",
        );

        assert_eq!(cfg.add_kernel_params(&params(Some("console=ttyS0"))), 1);
        assert_eq!(
            cfg.as_str(),
            "set timeout=5\r\nmenuentry x {\r\n\tlinux /casper/vmlinuz ip=dhcp url=http://h/x.iso --- console=ttyS0\r\n}\r\n"
        );
    }

    #[test]
    fn test_last_line_terminated() {
        let mut cfg = BootloaderConfig::grub("linux /casper/vmlinuz ---");
        cfg.add_kernel_params(&params(None));

        assert_eq!(
            cfg.as_str(),
            "linux /casper/vmlinuz ip=dhcp url=http://h/x.iso ---\n"
        );
    }

    #[test]
    fn test_referenced_files_grub() {
        let cfg = BootloaderConfig::grub(
            "menuentry x {\n\tlinux\t/casper/vmlinuz  quiet  ---\n\tinitrd\t/casper/initrd\n}\nmenuentry y {\n\tlinux /casper/hwe-vmlinuz ---\n\tinitrd /casper/hwe-initrd\n}\n",
        );

        assert_eq!(
            cfg.referenced_files().into_iter().collect::<Vec<_>>(),
            vec![
                "casper/hwe-initrd",
                "casper/hwe-vmlinuz",
                "casper/initrd",
                "casper/vmlinuz"
            ]
        );
    }

    #[test]
    fn test_referenced_files_pxelinux() {
        let cfg = BootloaderConfig::pxelinux();

        assert_eq!(
            cfg.referenced_files().into_iter().collect::<Vec<_>>(),
            vec!["casper/initrd", "casper/vmlinuz"]
        );
    }

    #[test]
    fn test_referenced_files_skips_variables() {
        let cfg = BootloaderConfig::grub("linux ($root)/vmlinuz\ninitrd $prefix/initrd\n");

        assert!(cfg.referenced_files().is_empty());
    }
}
