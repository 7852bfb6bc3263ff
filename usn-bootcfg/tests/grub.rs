#![allow(missing_docs)]

use std::{fs, path::PathBuf};

use log as _;
use test_log::test;
use types as _;
use url as _;
use usn_bootcfg::{BootloaderConfig, NetbootConfig, NETBOOT_ARGS};

const ISO_URL: &str =
    "http://cdimage.ubuntu.com/ubuntu/releases/20.04.2/release/ubuntu-20.04.2-live-server-arm64.iso";

fn fixture(name: &str) -> String {
    fs::read_to_string(PathBuf::from("./tests/data").join(name)).unwrap()
}

fn render(autoinstall_url: Option<&str>, extra_args: Option<&str>) -> BootloaderConfig {
    let config = NetbootConfig::new(Some(ISO_URL), autoinstall_url, extra_args).unwrap();

    let mut grub = BootloaderConfig::grub(&fixture("grub_ubuntu-20.04.2-live-server-arm64.cfg"));
    assert_eq!(grub.add_kernel_params(&config.kernel_params(NETBOOT_ARGS)), 2);

    grub
}

fn kernel_lines(cfg: &BootloaderConfig) -> Vec<&str> {
    cfg.as_str()
        .lines()
        .filter(|l| l.trim_start().starts_with("linux"))
        .collect()
}

#[test]
fn test_grub_cfg_ubuntu_20_04_2_live_server_arm64() {
    let grub = render(Some("http://12.34.56.78/"), Some(""));

    assert_eq!(grub.as_str(), fixture("grub_expected.cfg"));
}

#[test]
fn test_autoinstall_quoting_preserved() {
    let grub = render(Some("http://h/u/"), None);

    for line in kernel_lines(&grub) {
        assert!(line.contains(" autoinstall \"ds=nocloud-net;s=http://h/u/;\" ---"));
    }
}

#[test]
fn test_extra_args_appended_after_install_url() {
    let grub = render(None, Some("console=ttyS0"));

    for line in kernel_lines(&grub) {
        assert!(line.ends_with(" console=ttyS0"));

        let url_pos = line.find(&format!("url={ISO_URL}")).unwrap();
        let extra_pos = line.find("console=ttyS0").unwrap();
        assert!(url_pos < extra_pos);
        assert!(!line.contains("autoinstall"));
    }
}

#[test]
fn test_render_is_deterministic() {
    let first = render(Some("http://h/u/"), Some("console=ttyS0"));
    let second = render(Some("http://h/u/"), Some("console=ttyS0"));

    assert_eq!(first, second);
}

#[test]
fn test_referenced_files_exist_on_image() {
    let grub = render(None, None);

    assert_eq!(
        grub.referenced_files().into_iter().collect::<Vec<_>>(),
        vec![
            "casper/hwe-initrd",
            "casper/hwe-vmlinuz",
            "casper/initrd",
            "casper/vmlinuz"
        ]
    );
}
