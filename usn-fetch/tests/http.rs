#![allow(missing_docs)]

use std::{fs, net::TcpListener};

use indicatif as _;
use log as _;
use reqwest as _;
use tempfile::TempDir;
use test_log::test;
use test_server::{respond, serve};
use types::{Architecture, Release, UsnError};
use url::Url;
use usn_fetch::{bootloader_urls, Fetcher, Mirrors};
use xdg as _;

fn focal() -> Release {
    Release {
        version: String::from("20.04"),
        lts: true,
        codename: String::from("focal"),
    }
}

fn mirrors(base: &Url) -> Mirrors {
    Mirrors {
        archive: base.clone(),
        ports: base.clone(),
    }
}

#[test]
fn test_bootloader_urls_amd64() {
    let urls = bootloader_urls(&Mirrors::default(), &focal(), Architecture::Amd64).unwrap();

    assert_eq!(
        urls,
        vec![
            Url::parse("http://archive.ubuntu.com/ubuntu/dists/focal-updates/main/uefi/grub2-amd64/current/grubnetx64.efi.signed").unwrap(),
            Url::parse("http://archive.ubuntu.com/ubuntu/dists/focal/main/uefi/grub2-amd64/current/grubnetx64.efi.signed").unwrap(),
        ]
    );
}

#[test]
fn test_bootloader_urls_arm64_uses_ports() {
    let urls = bootloader_urls(&Mirrors::default(), &focal(), Architecture::Arm64).unwrap();

    assert_eq!(urls.len(), 2);
    assert_eq!(
        urls[0].as_str(),
        "http://ports.ubuntu.com/ubuntu-ports/dists/focal-updates/main/uefi/grub2-arm64/current/grubnetaa64.efi.signed"
    );
}

#[test]
fn test_bootloader_urls_no_uefi() {
    let urls = bootloader_urls(&Mirrors::default(), &focal(), Architecture::S390x).unwrap();

    assert!(urls.is_empty());
}

#[test]
fn test_bootloader_falls_back_to_release_pocket() {
    let server = serve(vec![respond(404, b"nope"), respond(200, b"SIGNED GRUB")]);
    let base = server.url().join("ubuntu").unwrap();
    let dir = TempDir::new().unwrap();

    let path = Fetcher::new()
        .unwrap()
        .fetch_bootloader(&mirrors(&base), &focal(), Architecture::Amd64, dir.path())
        .unwrap()
        .unwrap();

    assert_eq!(path, dir.path().join("grubnetx64.efi"));
    assert_eq!(fs::read(&path).unwrap(), b"SIGNED GRUB");

    let requests = server.join();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("/dists/focal-updates/"));
    assert!(requests[1].contains("/dists/focal/"));
}

#[test]
fn test_bootloader_updates_pocket_first() {
    let server = serve(vec![respond(200, b"UPDATED GRUB")]);
    let base = server.url().join("ubuntu").unwrap();
    let dir = TempDir::new().unwrap();

    let path = Fetcher::new()
        .unwrap()
        .fetch_bootloader(&mirrors(&base), &focal(), Architecture::Arm64, dir.path())
        .unwrap()
        .unwrap();

    assert_eq!(path, dir.path().join("grubnetaa64.efi"));
    assert_eq!(fs::read(&path).unwrap(), b"UPDATED GRUB");
    assert_eq!(server.join().len(), 1);
}

#[test]
fn test_bootloader_missing_everywhere() {
    let server = serve(vec![respond(404, b""), respond(404, b"")]);
    let base = server.url().join("ubuntu").unwrap();
    let dir = TempDir::new().unwrap();

    let err = Fetcher::new()
        .unwrap()
        .fetch_bootloader(&mirrors(&base), &focal(), Architecture::Amd64, dir.path())
        .unwrap_err();

    assert!(matches!(err, UsnError::Download(_)));
    assert!(!dir.path().join("grubnetx64.efi").exists());
    assert_eq!(server.join().len(), 2);
}

#[test]
fn test_bootloader_skipped_without_uefi() {
    let dir = TempDir::new().unwrap();

    let res = Fetcher::new()
        .unwrap()
        .fetch_bootloader(&Mirrors::default(), &focal(), Architecture::Ppc64el, dir.path())
        .unwrap();

    assert!(res.is_none());
}

#[test]
fn test_download_error_status() {
    let server = serve(vec![respond(500, b"boom")]);
    let base = server.url().join("ubuntu").unwrap();
    let url = base.join("ubuntu/test.iso").unwrap();

    let mut out = Vec::new();
    let err = Fetcher::new().unwrap().download(&url, &mut out).unwrap_err();

    assert!(matches!(err, UsnError::Download(_)));
    assert!(out.is_empty());
    assert_eq!(server.join().len(), 1);
}

#[test]
fn test_download_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/test.iso")).unwrap();
    let mut out = Vec::new();
    let err = Fetcher::new().unwrap().download(&url, &mut out).unwrap_err();

    assert!(matches!(err, UsnError::Connection(_)));
}

#[test]
fn test_download_cached_reuses_matching_file() {
    let server = serve(vec![respond(200, b"ISO!")]);
    let base = server.url().join("ubuntu").unwrap();
    let url = base.join("ubuntu/test.iso").unwrap();
    let cache = TempDir::new().unwrap();
    fs::write(cache.path().join("test.iso"), b"ISO!").unwrap();

    let path = Fetcher::new()
        .unwrap()
        .download_cached(&url, cache.path())
        .unwrap();

    assert_eq!(path, cache.path().join("test.iso"));

    let requests = server.join();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("HEAD "));
}

#[test]
fn test_download_cached_replaces_stale_file() {
    let server = serve(vec![respond(200, b"NEW IMAGE"), respond(200, b"NEW IMAGE")]);
    let base = server.url().join("ubuntu").unwrap();
    let url = base.join("ubuntu/test.iso").unwrap();
    let cache = TempDir::new().unwrap();
    fs::write(cache.path().join("test.iso"), b"OLD").unwrap();

    let path = Fetcher::new()
        .unwrap()
        .download_cached(&url, cache.path())
        .unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"NEW IMAGE");
    assert!(!cache.path().join("test.part").exists());

    let requests = server.join();
    assert!(requests[0].starts_with("HEAD "));
    assert!(requests[1].starts_with("GET "));
}
