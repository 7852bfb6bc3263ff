use std::path::{Component, Path, PathBuf};

use bootcfg::{BootloaderConfig, NetbootConfig};
use fetch::Fetcher;
use iso::ServerLiveIso;
use log::{debug, info};
use types::UsnError;

use crate::{settings::Settings, tree::StagingTree};

// Menu entries besides the installer one (memtest, for example) load files we don't extract
// upfront. They are copied from the image when it has them.
fn extract_referenced_files(
    iso: &ServerLiveIso,
    tree: &StagingTree,
    configs: &[BootloaderConfig],
) -> Result<(), UsnError> {
    for cfg in configs {
        for file in cfg.referenced_files() {
            if !Path::new(&file)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            {
                debug!("Not extracting {file}, it's outside of the netboot tree");
                continue;
            }

            let dest = tree.join(&file);
            if dest.exists() {
                continue;
            }

            if !iso.extract_boot_file(&file, &dest)? {
                debug!("{file} isn't part of the image");
            }
        }
    }

    Ok(())
}

/// Assembles the netboot tree for an image, and returns the path to it
pub(crate) fn generate(
    iso: &ServerLiveIso,
    config: &NetbootConfig,
    settings: &Settings,
    fetcher: &Fetcher,
    out_dir: Option<&Path>,
) -> Result<PathBuf, UsnError> {
    let arch = iso.architecture();

    let tree = StagingTree::create(out_dir)?;
    info!("Generating netboot tree in {}", tree.path().display());

    let artifacts = iso.extract_artifacts(&tree.join("casper"))?;

    fetcher.fetch_bootloader(&settings.mirrors(), iso.release(), arch, tree.path())?;

    let params = config.kernel_params(&settings.netboot_args);

    let mut grub = BootloaderConfig::grub(&artifacts.grub_cfg);
    if grub.add_kernel_params(&params) == 0 {
        return Err(UsnError::Extraction(String::from(
            "The image's grub.cfg has no installer kernel command line",
        )));
    }

    let mut configs = vec![grub];

    if arch.has_pxelinux() {
        for file in settings.host_boot_files() {
            tree.copy_host_file(file.path, file.package)?;
        }

        let mut pxelinux = BootloaderConfig::pxelinux();
        pxelinux.add_kernel_params(&params);
        configs.push(pxelinux);
    }

    for cfg in &configs {
        tree.write_config(cfg)?;
    }

    extract_referenced_files(iso, &tree, &configs)?;
    tree.verify(&configs)?;

    Ok(tree.persist())
}
