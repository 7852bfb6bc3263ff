use std::{
    fs::File,
    io,
    os::fd::AsFd as _,
    path::{Path, PathBuf},
};

use log::{debug, error, log_enabled, trace, Level};
use loopdev::LoopControl;
use nix::unistd::Uid;
use sys_mount::{FilesystemType, Mount, MountFlags, Unmount as _, UnmountFlags};
use tempfile::TempDir;
use types::UsnError;

use crate::{directory::DirectoryImage, IsoImage};

#[derive(Debug)]
struct LoopDevice {
    loopdev: loopdev::LoopDevice,
    _file: File,
}

impl LoopDevice {
    fn attach(ctrl: &LoopControl, file: File) -> Result<Self, io::Error> {
        let loop_device = ctrl.next_free()?;

        if log_enabled!(Level::Debug) {
            debug!(
                "Using loop device {}",
                loop_device
                    .path()
                    .ok_or(io::Error::new(
                        io::ErrorKind::NotFound,
                        "Loop Device File Not Found"
                    ))?
                    .display()
            );
        }

        loop_device.with().read_only(true).attach_fd(file.as_fd())?;

        debug!("Attached the loop device to our image");

        Ok(Self {
            loopdev: loop_device,
            _file: file,
        })
    }

    fn path(&self) -> Result<PathBuf, io::Error> {
        self.loopdev.path().ok_or(io::Error::new(
            io::ErrorKind::NotFound,
            "Loop Device File Not Found",
        ))
    }
}

impl Drop for LoopDevice {
    fn drop(&mut self) {
        debug!("Destroying our loop device");

        let res = self.loopdev.detach();
        if let Err(e) = res {
            error!("Couldn't detach the Loop Device: {}", e);
        }

        debug!("Loop device detached");
    }
}

/// An ISO image attached to a loop device and mounted read-only on a temporary directory
///
/// The image is unmounted and the loop device released when dropped.
#[derive(Debug)]
pub struct MountedImage {
    content: DirectoryImage,
    mount: Mount,
    _loopdev: LoopDevice,
    _dir: TempDir,
}

impl MountedImage {
    /// Mounts an ISO image
    ///
    /// # Errors
    ///
    /// Returns an error if we're not running as root, or if the image can't be attached or
    /// mounted.
    pub fn open(path: &Path) -> Result<Self, UsnError> {
        if !Uid::effective().is_root() {
            return Err(UsnError::Extraction(String::from(
                "Mounting an image requires root privileges, use the isoinfo extractor instead",
            )));
        }

        let file = File::open(path)?;

        let loop_control = LoopControl::open()?;
        let loop_device = LoopDevice::attach(&loop_control, file)?;
        let device_path = loop_device.path()?;

        let temp_dir = TempDir::new()?;
        let content = DirectoryImage::open(temp_dir.path())?;

        debug!(
            "Mounting {} on {}",
            device_path.display(),
            temp_dir.path().display()
        );

        let mount = Mount::builder()
            .fstype(FilesystemType::Manual("iso9660"))
            .flags(MountFlags::RDONLY)
            .mount(&device_path, temp_dir.path())
            .map_err(|e| {
                UsnError::Extraction(format!("Couldn't mount {}: {e}", path.display()))
            })?;

        trace!("Mount Successful");

        Ok(Self {
            content,
            mount,
            _loopdev: loop_device,
            _dir: temp_dir,
        })
    }
}

impl IsoImage for MountedImage {
    fn has_file(&self, path: &str) -> Result<bool, UsnError> {
        self.content.has_file(path)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, UsnError> {
        self.content.read_file(path)
    }

    fn extract_file(&self, path: &str, dest: &Path) -> Result<(), UsnError> {
        self.content.extract_file(path, dest)
    }
}

impl Drop for MountedImage {
    fn drop(&mut self) {
        debug!("Unmounting {}", self.mount.target_path().display());

        let res = self.mount.unmount(UnmountFlags::DETACH);
        if let Err(e) = res {
            error!("Couldn't unmount {}: {e}", self.mount.target_path().display());
        }
    }
}
