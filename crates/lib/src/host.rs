//! Everything the installer needs from the live system it runs on.
//!
//! Installation steps never spawn processes or probe devices directly; they
//! go through [`HostSystem`], which keeps the steps testable against a fake.

use std::process::Command;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fn_error_context::context;
use polaris_utils::CommandRunExt;

use crate::gpu::{self, GpuVendor};

/// Present when the kernel was booted through UEFI.
const EFI_FIRMWARE_DIR: &str = "/sys/firmware/efi";
/// udev's persistent aliases for whole disks and partitions.
const DISK_BY_ID: &str = "/dev/disk/by-id";

/// Side effects on the installation host.
pub trait HostSystem: std::fmt::Debug {
    /// Whether the host booted in UEFI mode.
    fn has_uefi(&self) -> bool;

    /// Install packages into the target root.
    fn strap(&self, target: &Utf8Path, packages: &[&str]) -> Result<()>;

    /// The whole-disk device holding `partition`, if it has one.
    fn parent_device(&self, partition: &Utf8Path) -> Result<Option<Utf8PathBuf>>;

    /// A stable alias for `device`, e.g. under `/dev/disk/by-id`.
    fn unique_path(&self, device: &Utf8Path) -> Result<Option<Utf8PathBuf>>;

    /// Run a command inside the target root and return its stdout.
    fn chroot(&self, target: &Utf8Path, args: &[&str]) -> Result<String>;

    /// Like [`Self::chroot`], feeding `input` on stdin.
    fn chroot_with_input(&self, target: &Utf8Path, args: &[&str], input: &[u8])
        -> Result<String>;

    /// Run a command on the host and return its stdout.
    fn exec(&self, args: &[&str]) -> Result<String>;

    /// The GPU we should install drivers for.
    fn gpu_vendor(&self) -> Result<Option<GpuVendor>>;
}

/// The real host, driving the Arch install scripts.
#[derive(Debug, Default)]
pub struct SystemHost;

fn command_for(args: &[&str]) -> Result<Command> {
    let (program, rest) = args.split_first().context("Empty command")?;
    let mut cmd = Command::new(program);
    cmd.args(rest);
    Ok(cmd)
}

fn chroot_command(target: &Utf8Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("arch-chroot");
    cmd.arg(target.as_str()).args(args);
    cmd
}

/// Search `dir` for a symlink resolving to `device`.
///
/// Entries are visited in name order so the choice is stable across runs.
#[context("Finding alias for {device} in {dir}")]
pub(crate) fn find_alias_in(dir: &Utf8Path, device: &Utf8Path) -> Result<Option<Utf8PathBuf>> {
    let device = device
        .canonicalize_utf8()
        .with_context(|| format!("Resolving {device}"))?;
    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut names = entries
        .map(|e| e.map(|e| e.path().to_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();
    for alias in names {
        // Dangling links are skipped
        let Ok(resolved) = alias.canonicalize_utf8() else {
            continue;
        };
        if resolved == device {
            return Ok(Some(alias));
        }
    }
    Ok(None)
}

impl HostSystem for SystemHost {
    fn has_uefi(&self) -> bool {
        Utf8Path::new(EFI_FIRMWARE_DIR).exists()
    }

    #[context("Installing {packages:?} into {target}")]
    fn strap(&self, target: &Utf8Path, packages: &[&str]) -> Result<()> {
        Command::new("pacstrap")
            .args(["-C", "/etc/pacman.conf", "-K", target.as_str()])
            .args(packages)
            .args(["--noconfirm", "--needed"])
            .log_debug()
            .run_inherited_with_cmd_context()
    }

    #[context("Finding parent device of {partition}")]
    fn parent_device(&self, partition: &Utf8Path) -> Result<Option<Utf8PathBuf>> {
        let out = Command::new("lsblk")
            .args(["--nodeps", "--noheadings", "--paths", "--output", "PKNAME"])
            .arg(partition.as_str())
            .log_debug()
            .run_get_string()?;
        let parent = out.trim();
        Ok((!parent.is_empty()).then(|| Utf8PathBuf::from(parent)))
    }

    fn unique_path(&self, device: &Utf8Path) -> Result<Option<Utf8PathBuf>> {
        find_alias_in(Utf8Path::new(DISK_BY_ID), device)
    }

    fn chroot(&self, target: &Utf8Path, args: &[&str]) -> Result<String> {
        chroot_command(target, args).log_debug().run_get_string()
    }

    fn chroot_with_input(
        &self,
        target: &Utf8Path,
        args: &[&str],
        input: &[u8],
    ) -> Result<String> {
        chroot_command(target, args)
            .log_debug()
            .run_with_input(input)
    }

    fn exec(&self, args: &[&str]) -> Result<String> {
        command_for(args)?.log_debug().run_get_string()
    }

    fn gpu_vendor(&self) -> Result<Option<GpuVendor>> {
        gpu::detect_gpu_vendor(Utf8Path::new(gpu::SYSFS_PCI_DEVICES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_alias() -> Result<()> {
        let td = tempfile::tempdir()?;
        let root = Utf8Path::from_path(td.path()).unwrap();
        let dev = root.join("dev");
        std::fs::create_dir(&dev)?;
        std::fs::write(dev.join("sda"), b"")?;
        std::fs::write(dev.join("sdb"), b"")?;
        let by_id = dev.join("disk/by-id");
        std::fs::create_dir_all(&by_id)?;
        std::os::unix::fs::symlink("../../sdb", by_id.join("ata-OTHER_DISK"))?;
        std::os::unix::fs::symlink("../../sda", by_id.join("wwn-0x5000c500a1b2c3d4"))?;
        std::os::unix::fs::symlink("../../sda", by_id.join("ata-SAMSUNG_SSD_870"))?;
        std::os::unix::fs::symlink("../../gone", by_id.join("ata-DANGLING"))?;

        let found = find_alias_in(&by_id, &dev.join("sda"))?.unwrap();
        assert_eq!(found.file_name(), Some("ata-SAMSUNG_SSD_870"));
        assert_eq!(find_alias_in(&root.join("nonexistent"), &dev.join("sda"))?, None);

        std::fs::write(dev.join("sdc"), b"")?;
        assert_eq!(find_alias_in(&by_id, &dev.join("sdc"))?, None);
        Ok(())
    }

    #[test]
    fn test_command_for() {
        assert!(command_for(&[]).is_err());
        let cmd = command_for(&["genfstab", "-pU", "/mnt"]).unwrap();
        assert_eq!(cmd.to_string_pretty(), "genfstab -pU /mnt");
    }
}
