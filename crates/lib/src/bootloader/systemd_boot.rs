//! systemd-boot, using Boot Loader Specification type 1 entries.

use anyhow::Result;
use camino::Utf8Path;

use super::{BootloaderInstaller, DiskError, MenuEntry, MENU_TIMEOUT};
use crate::disk::{relative_to_root, Partition, RootTarget};
use crate::install::Installer;

/// bootctl is part of systemd.
const SYSTEMD_PACKAGE: &str = "systemd";

/// File name of a BLS entry, e.g. `polaris-linux_linux-zen-fallback.conf`.
fn entry_file_name(os_name: &str, entry: &MenuEntry) -> String {
    let os_id = os_name.to_lowercase().replace(char::is_whitespace, "-");
    let variant = match entry.variant {
        super::InitramfsVariant::Primary => "",
        super::InitramfsVariant::Fallback => "-fallback",
    };
    format!("{os_id}_{}{variant}.conf", entry.kernel)
}

fn render_entry(entry: &MenuEntry) -> String {
    indoc::formatdoc! { "
        # Created by: polaris-install
        title   {title}
        linux   /{kernel}
        initrd  /{initrd}
        options {options}
        ",
        title = entry.label(),
        kernel = entry.kernel_image(),
        initrd = entry.initramfs_image(),
        options = entry.cmdline,
    }
}

fn render_loader_conf(default_entry: &str) -> String {
    format!("default {default_entry}\ntimeout {MENU_TIMEOUT}\n")
}

#[derive(Debug)]
pub(crate) struct SystemdBoot;

impl SystemdBoot {
    fn deploy(
        &self,
        installer: &Installer,
        esp: &Utf8Path,
        boot: &Utf8Path,
        entries: &[MenuEntry],
    ) -> Result<()> {
        installer.host.strap(&installer.target, &[SYSTEMD_PACKAGE])?;
        installer.host.chroot(
            &installer.target,
            &[
                "bootctl",
                &format!("--esp-path={esp}"),
                &format!("--boot-path={boot}"),
                "install",
            ],
        )?;

        let os_name = &installer.config.os_name;
        let entries_dir = relative_to_root(boot).join("loader/entries");
        for entry in entries {
            let path = entries_dir.join(entry_file_name(os_name, entry));
            installer.write_file(path.as_str(), render_entry(entry))?;
        }
        // The first entry is the primary image of the first kernel
        if let Some(first) = entries.first() {
            let loader_conf = relative_to_root(esp).join("loader/loader.conf");
            installer.write_file(
                loader_conf.as_str(),
                render_loader_conf(&entry_file_name(os_name, first)),
            )?;
        }
        Ok(())
    }
}

impl BootloaderInstaller for SystemdBoot {
    fn install(
        &self,
        installer: &Installer,
        boot: &Partition,
        efi: Option<&Partition>,
        root: &RootTarget,
    ) -> Result<(), DiskError> {
        if !installer.host.has_uefi() {
            return Err(DiskError::new("systemd-boot requires UEFI firmware"));
        }
        let esp = super::require_esp(efi)?;
        let boot_mount = boot.mountpoint.as_deref().ok_or_else(|| {
            DiskError::new(format!("Boot partition {} is not mounted", boot.dev_path))
        })?;
        let cmdline = super::boot_cmdline(installer, root)?;
        let entries =
            super::menu_entries(&installer.config.os_name, &installer.config.kernels, &cmdline);

        self.deploy(installer, &esp, boot_mount, &entries)
            .map_err(|e| {
                DiskError::wrap(
                    format!("Failed to install systemd-boot in {}{esp}", installer.target),
                    e,
                )
            })
    }
}
