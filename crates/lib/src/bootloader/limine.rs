//! Limine, deployed for either UEFI or BIOS firmware.
//!
//! Limine's package only ships the boot files under `/usr/share/limine`; it
//! never touches the EFI system partition or the boot sector itself. We do
//! that here, and install a pacman hook that repeats the exact same actions
//! whenever the package is upgraded.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

use super::{BootloaderInstaller, DiskError, MenuEntry, MENU_TIMEOUT};
use crate::disk::{relative_to_root, Partition, RootTarget};
use crate::install::Installer;

const LIMINE_PACKAGE: &str = "limine";
/// Where the package installs the boot files, inside the target.
const LIMINE_SHARE: &str = "/usr/share/limine";
/// 32 and 64 bit UEFI applications.
const EFI_STUBS: [&str; 2] = ["BOOTIA32.EFI", "BOOTX64.EFI"];
/// Stage 3; stages 1 and 2 are written to the disk by `limine bios-install`.
const BIOS_STAGE3: &str = "limine-bios.sys";
/// The removable-media fallback path, found by firmware without an NVRAM entry.
const EFI_BOOT_DIR: &str = "EFI/BOOT";
pub(crate) const HOOK_PATH: &str = "etc/pacman.d/hooks/99-limine.hook";
pub(crate) const CONFIG_PATH: &str = "boot/limine.cfg";

/// A single action needed to make the boot files live.
///
/// All paths are absolute as seen from inside the installed system.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeployAction {
    /// Copy a file into a directory
    Copy {
        src: Utf8PathBuf,
        dest_dir: Utf8PathBuf,
    },
    /// Write stages 1 and 2 to a whole disk
    BiosInstall { device: Utf8PathBuf },
}

impl DeployAction {
    fn copy(name: &str, dest_dir: &Utf8Path) -> Self {
        DeployAction::Copy {
            src: Utf8Path::new(LIMINE_SHARE).join(name),
            dest_dir: dest_dir.to_owned(),
        }
    }

    /// The equivalent shell command, as run by the pacman hook.
    fn shell_command(&self) -> String {
        match self {
            DeployAction::Copy { src, dest_dir } => {
                let dest_dir = dest_dir.as_str().trim_end_matches('/');
                format!("/usr/bin/cp {src} {dest_dir}/")
            }
            DeployAction::BiosInstall { device } => {
                format!("/usr/bin/limine bios-install {device}")
            }
        }
    }

    fn run(&self, installer: &Installer) -> Result<()> {
        match self {
            DeployAction::Copy { src, dest_dir } => {
                let src = relative_to_root(src);
                let dest_dir = relative_to_root(dest_dir);
                installer
                    .root
                    .create_dir_all(dest_dir)
                    .with_context(|| format!("Creating {dest_dir}"))?;
                let name = src
                    .file_name()
                    .with_context(|| format!("No file name in {src}"))?;
                installer
                    .root
                    .copy(src, &installer.root, dest_dir.join(name))
                    .with_context(|| format!("Copying /{src} to /{dest_dir}"))?;
            }
            DeployAction::BiosInstall { device } => {
                installer.host.chroot(
                    &installer.target,
                    &["/usr/bin/limine", "bios-install", device.as_str()],
                )?;
            }
        }
        Ok(())
    }
}

/// The resolved deployment for the detected firmware.
#[derive(Debug)]
struct DeployPlan {
    actions: Vec<DeployAction>,
    /// Named in error messages: the ESP or the disk
    subject: String,
}

impl DeployPlan {
    fn uefi(target: &Utf8Path, esp: &Utf8Path) -> Self {
        let dest = esp.join(EFI_BOOT_DIR);
        Self {
            actions: EFI_STUBS
                .iter()
                .map(|stub| DeployAction::copy(stub, &dest))
                .collect(),
            subject: format!("in {target}{esp}"),
        }
    }

    fn bios(device: &Utf8Path) -> Self {
        Self {
            actions: vec![
                DeployAction::copy(BIOS_STAGE3, Utf8Path::new("/boot")),
                DeployAction::BiosInstall {
                    device: device.to_owned(),
                },
            ],
            subject: format!("on {device}"),
        }
    }

    /// The command the upgrade hook runs.
    fn hook_command(&self) -> String {
        self.actions
            .iter()
            .map(DeployAction::shell_command)
            .collect::<Vec<_>>()
            .join(" && ")
    }

    fn run(&self, installer: &Installer) -> Result<(), DiskError> {
        self.actions
            .iter()
            .try_for_each(|a| a.run(installer))
            .map_err(|e| DiskError::wrap(format!("Failed to install Limine {}", self.subject), e))
    }
}

/// Render the pacman hook redeploying Limine after an upgrade.
fn render_hook(command: &str) -> String {
    indoc::formatdoc! { r#"
            [Trigger]
            Operation = Install
            Operation = Upgrade
            Type = Package
            Target = {package}

            [Action]
            Description = Deploying Limine after upgrade...
            When = PostTransaction
            Exec = /bin/sh -c "{command}"
        "#,
        package = LIMINE_PACKAGE,
        command = command,
    }
}

/// Render `limine.cfg`.
fn render_config(entries: &[MenuEntry]) -> String {
    let mut out = format!("TIMEOUT={MENU_TIMEOUT}\n");
    for entry in entries {
        out.push_str(&format!("\n:{}\n", entry.label()));
        let lines = [
            "PROTOCOL=linux".to_string(),
            format!("KERNEL_PATH=boot:///{}", entry.kernel_image()),
            format!("MODULE_PATH=boot:///{}", entry.initramfs_image()),
            format!("CMDLINE={}", entry.cmdline),
        ];
        for line in lines {
            out.push_str("    ");
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Resolve the whole disk to install stages 1 and 2 to.
fn bios_device(installer: &Installer, boot: &Partition) -> Result<Utf8PathBuf, DiskError> {
    let parent = installer
        .host
        .parent_device(&boot.dev_path)
        .map_err(|e| DiskError::wrap(format!("Failed to resolve disk of {}", boot.dev_path), e))?
        .ok_or_else(|| {
            DiskError::new(format!(
                "Could not determine the disk holding boot partition {}",
                boot.dev_path
            ))
        })?;
    // Kernel names like sda can change between boots, prefer a stable alias
    let alias = installer
        .host
        .unique_path(&parent)
        .map_err(|e| DiskError::wrap(format!("Failed to resolve alias of {parent}"), e))?;
    Ok(alias.unwrap_or(parent))
}

#[derive(Debug)]
pub(crate) struct Limine;

impl BootloaderInstaller for Limine {
    fn install(
        &self,
        installer: &Installer,
        boot: &Partition,
        efi: Option<&Partition>,
        root: &RootTarget,
    ) -> Result<(), DiskError> {
        tracing::debug!("Installing limine bootloader");
        if !boot.dev_path.is_absolute() {
            return Err(DiskError::new(format!(
                "Invalid boot partition device path: {:?}",
                boot.dev_path.as_str()
            )));
        }
        tracing::info!("Limine boot partition: {}", boot.dev_path);

        // Everything that can fail without side effects happens first
        let plan = if installer.host.has_uefi() {
            let esp = super::require_esp(efi)?;
            DeployPlan::uefi(&installer.target, &esp)
        } else {
            let device = bios_device(installer, boot)?;
            tracing::info!("Limine BIOS target disk: {device}");
            DeployPlan::bios(&device)
        };
        let cmdline = super::boot_cmdline(installer, root)?;
        let entries = super::menu_entries(&installer.config.os_name, &installer.config.kernels, &cmdline);

        installer
            .host
            .strap(&installer.target, &[LIMINE_PACKAGE])
            .map_err(|e| DiskError::wrap("Failed to install the limine package", e))?;

        plan.run(installer)?;

        let hook = render_hook(&plan.hook_command());
        installer
            .write_file(HOOK_PATH, hook)
            .map_err(|e| DiskError::wrap(format!("Failed to write /{HOOK_PATH}"), e))?;

        installer
            .write_file(CONFIG_PATH, render_config(&entries))
            .map_err(|e| DiskError::wrap(format!("Failed to write /{CONFIG_PATH}"), e))?;
        Ok(())
    }
}
