//! Bootloader deployment.
//!
//! Each supported bootloader implements [`BootloaderInstaller`]; the config
//! selects one via [`BootloaderKind`].

use anyhow::Result;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::disk::{Partition, RootTarget};
use crate::install::Installer;
use crate::kargs::{self, KernelArgs};
use crate::state::InstallState;

mod limine;
mod systemd_boot;

/// Global boot menu timeout, in seconds.
pub(crate) const MENU_TIMEOUT: u32 = 5;
/// Appended to every boot entry's command line.
const CMDLINE_FLAGS: &[&str] = &["quiet", "splash"];

/// The bootloaders we can deploy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BootloaderKind {
    /// Limine, for both UEFI and BIOS
    #[default]
    Limine,
    /// systemd-boot, UEFI only
    SystemdBoot,
}

impl ::std::fmt::Display for BootloaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BootloaderKind::Limine => "limine",
            BootloaderKind::SystemdBoot => "systemd-boot",
        };
        write!(f, "{}", s)
    }
}

impl BootloaderKind {
    fn installer(&self) -> &'static dyn BootloaderInstaller {
        match self {
            BootloaderKind::Limine => &limine::Limine,
            BootloaderKind::SystemdBoot => &systemd_boot::SystemdBoot,
        }
    }

    /// Units that keep this bootloader up to date on the installed system.
    pub fn services(&self) -> &'static [&'static str] {
        match self {
            BootloaderKind::Limine => &[],
            BootloaderKind::SystemdBoot => &["systemd-boot-update.service"],
        }
    }
}

/// Failure to deploy the bootloader. Always fatal to the installation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DiskError(pub String);

impl DiskError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Wrap `err` with a description of what was being done.
    fn wrap(what: impl std::fmt::Display, err: anyhow::Error) -> Self {
        Self(format!("{what}: {err:#}"))
    }
}

/// Deploys one particular bootloader into a target root.
pub(crate) trait BootloaderInstaller {
    /// Install the bootloader and write its configuration.
    ///
    /// Preconditions are verified before anything is written to the target.
    fn install(
        &self,
        installer: &Installer,
        boot: &Partition,
        efi: Option<&Partition>,
        root: &RootTarget,
    ) -> Result<(), DiskError>;
}

/// Which initramfs image a boot entry uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitramfsVariant {
    Primary,
    Fallback,
}

impl InitramfsVariant {
    /// Primary first; the order boot menus list them in.
    const ALL: [InitramfsVariant; 2] = [InitramfsVariant::Primary, InitramfsVariant::Fallback];

    /// Suffix appended to the kernel name in the initramfs file name.
    fn suffix(&self) -> &'static str {
        match self {
            InitramfsVariant::Primary => "",
            InitramfsVariant::Fallback => "fallback",
        }
    }
}

/// One boot menu entry: a kernel with one of its initramfs images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MenuEntry {
    /// Label without the variant
    pub(crate) title: String,
    pub(crate) kernel: String,
    pub(crate) variant: InitramfsVariant,
    pub(crate) cmdline: String,
}

impl MenuEntry {
    /// The menu label including the variant, e.g. `Polaris Linux (linux-zen) fallback`.
    pub(crate) fn label(&self) -> String {
        match self.variant {
            InitramfsVariant::Primary => self.title.clone(),
            InitramfsVariant::Fallback => format!("{} {}", self.title, self.variant.suffix()),
        }
    }

    pub(crate) fn kernel_image(&self) -> String {
        format!("vmlinuz-{}", self.kernel)
    }

    pub(crate) fn initramfs_image(&self) -> String {
        format!("initramfs-{}{}.img", self.kernel, self.variant.suffix())
    }
}

/// All entries for `kernels`, in kernel order, primary before fallback.
pub(crate) fn menu_entries(os_name: &str, kernels: &[String], cmdline: &str) -> Vec<MenuEntry> {
    kernels
        .iter()
        .flat_map(|kernel| {
            InitramfsVariant::ALL.into_iter().map(move |variant| MenuEntry {
                title: format!("{os_name} ({kernel})"),
                kernel: kernel.clone(),
                variant,
                cmdline: cmdline.to_owned(),
            })
        })
        .collect()
}

/// The command line shared by every boot entry.
pub(crate) fn boot_cmdline(installer: &Installer, root: &RootTarget) -> Result<String, DiskError> {
    let config = installer.config;
    let mut args: KernelArgs =
        kargs::root_kernel_args(root, &config.disk_encryption, config.zram, &config.kernel_params)
            .map_err(|e| DiskError::wrap("Failed to compute kernel arguments", e))?;
    args.extend(CMDLINE_FLAGS.iter().copied());
    Ok(args.to_string())
}

/// Require the EFI partition to be present and mounted, returning its
/// mountpoint in the installed system.
pub(crate) fn require_esp(efi: Option<&Partition>) -> Result<Utf8PathBuf, DiskError> {
    let efi = efi.ok_or_else(|| DiskError::new("Could not detect efi partition"))?;
    let mountpoint = efi
        .mountpoint
        .clone()
        .ok_or_else(|| DiskError::new(format!("EFI partition {} is not mounted", efi.dev_path)))?;
    tracing::info!("EFI partition: {}", efi.dev_path);
    Ok(mountpoint)
}

/// The `bootloader` installation step.
pub(crate) fn install_step(installer: &Installer, mut state: InstallState) -> Result<InstallState> {
    let config = installer.config;
    let kind = config.bootloader;
    println!("Installing bootloader via {kind}");
    kind.installer().install(
        installer,
        &config.disk.boot,
        config.disk.efi.as_ref(),
        &config.disk.root,
    )?;
    state.bootloader = Some(kind);
    Ok(state)
}
