//! The installation configuration.
//!
//! Everything the user chose ahead of time lives in one [`InstallConfig`],
//! loaded once and handed by reference to each installation step.

use anyhow::{ensure, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fn_error_context::context;
use serde::{Deserialize, Serialize};

use crate::bootloader::BootloaderKind;
use crate::disk::{DiskEncryption, DiskLayout};
use crate::gpu::GpuVendor;

/// The environment variable that can be used to specify the config file.
pub const CONFIG_VAR: &str = "POLARIS_INSTALL_CONFIG";
/// Where the config is read from by default.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/polaris-install/install.toml";

fn default_mountpoint() -> Utf8PathBuf {
    "/mnt/archinstall".into()
}

fn default_hostname() -> String {
    "polaris".into()
}

fn default_kernels() -> Vec<String> {
    vec!["linux-zen".into()]
}

fn default_os_name() -> String {
    "Polaris Linux".into()
}

fn default_assets_dir() -> Utf8PathBuf {
    "/usr/share/polaris-install".into()
}

fn default_true() -> bool {
    true
}

/// Locale settings for the installed system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct LocaleConfig {
    /// e.g. `en_US.UTF-8`
    pub lang: String,
    /// Character set used in `/etc/locale.gen`
    pub encoding: String,
    /// Console keymap
    pub keyboard_layout: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            lang: "en_US.UTF-8".into(),
            encoding: "UTF-8".into(),
            keyboard_layout: "us".into(),
        }
    }
}

/// A regular user account to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct UserConfig {
    /// Login name
    pub username: String,
    /// Plain text password, hashed by `chpasswd` in the target
    pub password: String,
    /// Add the user to `wheel`
    #[serde(default)]
    pub sudo: bool,
}

/// The full set of choices for one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct InstallConfig {
    /// Where the target root is mounted
    #[serde(default = "default_mountpoint")]
    pub mountpoint: Utf8PathBuf,
    /// Pretty OS name, used for boot menu labels
    #[serde(default = "default_os_name")]
    pub os_name: String,
    /// Hostname of the installed system
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Kernel packages, in boot menu order
    #[serde(default = "default_kernels")]
    pub kernels: Vec<String>,
    /// Which bootloader to deploy
    #[serde(default)]
    pub bootloader: BootloaderKind,
    /// Extra kernel arguments appended after the root-derived ones
    #[serde(default)]
    pub kernel_params: Vec<String>,
    /// The mounted disk layout
    pub disk: DiskLayout,
    /// How the root is encrypted
    #[serde(default)]
    pub disk_encryption: DiskEncryption,
    /// Locale settings
    #[serde(default)]
    pub locale: LocaleConfig,
    /// e.g. `Europe/Berlin`
    #[serde(default)]
    pub timezone: Option<String>,
    /// Mirror server URLs, written to the mirrorlist in order
    #[serde(default)]
    pub mirrors: Vec<String>,
    /// Set up zram swap
    #[serde(default = "default_true")]
    pub zram: bool,
    /// Password for root; root stays locked when unset
    #[serde(default)]
    pub root_password: Option<String>,
    /// Users to create
    #[serde(default)]
    pub users: Vec<UserConfig>,
    /// Override GPU detection
    #[serde(default)]
    pub gpu_vendor: Option<GpuVendor>,
    /// Enable the espeakup screen reader
    #[serde(default)]
    pub accessibility: bool,
    /// Directory holding the files copied into the target
    #[serde(default = "default_assets_dir")]
    pub assets_dir: Utf8PathBuf,
    /// Additional packages to install
    #[serde(default)]
    pub extra_packages: Vec<String>,
    /// Additional services to enable
    #[serde(default)]
    pub extra_services: Vec<String>,
}

impl InstallConfig {
    /// Parse and validate a config from TOML text.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`.
    #[context("Loading config from {path}")]
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("Reading {path}"))?;
        Self::parse(&s)
    }

    /// Check invariants serde cannot express.
    #[context("Validating config")]
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.kernels.is_empty(), "At least one kernel is required");
        for (i, k) in self.kernels.iter().enumerate() {
            ensure!(!k.is_empty(), "Empty kernel name");
            ensure!(
                !self.kernels[..i].contains(k),
                "Kernel {k} listed more than once"
            );
        }
        ensure!(
            self.mountpoint.is_absolute(),
            "Mountpoint must be absolute: {}",
            self.mountpoint
        );
        ensure!(!self.hostname.is_empty(), "Empty hostname");
        if let Some(tz) = self.timezone.as_deref() {
            ensure!(
                !tz.is_empty() && !tz.starts_with('/') && !tz.split('/').any(|c| c == ".."),
                "Invalid timezone: {tz}"
            );
        }
        for user in &self.users {
            ensure!(
                !user.username.is_empty() && !user.username.contains(':'),
                "Invalid username: {:?}",
                user.username
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::disk::{EncryptionType, FilesystemType, RootTarget};

    const MINIMAL: &str = indoc! { r#"
        [disk.boot]
        dev-path = "/dev/vda1"
        mountpoint = "/boot"

        [disk.root]
        type = "partition"
        dev-path = "/dev/vda2"
        mountpoint = "/"
        fs-type = "ext4"
        partuuid = "0c4b1a5e-02"
    "# };

    #[test]
    fn test_defaults() -> Result<()> {
        let c = InstallConfig::parse(MINIMAL)?;
        assert_eq!(c.mountpoint, "/mnt/archinstall");
        assert_eq!(c.kernels, ["linux-zen"]);
        assert_eq!(c.bootloader, BootloaderKind::Limine);
        assert_eq!(c.os_name, "Polaris Linux");
        assert_eq!(c.locale, LocaleConfig::default());
        assert!(c.zram);
        assert!(c.disk.efi.is_none());
        assert_eq!(c.disk_encryption.kind, EncryptionType::None);
        let RootTarget::Partition(root) = &c.disk.root else {
            panic!("expected partition root");
        };
        assert_eq!(root.fs_type, Some(FilesystemType::Ext4));
        Ok(())
    }

    #[test]
    fn test_full() -> Result<()> {
        let s = indoc! { r#"
            mountpoint = "/mnt"
            hostname = "polaris-box"
            kernels = ["linux-zen", "linux-lts"]
            bootloader = "systemd-boot"
            timezone = "Europe/Berlin"
            zram = false
            gpu-vendor = "nvidia-turing-plus"

            [[users]]
            username = "anna"
            password = "hunter2"
            sudo = true

            [disk.boot]
            dev-path = "/dev/nvme0n1p1"
            mountpoint = "/boot"

            [disk.efi]
            dev-path = "/dev/nvme0n1p1"
            mountpoint = "/boot"

            [disk.root]
            type = "lvm"
            vg-name = "vg0"
            name = "root"
            fs-type = "btrfs"
            uuid = "341c4712"

            [[disk.root.btrfs-subvols]]
            name = "@"
            mountpoint = "/"

            [disk-encryption]
            type = "luks-on-lvm"
        "# };
        let c = InstallConfig::parse(s)?;
        assert_eq!(c.kernels, ["linux-zen", "linux-lts"]);
        assert_eq!(c.bootloader, BootloaderKind::SystemdBoot);
        assert_eq!(c.gpu_vendor, Some(GpuVendor::NvidiaTuringPlus));
        assert!(c.users[0].sudo);
        assert_eq!(c.disk.root.dev_path(), "/dev/vg0/root");
        assert!(c.disk.root.btrfs_subvols()[0].is_root());
        assert_eq!(c.disk_encryption.kind, EncryptionType::LuksOnLvm);
        Ok(())
    }

    #[test]
    fn test_invalid() {
        let cases = [
            ("kernels = []\n", "At least one kernel"),
            ("kernels = [\"linux\", \"linux\"]\n", "listed more than once"),
            ("mountpoint = \"mnt\"\n", "Mountpoint must be absolute"),
            ("timezone = \"../../etc/shadow\"\n", "Invalid timezone"),
        ];
        for (prefix, expected) in cases {
            let e = InstallConfig::parse(&format!("{prefix}{MINIMAL}")).unwrap_err();
            let msg = format!("{e:#}");
            assert!(msg.contains(expected), "{msg}");
        }
        assert!(InstallConfig::parse(&format!("unknown-key = 1\n{MINIMAL}")).is_err());
    }

    #[test]
    fn test_load() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = Utf8Path::from_path(td.path()).unwrap().join("install.toml");
        std::fs::write(&path, MINIMAL)?;
        let c = InstallConfig::load(&path)?;
        assert_eq!(c.hostname, "polaris");
        let e = InstallConfig::load(&path.with_file_name("missing.toml")).unwrap_err();
        assert!(format!("{e:#}").contains("missing.toml"));
        Ok(())
    }
}
