//! The disk layout handed to us after partitioning.
//!
//! Partitioning, formatting and mounting happen before the installer runs;
//! this module only describes the result so that later steps can find the
//! boot, EFI and root filesystems.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Filesystems we know how to pass as `rootfstype=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemType {
    /// btrfs
    Btrfs,
    /// ext4
    Ext4,
    /// XFS
    Xfs,
    /// F2FS
    F2fs,
    /// FAT32, as used for the EFI system partition
    Vfat,
    /// NTFS via the in-kernel ntfs3 driver
    Ntfs,
}

impl FilesystemType {
    /// The name the kernel uses for this filesystem type when mounting.
    pub fn mount_name(&self) -> &'static str {
        match self {
            FilesystemType::Btrfs => "btrfs",
            FilesystemType::Ext4 => "ext4",
            FilesystemType::Xfs => "xfs",
            FilesystemType::F2fs => "f2fs",
            FilesystemType::Vfat => "vfat",
            FilesystemType::Ntfs => "ntfs3",
        }
    }
}

/// A btrfs subvolume and where it is mounted in the installed system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Subvolume {
    /// Subvolume name, e.g. `@`
    pub name: String,
    /// Absolute mountpoint in the installed system
    #[serde(default)]
    pub mountpoint: Option<Utf8PathBuf>,
}

impl Subvolume {
    /// Whether this subvolume is mounted as the root filesystem.
    pub fn is_root(&self) -> bool {
        self.mountpoint.as_deref() == Some(Utf8Path::new("/"))
    }
}

/// A partition on a block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Partition {
    /// Kernel device node, e.g. `/dev/nvme0n1p1`
    pub dev_path: Utf8PathBuf,
    /// Absolute mountpoint in the installed system; `None` when not mounted
    #[serde(default)]
    pub mountpoint: Option<Utf8PathBuf>,
    /// Filesystem on the partition
    #[serde(default)]
    pub fs_type: Option<FilesystemType>,
    /// GPT partition UUID
    #[serde(default)]
    pub partuuid: Option<String>,
    /// Filesystem (or LUKS container) UUID
    #[serde(default)]
    pub uuid: Option<String>,
    /// Whether the partition holds a LUKS container
    #[serde(default)]
    pub encrypted: bool,
    /// btrfs subvolumes, if any
    #[serde(default)]
    pub btrfs_subvols: Vec<Subvolume>,
}

/// Strip the leading `/` so a mountpoint can be used relative to the target root.
pub(crate) fn relative_to_root(path: &Utf8Path) -> &Utf8Path {
    path.strip_prefix("/").unwrap_or(path)
}

impl Partition {
    /// The mountpoint relative to the installation root, if mounted.
    pub fn relative_mountpoint(&self) -> Option<&Utf8Path> {
        self.mountpoint.as_deref().map(relative_to_root)
    }
}

/// An LVM logical volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LvmVolume {
    /// Volume group name
    pub vg_name: String,
    /// Logical volume name
    pub name: String,
    /// Filesystem on the volume
    #[serde(default)]
    pub fs_type: Option<FilesystemType>,
    /// Filesystem (or LUKS container) UUID
    #[serde(default)]
    pub uuid: Option<String>,
    /// btrfs subvolumes, if any
    #[serde(default)]
    pub btrfs_subvols: Vec<Subvolume>,
}

impl LvmVolume {
    /// The stable device-mapper path for this volume.
    pub fn dev_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("/dev/{}/{}", self.vg_name, self.name))
    }
}

/// What the root filesystem lives on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RootTarget {
    /// A plain partition
    Partition(Partition),
    /// An LVM logical volume
    Lvm(LvmVolume),
}

impl RootTarget {
    /// Filesystem type of the root.
    pub fn fs_type(&self) -> Option<FilesystemType> {
        match self {
            RootTarget::Partition(p) => p.fs_type,
            RootTarget::Lvm(v) => v.fs_type,
        }
    }

    /// btrfs subvolumes of the root.
    pub fn btrfs_subvols(&self) -> &[Subvolume] {
        match self {
            RootTarget::Partition(p) => &p.btrfs_subvols,
            RootTarget::Lvm(v) => &v.btrfs_subvols,
        }
    }

    /// The device backing the root, for log messages.
    pub fn dev_path(&self) -> Utf8PathBuf {
        match self {
            RootTarget::Partition(p) => p.dev_path.clone(),
            RootTarget::Lvm(v) => v.dev_path(),
        }
    }
}

/// How the root is encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionType {
    /// No encryption
    #[default]
    None,
    /// LUKS directly on the root partition
    Luks,
    /// LVM inside a LUKS container
    LvmOnLuks,
    /// LUKS inside a logical volume
    LuksOnLvm,
}

/// Disk encryption settings chosen during partitioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiskEncryption {
    /// Encryption scheme
    #[serde(rename = "type", default)]
    pub kind: EncryptionType,
    /// UUID of the LUKS container holding the volume group (lvm-on-luks)
    #[serde(default)]
    pub luks_uuid: Option<String>,
    /// Unlock via a FIDO2 device
    #[serde(default)]
    pub hsm: bool,
}

/// The mounted disk layout of the target system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiskLayout {
    /// The partition holding `/boot`
    pub boot: Partition,
    /// The EFI system partition, on UEFI systems
    #[serde(default)]
    pub efi: Option<Partition>,
    /// The root filesystem
    pub root: RootTarget,
}

impl DiskLayout {
    /// All mountpoints in the layout, relative to the target root.
    pub fn relative_mountpoints(&self) -> impl Iterator<Item = &Utf8Path> {
        let root = match &self.root {
            RootTarget::Partition(p) => p.relative_mountpoint(),
            RootTarget::Lvm(_) => None,
        };
        [
            Some(self.boot.relative_mountpoint()),
            self.efi.as_ref().map(|e| e.relative_mountpoint()),
            Some(root),
        ]
        .into_iter()
        .flatten()
        .flatten()
    }
}
