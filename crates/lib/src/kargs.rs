//! Kernel arguments for the installed system.
//!
//! The root filesystem determines most of the command line: how to find the
//! root device, whether it has to be unlocked first, which btrfs subvolume to
//! mount and which filesystem driver to use.

use std::fmt::Display;

use anyhow::{Context, Result};
use fn_error_context::context;

use crate::disk::{DiskEncryption, EncryptionType, Partition, RootTarget};

/// The device-mapper name of an unlocked LUKS root.
const LUKS_MAPPER_NAME: &str = "luksdev";
/// The device-mapper name of an unlocked LUKS container holding LVM.
const LVM_LUKS_MAPPER_NAME: &str = "cryptlvm";
/// Passed when root is unlocked with a FIDO2 token.
const HSM_KARG: &str = "rd.luks.options=fido2-device=auto,password-echo=no";
/// zswap and zram do not mix.
const ZSWAP_DISABLED_KARG: &str = "zswap.enabled=0";
/// Mount root writable.
pub(crate) const RW_KARG: &str = "rw";

/// An ordered list of kernel arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelArgs(Vec<String>);

impl KernelArgs {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument.
    pub fn push(&mut self, arg: impl Into<String>) {
        self.0.push(arg.into())
    }

    /// Append every argument from an iterator.
    pub fn extend<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(args.into_iter().map(Into::into))
    }

    /// Iterate over the arguments.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Return the value of the first `key=value` argument with the given key.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.iter().find_map(|arg| match arg.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        })
    }
}

impl Display for KernelArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

fn partition_args(root: &Partition) -> Result<KernelArgs> {
    let mut args = KernelArgs::new();
    let id = if let Some(partuuid) = root.partuuid.as_deref() {
        format!("PARTUUID={partuuid}")
    } else {
        let uuid = root
            .uuid
            .as_deref()
            .with_context(|| format!("No PARTUUID or UUID known for {}", root.dev_path))?;
        format!("UUID={uuid}")
    };
    if root.encrypted {
        args.push(format!("cryptdevice={id}:{LUKS_MAPPER_NAME}"));
        args.push(format!("root=/dev/mapper/{LUKS_MAPPER_NAME}"));
    } else {
        args.push(format!("root={id}"));
    }
    Ok(args)
}

fn lvm_args(root: &crate::disk::LvmVolume, encryption: &DiskEncryption) -> Result<KernelArgs> {
    let mut args = KernelArgs::new();
    match encryption.kind {
        EncryptionType::LvmOnLuks => {
            let uuid = encryption
                .luks_uuid
                .as_deref()
                .context("lvm-on-luks requires the LUKS container UUID")?;
            args.push(format!("cryptdevice=UUID={uuid}:{LVM_LUKS_MAPPER_NAME}"));
            args.push(format!("root={}", root.dev_path()));
        }
        EncryptionType::LuksOnLvm => {
            let uuid = root
                .uuid
                .as_deref()
                .with_context(|| format!("No UUID known for {}", root.dev_path()))?;
            args.push(format!("cryptdevice=UUID={uuid}:{LUKS_MAPPER_NAME}"));
            args.push(format!("root=/dev/mapper/{LUKS_MAPPER_NAME}"));
        }
        EncryptionType::None | EncryptionType::Luks => {
            args.push(format!("root={}", root.dev_path()));
        }
    }
    Ok(args)
}

/// Compute the kernel arguments needed to boot from `root`.
///
/// `extra` is appended verbatim at the end.
#[context("Computing kernel arguments for {}", root.dev_path())]
pub(crate) fn root_kernel_args(
    root: &RootTarget,
    encryption: &DiskEncryption,
    zram: bool,
    extra: &[String],
) -> Result<KernelArgs> {
    let mut args = KernelArgs::new();
    let encrypted = match root {
        RootTarget::Partition(p) => p.encrypted,
        RootTarget::Lvm(_) => encryption.kind != EncryptionType::None,
    };
    if encrypted && encryption.hsm {
        args.push(HSM_KARG);
    }
    let base = match root {
        RootTarget::Partition(p) => partition_args(p)?,
        RootTarget::Lvm(v) => lvm_args(v, encryption)?,
    };
    args.extend(base.0);

    if zram {
        args.push(ZSWAP_DISABLED_KARG);
    }
    if let Some(subvol) = root.btrfs_subvols().iter().find(|s| s.is_root()) {
        args.push(format!("rootflags=subvol={}", subvol.name));
    }
    args.push(RW_KARG);
    let fs_type = root
        .fs_type()
        .with_context(|| format!("No filesystem type known for {}", root.dev_path()))?;
    args.push(format!("rootfstype={}", fs_type.mount_name()));
    args.extend(extra.iter().cloned());
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{FilesystemType, LvmVolume, Subvolume};

    fn partition() -> Partition {
        Partition {
            dev_path: "/dev/sda2".into(),
            mountpoint: Some("/".into()),
            fs_type: Some(FilesystemType::Ext4),
            partuuid: Some("0c4b1a5e-02".into()),
            uuid: Some("715be2b7-c458-49f2-acec-b2fdb53d9089".into()),
            encrypted: false,
            btrfs_subvols: Vec::new(),
        }
    }

    fn lvm() -> LvmVolume {
        LvmVolume {
            vg_name: "vg0".into(),
            name: "root".into(),
            fs_type: Some(FilesystemType::Xfs),
            uuid: Some("341c4712-54e8-4839-8020-d94073b1dc8b".into()),
            btrfs_subvols: Vec::new(),
        }
    }

    fn args_of(root: RootTarget, encryption: DiskEncryption, zram: bool) -> String {
        root_kernel_args(&root, &encryption, zram, &[])
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_plain_partition() {
        similar_asserts::assert_eq!(
            args_of(
                RootTarget::Partition(partition()),
                Default::default(),
                false
            ),
            "root=PARTUUID=0c4b1a5e-02 rw rootfstype=ext4"
        );
    }

    #[test]
    fn test_uuid_fallback_and_missing_id() {
        let mut p = partition();
        p.partuuid = None;
        similar_asserts::assert_eq!(
            args_of(RootTarget::Partition(p.clone()), Default::default(), false),
            "root=UUID=715be2b7-c458-49f2-acec-b2fdb53d9089 rw rootfstype=ext4"
        );
        p.uuid = None;
        let e = root_kernel_args(&RootTarget::Partition(p), &Default::default(), false, &[])
            .unwrap_err();
        assert!(format!("{e:#}").contains("No PARTUUID or UUID known for /dev/sda2"));
    }

    #[test]
    fn test_encrypted_btrfs_partition() {
        let mut p = partition();
        p.encrypted = true;
        p.fs_type = Some(FilesystemType::Btrfs);
        p.btrfs_subvols = vec![
            Subvolume {
                name: "@home".into(),
                mountpoint: Some("/home".into()),
            },
            Subvolume {
                name: "@".into(),
                mountpoint: Some("/".into()),
            },
        ];
        let encryption = DiskEncryption {
            kind: EncryptionType::Luks,
            luks_uuid: None,
            hsm: true,
        };
        similar_asserts::assert_eq!(
            args_of(RootTarget::Partition(p), encryption, true),
            "rd.luks.options=fido2-device=auto,password-echo=no \
             cryptdevice=PARTUUID=0c4b1a5e-02:luksdev root=/dev/mapper/luksdev \
             zswap.enabled=0 rootflags=subvol=@ rw rootfstype=btrfs"
        );
    }

    #[test]
    fn test_lvm_variants() {
        similar_asserts::assert_eq!(
            args_of(RootTarget::Lvm(lvm()), Default::default(), false),
            "root=/dev/vg0/root rw rootfstype=xfs"
        );
        let encryption = DiskEncryption {
            kind: EncryptionType::LvmOnLuks,
            luks_uuid: Some("d5e1a7c8".into()),
            hsm: false,
        };
        similar_asserts::assert_eq!(
            args_of(RootTarget::Lvm(lvm()), encryption, false),
            "cryptdevice=UUID=d5e1a7c8:cryptlvm root=/dev/vg0/root rw rootfstype=xfs"
        );
        let encryption = DiskEncryption {
            kind: EncryptionType::LuksOnLvm,
            luks_uuid: None,
            hsm: false,
        };
        similar_asserts::assert_eq!(
            args_of(RootTarget::Lvm(lvm()), encryption, false),
            "cryptdevice=UUID=341c4712-54e8-4839-8020-d94073b1dc8b:luksdev \
             root=/dev/mapper/luksdev rw rootfstype=xfs"
        );
        let encryption = DiskEncryption {
            kind: EncryptionType::LvmOnLuks,
            luks_uuid: None,
            hsm: false,
        };
        assert!(root_kernel_args(&RootTarget::Lvm(lvm()), &encryption, false, &[]).is_err());
    }

    #[test]
    fn test_extra_and_lookup() {
        let extra = vec!["nvidia_drm.modeset=1".to_string()];
        let args =
            root_kernel_args(&RootTarget::Partition(partition()), &Default::default(), false, &extra)
                .unwrap();
        assert_eq!(args.value_of("rootfstype"), Some("ext4"));
        assert_eq!(args.value_of("nvidia_drm.modeset"), Some("1"));
        assert_eq!(args.value_of("missing"), None);
        assert_eq!(args.iter().last(), Some("nvidia_drm.modeset=1"));
    }
}
