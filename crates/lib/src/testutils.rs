//! Shared test fixtures: a scratch target root and a fake host.

use std::cell::RefCell;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

use crate::config::InstallConfig;
use crate::gpu::GpuVendor;
use crate::host::HostSystem;
use crate::install::Installer;

/// Files the limine package ships, created by [`FakeHost::strap`].
pub(crate) const LIMINE_FILES: &[&str] = &["BOOTIA32.EFI", "BOOTX64.EFI", "limine-bios.sys"];

pub(crate) const FSTAB_LINE: &str = "UUID=715be2b7 / ext4 rw,relatime 0 1";

/// Records every mutating call instead of touching the host.
#[derive(Debug, Default)]
pub(crate) struct FakeHost {
    pub(crate) uefi: bool,
    pub(crate) parent: Option<Utf8PathBuf>,
    pub(crate) alias: Option<Utf8PathBuf>,
    pub(crate) gpu: Option<GpuVendor>,
    /// Any call whose rendering contains this fails
    pub(crate) fail_on: Option<&'static str>,
    pub(crate) calls: RefCell<Vec<String>>,
}

impl FakeHost {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        let fail = self.fail_on.is_some_and(|f| call.contains(f));
        self.calls.borrow_mut().push(call.clone());
        if fail {
            anyhow::bail!("{call}: exit status: 1");
        }
        Ok(())
    }
}

impl HostSystem for FakeHost {
    fn has_uefi(&self) -> bool {
        self.uefi
    }

    fn strap(&self, target: &Utf8Path, packages: &[&str]) -> Result<()> {
        self.record(format!("strap {}", packages.join(" ")))?;
        if packages.contains(&"limine") {
            let share = target.join("usr/share/limine");
            std::fs::create_dir_all(&share)?;
            for f in LIMINE_FILES {
                std::fs::write(share.join(f), format!("contents of {f}"))?;
            }
        }
        Ok(())
    }

    fn parent_device(&self, _partition: &Utf8Path) -> Result<Option<Utf8PathBuf>> {
        Ok(self.parent.clone())
    }

    fn unique_path(&self, _device: &Utf8Path) -> Result<Option<Utf8PathBuf>> {
        Ok(self.alias.clone())
    }

    fn chroot(&self, _target: &Utf8Path, args: &[&str]) -> Result<String> {
        self.record(format!("chroot {}", args.join(" ")))?;
        Ok(String::new())
    }

    fn chroot_with_input(
        &self,
        _target: &Utf8Path,
        args: &[&str],
        input: &[u8],
    ) -> Result<String> {
        let input = String::from_utf8_lossy(input);
        self.record(format!("chroot {} <<< {}", args.join(" "), input.trim_end()))?;
        Ok(String::new())
    }

    fn exec(&self, args: &[&str]) -> Result<String> {
        self.record(format!("exec {}", args.join(" ")))?;
        if args.first() == Some(&"genfstab") {
            return Ok(format!("{FSTAB_LINE}\n"));
        }
        Ok(String::new())
    }

    fn gpu_vendor(&self) -> Result<Option<GpuVendor>> {
        Ok(self.gpu)
    }
}

/// A temporary target root plus a config pointing at it.
pub(crate) struct Fixture {
    _tempdir: tempfile::TempDir,
    pub(crate) config: InstallConfig,
}

impl Fixture {
    /// A BIOS-style layout: `/boot` on its own partition, ext4 root.
    pub(crate) fn new() -> Result<Self> {
        Self::with_config("")
    }

    /// Like [`Self::new`], with `extra` TOML prepended to the config.
    pub(crate) fn with_config(extra: &str) -> Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let base = Utf8Path::from_path(tempdir.path())
            .ok_or_else(|| anyhow::anyhow!("non-UTF-8 tempdir"))?
            .to_owned();
        let target = base.join("target");
        let assets = base.join("assets");
        std::fs::create_dir_all(target.join("boot"))?;
        std::fs::create_dir_all(&assets)?;
        let config = InstallConfig::parse(&format!(
            r#"
mountpoint = "{target}"
assets-dir = "{assets}"
{extra}

[disk.boot]
dev-path = "/dev/vda1"
mountpoint = "/boot"

[disk.root]
type = "partition"
dev-path = "/dev/vda2"
mountpoint = "/"
fs-type = "ext4"
partuuid = "0c4b1a5e-02"
"#
        ))?;
        Ok(Self {
            _tempdir: tempdir,
            config,
        })
    }

    pub(crate) fn installer<'a>(&'a self, host: &'a FakeHost) -> Result<Installer<'a>> {
        Installer::new(&self.config, host)
    }
}
