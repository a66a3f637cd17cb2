//! The installation context shared by all steps.

use std::io::Read;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std_ext::cap_std::{self, fs::Dir};
use cap_std_ext::dirext::CapStdExtDirExt;
use fn_error_context::context;

use crate::config::InstallConfig;
use crate::host::HostSystem;
use crate::state::InstallState;

/// A target root being installed into.
#[derive(Debug)]
pub struct Installer<'a> {
    pub(crate) config: &'a InstallConfig,
    pub(crate) host: &'a dyn HostSystem,
    /// Absolute path of the target root on the host
    pub(crate) target: Utf8PathBuf,
    /// The target root
    pub(crate) root: Dir,
}

impl<'a> Installer<'a> {
    /// Open the target root named by the config.
    #[context("Opening target root {}", config.mountpoint)]
    pub fn new(config: &'a InstallConfig, host: &'a dyn HostSystem) -> Result<Self> {
        let target = config.mountpoint.clone();
        let root = Dir::open_ambient_dir(&target, cap_std::ambient_authority())?;
        Ok(Self {
            config,
            host,
            target,
            root,
        })
    }

    /// The target root on the host.
    pub fn target(&self) -> &Utf8Path {
        &self.target
    }

    /// Run a command given as a shell-style string inside the target.
    pub(crate) fn run_command(&self, cmdline: &str) -> Result<String> {
        let args = shlex::split(cmdline).with_context(|| format!("Parsing {cmdline:?}"))?;
        let args = args.iter().map(String::as_str).collect::<Vec<_>>();
        self.host
            .chroot(&self.target, &args)
            .with_context(|| format!("Running {cmdline:?} in {}", self.target))
    }

    /// Install packages into the target.
    pub(crate) fn add_packages<S: AsRef<str>>(&self, packages: &[S]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let packages = packages.iter().map(AsRef::as_ref).collect::<Vec<_>>();
        tracing::info!("Installing packages: {}", packages.join(" "));
        self.host.strap(&self.target, &packages)
    }

    /// Enable a systemd unit in the target.
    #[context("Enabling {service}")]
    pub(crate) fn enable_service(&self, state: InstallState, service: &str) -> Result<InstallState> {
        tracing::info!("Enabling service {service}");
        self.host
            .chroot(&self.target, &["systemctl", "enable", service])?;
        Ok(state.with_service(service))
    }

    /// Write a file in the target, creating parent directories.
    pub(crate) fn write_file(&self, path: &str, contents: impl AsRef<[u8]>) -> Result<()> {
        let path = Utf8Path::new(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            self.root
                .create_dir_all(parent)
                .with_context(|| format!("Creating {parent}"))?;
        }
        self.root
            .atomic_write(path, contents)
            .with_context(|| format!("Writing /{path}"))
    }

    /// Append `line` to a file in the target unless it already contains it.
    ///
    /// Returns whether the file was changed.
    pub(crate) fn append_line_once(&self, path: &str, line: &str) -> Result<bool> {
        let mut existing = String::new();
        if let Some(mut f) = self
            .root
            .open_optional(path)
            .with_context(|| format!("Opening /{path}"))?
        {
            f.read_to_string(&mut existing)
                .with_context(|| format!("Reading /{path}"))?;
        }
        if existing.lines().any(|l| l.trim() == line.trim()) {
            return Ok(false);
        }
        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(line);
        updated.push('\n');
        self.write_file(path, updated)?;
        Ok(true)
    }

    /// Copy a file from the asset directory into the target.
    #[context("Copying asset {name} to /{dest}")]
    pub(crate) fn copy_asset(&self, name: &str, dest: &str) -> Result<()> {
        let assets = Dir::open_ambient_dir(&self.config.assets_dir, cap_std::ambient_authority())
            .with_context(|| format!("Opening {}", self.config.assets_dir))?;
        let dest = Utf8Path::new(dest);
        if let Some(parent) = dest.parent().filter(|p| !p.as_str().is_empty()) {
            self.root.create_dir_all(parent)?;
        }
        assets.copy(name, &self.root, dest)?;
        Ok(())
    }
}
