//! The base system and its basic settings.

use anyhow::{ensure, Context, Result};
use fn_error_context::context;

use crate::install::Installer;
use crate::state::InstallState;
use crate::steps::repos;

/// Installed before anything else, together with the kernels.
const BASE_PACKAGES: &[&str] = &["base", "sudo", "linux-firmware", "mkinitcpio"];
const PACMAN_CONF: &str = "etc/pacman.conf";
const MIRRORLIST: &str = "etc/pacman.d/mirrorlist";
const ZRAM_GENERATOR_CONF: &str = "etc/systemd/zram-generator.conf";
const ZRAM_SERVICE: &str = "systemd-zram-setup@zram0.service";
const TIMESYNC_SERVICE: &str = "systemd-timesyncd";

/// Verify the target root and every configured mountpoint below it exist.
pub(crate) fn sanity_check(installer: &Installer, state: InstallState) -> Result<InstallState> {
    for mountpoint in installer.config.disk.relative_mountpoints() {
        if mountpoint.as_str().is_empty() {
            continue;
        }
        ensure!(
            installer.root.try_exists(mountpoint)?,
            "Mountpoint {}/{mountpoint} does not exist",
            installer.target
        );
    }
    Ok(state)
}

/// Install the base packages and kernels, then configure host name and locale.
pub(crate) fn base_system(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let config = installer.config;
    let mut packages: Vec<&str> = BASE_PACKAGES.to_vec();
    packages.extend(config.kernels.iter().map(String::as_str));
    installer.add_packages(&packages)?;

    let pacman_conf = installer
        .root
        .read_to_string(PACMAN_CONF)
        .with_context(|| format!("Reading /{PACMAN_CONF}"))?;
    installer.write_file(PACMAN_CONF, repos::enable_multilib(&pacman_conf))?;

    installer.write_file("etc/hostname", format!("{}\n", config.hostname))?;
    set_locale(installer)?;
    Ok(state)
}

#[context("Configuring locale")]
fn set_locale(installer: &Installer) -> Result<()> {
    let locale = &installer.config.locale;
    installer.append_line_once(
        "etc/locale.gen",
        &format!("{} {}", locale.lang, locale.encoding),
    )?;
    installer.run_command("locale-gen")?;
    installer.write_file("etc/locale.conf", format!("LANG={}\n", locale.lang))?;
    installer.write_file(
        "etc/vconsole.conf",
        format!("KEYMAP={}\n", locale.keyboard_layout),
    )?;
    Ok(())
}

/// genfstab appends to `/etc/fstab`, so `/etc` has to exist.
pub(crate) fn fstab_placeholder(installer: &Installer, state: InstallState) -> Result<InstallState> {
    installer
        .root
        .create_dir_all("etc")
        .context("Creating /etc")?;
    Ok(state)
}

fn render_mirrorlist(mirrors: &[String]) -> String {
    let mut out = String::from("## Generated by polaris-install\n");
    for mirror in mirrors {
        out.push_str(&format!("Server = {mirror}\n"));
    }
    out
}

/// Write the configured mirrors, if any.
pub(crate) fn mirrors(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let mirrors = &installer.config.mirrors;
    if mirrors.is_empty() {
        tracing::debug!("No mirrors configured, keeping the default mirrorlist");
        return Ok(state);
    }
    installer.write_file(MIRRORLIST, render_mirrorlist(mirrors))?;
    Ok(state)
}

pub(crate) fn time_sync(installer: &Installer, state: InstallState) -> Result<InstallState> {
    installer.enable_service(state, TIMESYNC_SERVICE)
}

/// Set up compressed swap in RAM.
pub(crate) fn swap(installer: &Installer, state: InstallState) -> Result<InstallState> {
    if !installer.config.zram {
        return Ok(state);
    }
    installer.add_packages(&["zram-generator"])?;
    installer.write_file(ZRAM_GENERATOR_CONF, "[zram0]\n")?;
    installer.enable_service(state, ZRAM_SERVICE)
}

pub(crate) fn timezone(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let Some(tz) = installer.config.timezone.as_deref() else {
        return Ok(state);
    };
    installer.host.chroot(
        &installer.target,
        &[
            "ln",
            "-sf",
            &format!("/usr/share/zoneinfo/{tz}"),
            "/etc/localtime",
        ],
    )?;
    Ok(state)
}

/// Enable the console screen reader when requested.
pub(crate) fn accessibility(installer: &Installer, state: InstallState) -> Result<InstallState> {
    if !installer.config.accessibility {
        return Ok(state);
    }
    installer.add_packages(&["espeakup"])?;
    installer.enable_service(state, "espeakup.service")
}
