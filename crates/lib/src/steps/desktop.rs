//! Desktop defaults: dconf, sudo, the system zshrc and the login screen.

use anyhow::{Context, Result};
use camino::Utf8Path;
use fn_error_context::context;

use crate::install::Installer;
use crate::state::InstallState;

const DCONF_DB: &str = "etc/dconf/db";
const SDDM_THEMES: &str = "usr/share/sddm/themes";
const SDDM_THEME_URL: &str = "https://gitlab.com/api/v4/projects/37107648/packages/generic/sddm-eucalyptus-drop/2.0.0/sddm-eucalyptus-drop-v2.0.0.zip";
const PLYMOUTH_THEME: &str = "polaris";
const WHEEL_SUDOERS: &str = "%wheel ALL=(ALL:ALL) ALL";

const DCONF_PROFILE: &str = "user-db:user\nsystem-db:local\n";

const SYSTEM_ZSHRC: &str = r#"HISTFILE=~/.histfile
HISTSIZE=1000
SAVEHIST=1000
bindkey -e
zstyle :compinstall filename '$HOME/.zshrc'
autoload -Uz compinit
compinit
precmd() {print -rP '(%F{blue}%n%f @ %F{blue}%m%f - %F{blue}%~%f)'}
PROMPT='%F{green}>>%f '
"#;

/// Assets copied verbatim, as (asset name, destination in the target).
const BRANDING_ASSETS: &[(&str, &str)] = &[
    ("sddm.conf", "etc/sddm.conf"),
    ("mkinitcpio.conf", "etc/mkinitcpio.conf"),
    ("os-release", "etc/os-release"),
    ("lsb-release", "etc/lsb-release"),
];

/// System-wide dconf defaults, wheel sudo access and the system zshrc.
pub(crate) fn desktop_defaults(installer: &Installer, state: InstallState) -> Result<InstallState> {
    installer.copy_asset("00_defaults", &format!("{DCONF_DB}/local.d/00_defaults"))?;
    installer.write_file("etc/dconf/profile/user", DCONF_PROFILE)?;
    installer.append_line_once("etc/sudoers", WHEEL_SUDOERS)?;
    installer.write_file("etc/zsh/zshrc", SYSTEM_ZSHRC)?;
    Ok(state)
}

#[context("Installing SDDM theme")]
fn install_sddm_theme(installer: &Installer) -> Result<()> {
    let tmpdir = tempfile::tempdir().context("Creating download directory")?;
    let tmp = Utf8Path::from_path(tmpdir.path()).context("Non-UTF-8 temporary directory")?;
    let archive = tmp.join("sddm-theme.zip");
    installer
        .host
        .exec(&["wget", "-q", "-O", archive.as_str(), SDDM_THEME_URL])?;
    installer.root.create_dir_all(SDDM_THEMES)?;
    let themes = installer.target.join(SDDM_THEMES);
    installer
        .host
        .exec(&["unzip", "-o", "-q", archive.as_str(), "-d", themes.as_str()])?;
    Ok(())
}

/// Login screen theme and distribution branding.
pub(crate) fn display_manager_theme(
    installer: &Installer,
    state: InstallState,
) -> Result<InstallState> {
    install_sddm_theme(installer)?;
    for (asset, dest) in BRANDING_ASSETS {
        installer.copy_asset(asset, dest)?;
    }
    Ok(state)
}

/// Fix up dconf database permissions, compile it and select the boot splash.
pub(crate) fn finalize_dconf(installer: &Installer, state: InstallState) -> Result<InstallState> {
    installer.run_command("chown -R root:root /etc/dconf/db")?;
    installer.run_command("chmod -R 755 /etc/dconf/db")?;
    installer.run_command("dconf update")?;
    installer.run_command(&format!("plymouth-set-default-theme {PLYMOUTH_THEME}"))?;
    Ok(state)
}
