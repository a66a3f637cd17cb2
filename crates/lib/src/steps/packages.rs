//! Package selection beyond the base system.

use anyhow::Result;

use crate::install::Installer;
use crate::state::InstallState;

/// Firmware and tools only available from the extra repositories.
const REPO_PACKAGES: &[&str] = &[
    "polo",
    "aic94xx-firmware",
    "ast-firmware",
    "wd719x-firmware",
    "upd72020x-fw",
    "xvkbd",
];

/// The desktop and the applications shipped with it.
const DESKTOP_PACKAGES: &[&str] = &[
    "wget",
    "nano",
    "openssh",
    "wireless_tools",
    "wpa_supplicant",
    "smartmontools",
    "git",
    "networkmanager",
    "packagekit",
    "pacman-contrib",
    "firewalld",
    "python",
    "python-pip",
    "vim",
    "linux-firmware-qlogic",
    "linux-firmware-bnx2x",
    "linux-firmware-liquidio",
    "linux-firmware-mellanox",
    "linux-firmware-nfp",
    "mimalloc",
    "nasm",
    "xdg-utils",
    "htop",
    "pipewire",
    "pipewire-alsa",
    "pipewire-jack",
    "pipewire-pulse",
    "gst-plugin-pipewire",
    "libpulse",
    "wireplumber",
    "flatpak",
    "papirus-icon-theme",
    "gnu-free-fonts",
    "noto-fonts",
    "vlc",
    "thunderbird",
    "nerd-fonts",
    "firefox",
    "touchegg",
    "imagemagick",
    "bluez",
    "gparted",
    "wayland-protocols",
    "icoutils",
    "dosfstools",
    "jfsutils",
    "f2fs-tools",
    "btrfs-progs",
    "exfatprogs",
    "ntfs-3g",
    "reiserfsprogs",
    "udftools",
    "xfsprogs",
    "nilfs-utils",
    "polkit",
    "gpart",
    "mtools",
    "dhcpcd",
    "materia-gtk-theme",
    "budgie",
    "nemo",
    "feh",
    "network-manager-applet",
    "mousepad",
    "lzop",
    "xorg",
    "earlyoom",
    "go",
    "util-linux",
    "cairo",
    "fribidi",
    "gtk4",
    "hicolor-icon-theme",
    "icu",
    "json-glib",
    "libadwaita",
    "libportal",
    "libportal-gtk4",
    "pango",
    "vte-common",
    "meson",
    "lha",
    "tpm2-tools",
    "plymouth",
    "libnm",
    "fastfetch",
    "wireless-regdb",
    "galculator",
    "xaw3d",
    "libxp",
    "gnome-console",
    "file-roller",
    "ed",
    "qt6-5compat",
    "qt5-declarative",
    "sddm",
    "gspell",
];

/// Sync the package databases, install zsh and the repository-only packages.
pub(crate) fn shell(installer: &Installer, state: InstallState) -> Result<InstallState> {
    installer.run_command("pacman -Syyu zsh --noconfirm")?;
    installer.run_command(&format!(
        "pacman -Sy {} --noconfirm",
        REPO_PACKAGES.join(" ")
    ))?;
    Ok(state)
}

/// Install the drivers for the configured or detected GPU.
pub(crate) fn gpu_drivers(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let vendor = match installer.config.gpu_vendor {
        Some(v) => Some(v),
        None => installer.host.gpu_vendor()?,
    };
    let Some(vendor) = vendor else {
        tracing::warn!("No supported GPU found, skipping driver installation");
        return Ok(state);
    };
    println!("Installing {vendor} GPU drivers");
    installer.add_packages(vendor.driver_packages())?;
    Ok(state)
}

pub(crate) fn desktop_packages(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let extra = &installer.config.extra_packages;
    let packages = DESKTOP_PACKAGES
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .collect::<Vec<_>>();
    installer.add_packages(&packages)?;
    Ok(state)
}
