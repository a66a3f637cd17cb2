//! Service enablement and the final steps before first boot.

use anyhow::Result;

use crate::install::Installer;
use crate::state::InstallState;

/// Enabled on every installation.
const DESKTOP_SERVICES: &[&str] = &["sddm", "touchegg", "NetworkManager", "bluetooth"];

/// Enable the desktop services, configured extras and bootloader units.
pub(crate) fn services(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let bootloader_services = state
        .bootloader
        .map(|kind| kind.services())
        .unwrap_or_default();
    let services = DESKTOP_SERVICES
        .iter()
        .copied()
        .chain(installer.config.extra_services.iter().map(String::as_str))
        .chain(bootloader_services.iter().copied())
        .collect::<Vec<_>>();
    services
        .into_iter()
        .try_fold(state, |state, service| installer.enable_service(state, service))
}

/// Append the mount table generated from the live mounts to `/etc/fstab`.
pub(crate) fn fstab(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let generated = installer
        .host
        .exec(&["genfstab", "-pU", installer.target().as_str()])?;
    for line in generated.lines().filter(|l| !l.trim().is_empty()) {
        installer.append_line_once("etc/fstab", line)?;
    }
    Ok(state)
}

pub(crate) fn initramfs(installer: &Installer, state: InstallState) -> Result<InstallState> {
    installer.run_command("mkinitcpio -P")?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::BootloaderKind;
    use crate::testutils::{FakeHost, Fixture, FSTAB_LINE};

    #[test]
    fn test_services() -> Result<()> {
        let fixture = Fixture::with_config(r#"extra-services = ["sshd", "sddm"]"#)?;
        let host = FakeHost::default();
        let installer = fixture.installer(&host)?;
        let state = InstallState {
            bootloader: Some(BootloaderKind::SystemdBoot),
            ..Default::default()
        }
        .with_service("systemd-timesyncd");
        let state = services(&installer, state)?;
        assert_eq!(
            state.enabled_services,
            [
                "systemd-timesyncd",
                "sddm",
                "touchegg",
                "NetworkManager",
                "bluetooth",
                "sshd",
                "systemd-boot-update.service",
            ]
        );
        assert_eq!(host.calls()[0], "chroot systemctl enable sddm");
        Ok(())
    }

    #[test]
    fn test_fstab() -> Result<()> {
        let fixture = Fixture::new()?;
        let host = FakeHost::default();
        let installer = fixture.installer(&host)?;
        installer.write_file("etc/fstab", "# Static information about the filesystems.\n")?;
        fstab(&installer, InstallState::default())?;
        fstab(&installer, InstallState::default())?;
        assert_eq!(
            host.calls()[0],
            format!("exec genfstab -pU {}", fixture.config.mountpoint)
        );
        assert_eq!(
            installer.root.read_to_string("etc/fstab")?,
            format!("# Static information about the filesystems.\n{FSTAB_LINE}\n")
        );
        Ok(())
    }

    #[test]
    fn test_initramfs_failure() -> Result<()> {
        let fixture = Fixture::new()?;
        let host = FakeHost {
            fail_on: Some("mkinitcpio"),
            ..Default::default()
        };
        let installer = fixture.installer(&host)?;
        let e = initramfs(&installer, InstallState::default()).unwrap_err();
        assert!(format!("{e:#}").contains("mkinitcpio -P"));
        Ok(())
    }
}
