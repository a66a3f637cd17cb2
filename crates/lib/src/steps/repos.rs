//! Extra pacman repositories.

use anyhow::Result;
use fn_error_context::context;

use crate::install::Installer;
use crate::state::InstallState;

const PACMAN_CONF: &str = "etc/pacman.conf";
/// Signing key of the Chaotic-AUR maintainers.
const CHAOTIC_KEY: &str = "3056513887B78AEB";
const CHAOTIC_CDN: &str = "https://cdn-mirror.chaotic.cx/chaotic-aur";
const CHAOTIC_BOOTSTRAP_PACKAGES: &[&str] = &["chaotic-keyring", "chaotic-mirrorlist"];

/// A `[section]` of pacman.conf.
#[derive(Debug)]
struct RepoSection {
    name: &'static str,
    body: &'static [&'static str],
}

const REPOSITORIES: &[RepoSection] = &[
    RepoSection {
        name: "polaris",
        body: &[
            "Server = https://polaris-linux-distro.github.io/pacman-repo/repo",
            "SigLevel = Optional TrustAll",
        ],
    },
    RepoSection {
        name: "chaotic-aur",
        body: &["Include = /etc/pacman.d/chaotic-mirrorlist"],
    },
];

impl RepoSection {
    fn header(&self) -> String {
        format!("[{}]", self.name)
    }

    fn render(&self) -> String {
        let mut out = self.header();
        out.push('\n');
        for line in self.body {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Uncomment the `[multilib]` section and the line following it.
pub(crate) fn enable_multilib(conf: &str) -> String {
    let mut out = String::with_capacity(conf.len());
    let mut in_multilib = false;
    for line in conf.lines() {
        let trimmed = line.trim();
        if trimmed == "#[multilib]" || trimmed == "[multilib]" {
            in_multilib = true;
            out.push_str("[multilib]\n");
            continue;
        }
        if in_multilib {
            in_multilib = false;
            if let Some(include) = trimmed.strip_prefix('#') {
                if include.trim_start().starts_with("Include") {
                    out.push_str(include.trim_start());
                    out.push('\n');
                    continue;
                }
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Append each repository whose section header is not yet present.
fn add_repositories(conf: &str) -> String {
    let mut out = conf.to_owned();
    for repo in REPOSITORIES {
        let header = repo.header();
        if conf.lines().any(|l| l.trim() == header) {
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&repo.render());
    }
    out
}

#[context("Trusting the Chaotic-AUR key")]
fn import_chaotic_key(installer: &Installer) -> Result<()> {
    installer.run_command("pacman-key --init")?;
    installer.run_command(&format!("pacman-key --recv-key {CHAOTIC_KEY}"))?;
    installer.run_command(&format!("pacman-key --lsign-key {CHAOTIC_KEY}"))?;
    for package in CHAOTIC_BOOTSTRAP_PACKAGES {
        installer.run_command(&format!(
            "pacman -U '{CHAOTIC_CDN}/{package}.pkg.tar.zst' --noconfirm"
        ))?;
    }
    Ok(())
}

/// Register the distribution repository and the Chaotic-AUR.
pub(crate) fn third_party_repos(installer: &Installer, state: InstallState) -> Result<InstallState> {
    println!("Installing Chaotic AUR");
    import_chaotic_key(installer)?;
    let conf = installer.root.read_to_string(PACMAN_CONF)?;
    let updated = add_repositories(&conf);
    if updated != conf {
        installer.write_file(PACMAN_CONF, updated)?;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{FakeHost, Fixture};
    use indoc::indoc;

    const STOCK: &str = indoc! { "
        [core]
        Include = /etc/pacman.d/mirrorlist

        #[multilib-testing]
        #Include = /etc/pacman.d/mirrorlist

        #[multilib]
        #Include = /etc/pacman.d/mirrorlist
    " };

    #[test]
    fn test_enable_multilib() {
        let out = enable_multilib(STOCK);
        similar_asserts::assert_eq!(
            out,
            indoc! { "
                [core]
                Include = /etc/pacman.d/mirrorlist

                #[multilib-testing]
                #Include = /etc/pacman.d/mirrorlist

                [multilib]
                Include = /etc/pacman.d/mirrorlist
            " }
        );
        assert_eq!(enable_multilib(&out), out);
    }

    #[test]
    fn test_add_repositories_idempotent() {
        let once = add_repositories(STOCK);
        assert!(once.ends_with(indoc! { "
            #Include = /etc/pacman.d/mirrorlist

            [polaris]
            Server = https://polaris-linux-distro.github.io/pacman-repo/repo
            SigLevel = Optional TrustAll

            [chaotic-aur]
            Include = /etc/pacman.d/chaotic-mirrorlist
        " }));
        assert_eq!(add_repositories(&once), once);
    }

    #[test]
    fn test_third_party_repos() -> Result<()> {
        let fixture = Fixture::new()?;
        let host = FakeHost::default();
        let installer = fixture.installer(&host)?;
        installer.write_file(PACMAN_CONF, STOCK)?;
        third_party_repos(&installer, InstallState::default())?;
        assert_eq!(
            host.calls(),
            [
                "chroot pacman-key --init",
                "chroot pacman-key --recv-key 3056513887B78AEB",
                "chroot pacman-key --lsign-key 3056513887B78AEB",
                "chroot pacman -U https://cdn-mirror.chaotic.cx/chaotic-aur/chaotic-keyring.pkg.tar.zst --noconfirm",
                "chroot pacman -U https://cdn-mirror.chaotic.cx/chaotic-aur/chaotic-mirrorlist.pkg.tar.zst --noconfirm",
            ]
        );
        let conf = installer.root.read_to_string(PACMAN_CONF)?;
        assert_eq!(conf.matches("[chaotic-aur]").count(), 1);
        assert!(conf.contains("[polaris]\n"));
        Ok(())
    }

    #[test]
    fn test_key_failure_leaves_conf() -> Result<()> {
        let fixture = Fixture::new()?;
        let host = FakeHost {
            fail_on: Some("--recv-key"),
            ..Default::default()
        };
        let installer = fixture.installer(&host)?;
        installer.write_file(PACMAN_CONF, STOCK)?;
        let e = third_party_repos(&installer, InstallState::default()).unwrap_err();
        assert!(format!("{e:#}").starts_with("Trusting the Chaotic-AUR key: "));
        assert_eq!(installer.root.read_to_string(PACMAN_CONF)?, STOCK);
        Ok(())
    }
}
