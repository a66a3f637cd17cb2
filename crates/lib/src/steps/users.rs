//! Account defaults and user creation.

use anyhow::Result;
use fn_error_context::context;

use crate::config::UserConfig;
use crate::install::Installer;
use crate::state::InstallState;

const DEFAULT_SHELL: &str = "/usr/bin/zsh";
const ADMIN_GROUP: &str = "wheel";

/// Install `/etc/default/useradd` and seed the skeleton home directory.
pub(crate) fn user_defaults(installer: &Installer, state: InstallState) -> Result<InstallState> {
    installer.copy_asset("useradd", "etc/default/useradd")?;
    // New users get a zshrc so zsh-newuser-install stays quiet
    installer.write_file("etc/skel/.zshrc", "# hmm")?;
    Ok(state)
}

fn set_password(installer: &Installer, username: &str, password: &str) -> Result<()> {
    let input = format!("{username}:{password}\n");
    installer
        .host
        .chroot_with_input(&installer.target, &["chpasswd"], input.as_bytes())?;
    Ok(())
}

#[context("Creating user {}", user.username)]
fn create_user(installer: &Installer, user: &UserConfig) -> Result<()> {
    let mut args = vec!["useradd", "-m"];
    if user.sudo {
        args.extend(["-G", ADMIN_GROUP]);
    }
    args.extend(["-s", DEFAULT_SHELL, user.username.as_str()]);
    installer.host.chroot(&installer.target, &args)?;
    set_password(installer, &user.username, &user.password)
}

/// Set the root password and create the configured users.
pub(crate) fn users(installer: &Installer, state: InstallState) -> Result<InstallState> {
    let config = installer.config;
    match config.root_password.as_deref() {
        Some(pw) if !pw.is_empty() => set_password(installer, "root", pw)?,
        _ => tracing::info!("No root password set, root stays locked"),
    }
    for user in &config.users {
        create_user(installer, user)?;
    }
    Ok(state)
}
