//! # Command line interface
//!
//! Parses arguments, loads the config and drives the installation.

use std::ffi::OsString;

use anyhow::{ensure, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use polaris_utils::PathQuotedDisplay;
use rustix::process::getuid;

use crate::config::{InstallConfig, CONFIG_VAR, DEFAULT_CONFIG_PATH};
use crate::host::SystemHost;
use crate::install::Installer;
use crate::pipeline;

/// Install Polaris Linux into a prepared, mounted target root.
///
/// Partitioning, formatting and mounting must already be done; the
/// disk layout is described in the config file.
#[derive(Debug, Parser, PartialEq, Eq)]
#[clap(name = "polaris-install", version)]
pub struct Opt {
    /// Path to the installation config
    #[clap(long, env = CONFIG_VAR, default_value = DEFAULT_CONFIG_PATH)]
    pub config: Utf8PathBuf,

    /// Override the target root from the config
    #[clap(long)]
    pub mountpoint: Option<Utf8PathBuf>,

    /// Print the installation steps and exit
    #[clap(long)]
    pub list_steps: bool,
}

fn list_steps() {
    for (i, step) in pipeline::default_steps().iter().enumerate() {
        println!("{:>2}. {}", i + 1, step.name);
    }
}

/// Parse the provided arguments and execute.
pub fn run_from_iter<I>(args: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    run_from_opt(Opt::parse_from(args))
}

fn run_from_opt(opt: Opt) -> Result<()> {
    if opt.list_steps {
        list_steps();
        return Ok(());
    }
    let mut config = InstallConfig::load(&opt.config)?;
    if let Some(mountpoint) = opt.mountpoint {
        config.mountpoint = mountpoint;
        config.validate()?;
    }
    ensure!(getuid().is_root(), "Must run as the root user");

    let host = SystemHost;
    let installer = Installer::new(&config, &host)?;
    println!(
        "Installing {} into {}",
        config.os_name,
        PathQuotedDisplay::new(installer.target())
    );
    let state = pipeline::run(&installer, &pipeline::default_steps())?;
    tracing::debug!("Enabled services: {}", state.enabled_services.join(" "));
    println!("Installation complete; the system is ready to reboot.");
    Ok(())
}
