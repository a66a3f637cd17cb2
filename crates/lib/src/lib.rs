//! # Polaris Linux installer
//!
//! This crate installs the Polaris Linux desktop into a target root that
//! has already been partitioned, formatted and mounted. It deploys a
//! bootloader, installs packages, configures the system and creates users,
//! running each of these as a step of a fixed [`pipeline`].
//!
//! Side effects on the installation host go through [`host::HostSystem`].

pub mod bootloader;
pub mod cli;
pub mod config;
pub mod disk;
pub mod gpu;
pub mod host;
pub mod install;
pub mod kargs;
pub mod pipeline;
pub mod state;
mod steps;

#[cfg(test)]
mod testutils;

pub use bootloader::{BootloaderKind, DiskError};
pub use config::InstallConfig;
pub use install::Installer;
pub use state::InstallState;
