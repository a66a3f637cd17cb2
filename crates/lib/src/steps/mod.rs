//! The individual installation steps, grouped by concern.
//!
//! Every step has the signature `fn(&Installer, InstallState) -> Result<InstallState>`;
//! see [`crate::pipeline`] for the order they run in.

pub(crate) mod base;
pub(crate) mod desktop;
pub(crate) mod packages;
pub(crate) mod repos;
pub(crate) mod services;
pub(crate) mod users;
