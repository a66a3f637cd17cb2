//! The ordered list of installation steps.

use anyhow::{Context, Result};

use crate::install::Installer;
use crate::state::InstallState;
use crate::{bootloader, steps};

type StepFn = fn(&Installer, InstallState) -> Result<InstallState>;

/// One named installation step.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    /// Short name, shown in progress output and errors
    pub name: &'static str,
    run: StepFn,
}

impl Step {
    const fn new(name: &'static str, run: StepFn) -> Self {
        Self { name, run }
    }
}

/// Every step of a full installation, in the order they run.
pub fn default_steps() -> Vec<Step> {
    vec![
        Step::new("sanity-check", steps::base::sanity_check),
        Step::new("bootloader", bootloader::install_step),
        Step::new("base-system", steps::base::base_system),
        Step::new("fstab-placeholder", steps::base::fstab_placeholder),
        Step::new("mirrors", steps::base::mirrors),
        Step::new("time-sync", steps::base::time_sync),
        Step::new("swap", steps::base::swap),
        Step::new("third-party-repos", steps::repos::third_party_repos),
        Step::new("shell", steps::packages::shell),
        Step::new("gpu-drivers", steps::packages::gpu_drivers),
        Step::new("desktop-packages", steps::packages::desktop_packages),
        Step::new("user-defaults", steps::users::user_defaults),
        Step::new("timezone", steps::base::timezone),
        Step::new("accessibility", steps::base::accessibility),
        Step::new("users", steps::users::users),
        Step::new("desktop-defaults", steps::desktop::desktop_defaults),
        Step::new("display-manager-theme", steps::desktop::display_manager_theme),
        Step::new("finalize-dconf", steps::desktop::finalize_dconf),
        Step::new("services", steps::services::services),
        Step::new("fstab", steps::services::fstab),
        Step::new("initramfs", steps::services::initramfs),
    ]
}

/// Run `steps` in order, stopping at the first failure.
pub fn run(installer: &Installer, steps: &[Step]) -> Result<InstallState> {
    let total = steps.len();
    let mut state = InstallState::default();
    for (i, step) in steps.iter().enumerate() {
        let name = step.name;
        println!("[{}/{total}] {name}", i + 1);
        tracing::info!("Starting step {name}");
        state = (step.run)(installer, state).with_context(|| format!("Step {name}"))?;
        state.completed_steps.push(name);
    }
    Ok(state)
}
