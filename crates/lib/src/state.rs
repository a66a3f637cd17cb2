//! Bookkeeping threaded through the installation steps.

use crate::bootloader::BootloaderKind;

/// What has been done to the target so far.
///
/// Each step receives the state produced by the previous one and returns
/// an updated copy; later steps consult it instead of re-deriving facts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallState {
    /// The bootloader that was deployed, once it has been
    pub bootloader: Option<BootloaderKind>,
    /// Services enabled in the target, in order
    pub enabled_services: Vec<String>,
    /// Names of the steps that finished
    pub completed_steps: Vec<&'static str>,
}

impl InstallState {
    /// Record that `service` was enabled.
    pub(crate) fn with_service(mut self, service: &str) -> Self {
        if !self.enabled_services.iter().any(|s| s == service) {
            self.enabled_services.push(service.to_owned());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_service_dedups() {
        let state = InstallState::default()
            .with_service("sddm")
            .with_service("bluetooth")
            .with_service("sddm");
        assert_eq!(state.enabled_services, ["sddm", "bluetooth"]);
    }
}
