//! GPU vendor detection and the matching driver sets.

use anyhow::{Context, Result};
use camino::Utf8Path;
use fn_error_context::context;
use serde::{Deserialize, Serialize};

/// Where the kernel exposes PCI devices.
pub(crate) const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

const PCI_VENDOR_AMD: u32 = 0x1002;
const PCI_VENDOR_INTEL: u32 = 0x8086;
const PCI_VENDOR_NVIDIA: u32 = 0x10de;
const PCI_VENDOR_VMWARE: u32 = 0x15ad;
/// PCI base class for display controllers.
const PCI_CLASS_DISPLAY: u32 = 0x03;
/// Turing (TU1xx) and later NVIDIA parts start at this device ID and
/// are supported by the open kernel modules.
const NVIDIA_TURING_FIRST_DEVICE: u32 = 0x1e00;

/// The GPU families we ship distinct driver sets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpuVendor {
    /// Intel integrated graphics
    Intel,
    /// VMware SVGA
    Vmware,
    /// AMD / ATI
    Amd,
    /// NVIDIA before Turing, proprietary modules only
    NvidiaBeforeTuring,
    /// NVIDIA Turing and newer, open kernel modules
    NvidiaTuringPlus,
}

impl GpuVendor {
    /// Packages to install for this vendor.
    pub fn driver_packages(&self) -> &'static [&'static str] {
        match self {
            GpuVendor::Amd => &[
                "vulkan-radeon",
                "xf86-video-ati",
                "mesa",
                "libva-mesa-driver",
                "xf86-video-amdgpu",
            ],
            GpuVendor::Intel => &[
                "mesa",
                "intel-media-driver",
                "libva-intel-driver",
                "vulkan-intel",
            ],
            GpuVendor::NvidiaBeforeTuring => &["dkms", "nvidia-dkms", "nvidia-utils"],
            GpuVendor::NvidiaTuringPlus => {
                &["nvidia-open-dkms", "nvidia-open", "dkms", "nvidia-utils"]
            }
            GpuVendor::Vmware => &["xf86-video-vmware", "mesa", "open-vm-tools"],
        }
    }

    fn from_pci_ids(vendor: u32, device: u32) -> Option<Self> {
        match vendor {
            PCI_VENDOR_AMD => Some(GpuVendor::Amd),
            PCI_VENDOR_INTEL => Some(GpuVendor::Intel),
            PCI_VENDOR_NVIDIA if device >= NVIDIA_TURING_FIRST_DEVICE => {
                Some(GpuVendor::NvidiaTuringPlus)
            }
            PCI_VENDOR_NVIDIA => Some(GpuVendor::NvidiaBeforeTuring),
            PCI_VENDOR_VMWARE => Some(GpuVendor::Vmware),
            _ => None,
        }
    }
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GpuVendor::Amd => "amd",
            GpuVendor::Intel => "intel",
            GpuVendor::NvidiaBeforeTuring => "nvidia_beforeturing",
            GpuVendor::NvidiaTuringPlus => "nvidia_turingplus",
            GpuVendor::Vmware => "vmware",
        };
        f.write_str(s)
    }
}

/// Parse a sysfs hex attribute such as `0x10de\n`.
fn read_hex(path: &Utf8Path) -> Result<u32> {
    let s = std::fs::read_to_string(path).with_context(|| format!("Reading {path}"))?;
    let s = s.trim();
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u32::from_str_radix(digits, 16).with_context(|| format!("Parsing {path}: {s:?}"))
}

/// Find the display controller we should install drivers for.
///
/// With more than one GPU present (typically an integrated Intel part
/// next to a discrete card) the discrete card wins; the [`Ord`] of
/// [`GpuVendor`] encodes that preference.
#[context("Detecting GPU vendor in {devices}")]
pub(crate) fn detect_gpu_vendor(devices: &Utf8Path) -> Result<Option<GpuVendor>> {
    let mut found = None;
    for entry in devices.read_dir_utf8()? {
        let entry = entry?;
        let dev = entry.path();
        let class = read_hex(&dev.join("class"))?;
        if class >> 16 != PCI_CLASS_DISPLAY {
            continue;
        }
        let vendor = read_hex(&dev.join("vendor"))?;
        let device = read_hex(&dev.join("device"))?;
        let Some(v) = GpuVendor::from_pci_ids(vendor, device) else {
            tracing::debug!("Ignoring display controller {vendor:04x}:{device:04x} at {dev}");
            continue;
        };
        tracing::debug!("Found {v} display controller at {dev}");
        found = found.max(Some(v));
    }
    Ok(found)
}
