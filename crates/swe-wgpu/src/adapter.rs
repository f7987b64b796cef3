//! Compute platform and device discovery.
//!
//! A platform is one `wgpu` backend (Vulkan, Metal, DX12, GL, ...) that
//! reported at least one adapter. Its devices are the adapters on that backend
//! that can run compute shaders, in driver enumeration order. Adapters without
//! compute support still make the platform visible but are not selectable.

use std::fmt::Write as _;

use tracing::{debug, error};

use crate::error::{DeviceError, Result};

/// Identifying information about a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Adapter name reported by the driver.
    pub name: String,
    /// Backend the adapter belongs to.
    pub backend: wgpu::Backend,
    /// Discrete, integrated, virtual, CPU, ...
    pub device_type: wgpu::DeviceType,
    /// PCI vendor id (0 if unknown).
    pub vendor: u32,
    /// Driver name and version.
    pub driver: String,
}

/// Something that can be listed and selected as a compute device.
pub trait DeviceHandle {
    /// Describe the device.
    fn device_info(&self) -> DeviceInfo;

    /// Returns true if the device can run compute shaders.
    fn supports_compute(&self) -> bool;
}

impl DeviceHandle for wgpu::Adapter {
    fn device_info(&self) -> DeviceInfo {
        let info = self.get_info();
        let driver = match (info.driver.is_empty(), info.driver_info.is_empty()) {
            (false, false) => format!("{} {}", info.driver, info.driver_info),
            (false, true) => info.driver,
            _ => info.driver_info,
        };

        DeviceInfo {
            name: info.name,
            backend: info.backend,
            device_type: info.device_type,
            vendor: info.vendor,
            driver,
        }
    }

    fn supports_compute(&self) -> bool {
        self.get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    }
}

/// Display name of a backend.
pub fn platform_name(backend: wgpu::Backend) -> String {
    match backend {
        wgpu::Backend::Vulkan => "Vulkan".to_string(),
        wgpu::Backend::Metal => "Metal".to_string(),
        wgpu::Backend::Dx12 => "DirectX 12".to_string(),
        wgpu::Backend::Gl => "OpenGL".to_string(),
        wgpu::Backend::BrowserWebGpu => "WebGPU".to_string(),
        other => format!("{:?}", other),
    }
}

#[derive(Debug)]
struct Platform<A> {
    backend: wgpu::Backend,
    devices: Vec<(DeviceInfo, A)>,
    skipped: usize,
}

/// Enumerated platforms, each with its devices.
#[derive(Debug)]
pub struct Platforms<A> {
    platforms: Vec<Platform<A>>,
}

impl<A: DeviceHandle> Platforms<A> {
    /// Group devices by backend, in order of first appearance.
    ///
    /// `searched` names the backends that were queried and only appears in
    /// the error when nothing was found.
    pub fn from_devices<I>(devices: I, searched: &str) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
    {
        let mut platforms: Vec<Platform<A>> = Vec::new();

        for handle in devices {
            let info = handle.device_info();
            let compute = handle.supports_compute();

            let slot = match platforms.iter().position(|p| p.backend == info.backend) {
                Some(slot) => slot,
                None => {
                    platforms.push(Platform {
                        backend: info.backend,
                        devices: Vec::new(),
                        skipped: 0,
                    });
                    platforms.len() - 1
                }
            };

            if compute {
                debug!("Found device {} on {:?}", info.name, info.backend);
                platforms[slot].devices.push((info, handle));
            } else {
                debug!("Skipping {} on {:?}: no compute shader support", info.name, info.backend);
                platforms[slot].skipped += 1;
            }
        }

        if platforms.is_empty() {
            return Err(DeviceError::NoPlatforms {
                backends: searched.to_string(),
            });
        }

        Ok(Self { platforms })
    }

    /// Number of platforms.
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    /// Always false: construction fails when no platform exists.
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Backend of platform `p`.
    pub fn backend(&self, p: usize) -> Option<wgpu::Backend> {
        self.platforms.get(p).map(|platform| platform.backend)
    }

    /// Display name of platform `p`.
    pub fn platform_name(&self, p: usize) -> Option<String> {
        self.backend(p).map(platform_name)
    }

    /// Number of selectable devices on platform `p`.
    pub fn device_count(&self, p: usize) -> usize {
        self.platforms.get(p).map_or(0, |platform| platform.devices.len())
    }

    /// Name of device `d` on platform `p`.
    pub fn device_name(&self, p: usize, d: usize) -> Option<&str> {
        self.device_info(p, d).map(|info| info.name.as_str())
    }

    /// Information about device `d` on platform `p`.
    pub fn device_info(&self, p: usize, d: usize) -> Option<&DeviceInfo> {
        self.platforms
            .get(p)
            .and_then(|platform| platform.devices.get(d))
            .map(|(info, _)| info)
    }

    /// Human-readable list of platforms and their devices.
    pub fn listing(&self) -> String {
        let mut out = String::new();

        for (p, platform) in self.platforms.iter().enumerate() {
            let _ = writeln!(
                out,
                "Platform {}: {} ({} device{})",
                p,
                platform_name(platform.backend),
                platform.devices.len(),
                if platform.devices.len() == 1 { "" } else { "s" }
            );
            for (d, (info, _)) in platform.devices.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  Device {}: {} [{:?}, driver {}]",
                    d,
                    info.name,
                    info.device_type,
                    if info.driver.is_empty() { "unknown" } else { info.driver.as_str() }
                );
            }
            if platform.skipped > 0 {
                let _ = writeln!(out, "  ({} without compute support)", platform.skipped);
            }
        }

        out
    }

    /// Take device `d` of platform `p`, consuming the enumeration.
    pub fn select(self, p: usize, d: usize) -> Result<A> {
        self.take(p, d).map_err(|err| {
            error!("{}: {}", err.diagnostic(), err);
            err
        })
    }

    fn take(self, p: usize, d: usize) -> Result<A> {
        let available = self.platforms.len();
        let platform = self
            .platforms
            .into_iter()
            .nth(p)
            .ok_or(DeviceError::InvalidSelection {
                what: "platform",
                index: p,
                available,
            })?;

        if platform.devices.is_empty() {
            return Err(DeviceError::NoDevices {
                platform: p,
                name: platform_name(platform.backend),
            });
        }

        let available = platform.devices.len();
        platform
            .devices
            .into_iter()
            .nth(d)
            .map(|(_, handle)| handle)
            .ok_or(DeviceError::InvalidSelection {
                what: "device",
                index: d,
                available,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct FakeDevice {
        name: &'static str,
        backend: wgpu::Backend,
        compute: bool,
    }

    impl FakeDevice {
        fn new(name: &'static str, backend: wgpu::Backend) -> Self {
            Self {
                name,
                backend,
                compute: true,
            }
        }
    }

    impl DeviceHandle for FakeDevice {
        fn device_info(&self) -> DeviceInfo {
            DeviceInfo {
                name: self.name.to_string(),
                backend: self.backend,
                device_type: wgpu::DeviceType::DiscreteGpu,
                vendor: 0x10de,
                driver: "fake 1.0".to_string(),
            }
        }

        fn supports_compute(&self) -> bool {
            self.compute
        }
    }

    fn sample() -> Platforms<FakeDevice> {
        Platforms::from_devices(
            vec![
                FakeDevice::new("gpu-a", wgpu::Backend::Vulkan),
                FakeDevice::new("gpu-b", wgpu::Backend::Gl),
                FakeDevice::new("gpu-c", wgpu::Backend::Vulkan),
            ],
            "all",
        )
        .unwrap()
    }

    #[test]
    fn test_grouping_keeps_first_appearance_order() {
        let platforms = sample();
        assert_eq!(platforms.len(), 2);
        assert_eq!(platforms.backend(0), Some(wgpu::Backend::Vulkan));
        assert_eq!(platforms.backend(1), Some(wgpu::Backend::Gl));
        assert_eq!(platforms.device_count(0), 2);
        assert_eq!(platforms.device_name(0, 1), Some("gpu-c"));
        assert_eq!(platforms.device_name(1, 0), Some("gpu-b"));
        assert_eq!(platforms.platform_name(1).as_deref(), Some("OpenGL"));
    }

    #[test]
    fn test_no_platforms() {
        let err = Platforms::<FakeDevice>::from_devices(Vec::new(), "VULKAN").unwrap_err();
        assert!(matches!(err, DeviceError::NoPlatforms { .. }));
        assert_eq!(err.code(), -1001);
        assert!(err.to_string().contains("VULKAN"));
    }

    #[test]
    fn test_select_device() {
        let device = sample().select(0, 1).unwrap();
        assert_eq!(device.name, "gpu-c");
    }

    #[test]
    fn test_platform_out_of_range() {
        let err = sample().select(5, 0).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidSelection { what: "platform", index: 5, available: 2 }
        ));
    }

    #[test]
    fn test_device_out_of_range() {
        let err = sample().select(1, 1).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidSelection { what: "device", index: 1, available: 1 }
        ));
    }

    #[test]
    fn test_platform_without_compute_devices() {
        let mut legacy = FakeDevice::new("old-gl", wgpu::Backend::Gl);
        legacy.compute = false;

        let platforms = Platforms::from_devices(
            vec![FakeDevice::new("gpu-a", wgpu::Backend::Vulkan), legacy],
            "all",
        )
        .unwrap();
        assert_eq!(platforms.len(), 2);
        assert_eq!(platforms.device_count(1), 0);
        assert!(platforms.listing().contains("without compute support"));

        let err = platforms.select(1, 0).unwrap_err();
        assert!(matches!(err, DeviceError::NoDevices { platform: 1, .. }));
        assert_eq!(err.call(), "select_device");
    }

    #[test]
    fn test_selection_errors_are_logged() {
        let logs = crate::test_log::capture(|| {
            assert!(sample().select(7, 0).is_err());
        });
        assert!(logs.contains("ERROR"), "{logs}");
        assert!(logs.contains("'select_device' returned -33"), "{logs}");
    }

    #[test]
    fn test_listing() {
        let listing = sample().listing();
        assert!(listing.contains("Platform 0: Vulkan (2 devices)"));
        assert!(listing.contains("Platform 1: OpenGL (1 device)"));
        assert!(listing.contains("  Device 1: gpu-c"));
    }
}
