//! Graphics device negotiation that doesn't depend on a particular graphics API: which
//! feature levels to ask for, the order of device-creation attempts, swapchain format
//! choice, and waiting for a device that isn't plugged in yet.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use crate::error::XrAppError;
use crate::Result;

/// Direct3D feature levels, ordered so that a higher level compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureLevel {
    L9_3,
    L10_0,
    L10_1,
    L11_0,
    L11_1,
    L12_0,
    L12_1,
}

impl FeatureLevel {
    /// Levels handed to device creation, most capable first.
    pub const REQUESTABLE: [FeatureLevel; 6] = [
        FeatureLevel::L12_1,
        FeatureLevel::L12_0,
        FeatureLevel::L11_1,
        FeatureLevel::L11_0,
        FeatureLevel::L10_1,
        FeatureLevel::L10_0,
    ];

    /// The `D3D_FEATURE_LEVEL` value.
    pub fn to_raw(self) -> u32 {
        match self {
            FeatureLevel::L9_3 => 0x9300,
            FeatureLevel::L10_0 => 0xa000,
            FeatureLevel::L10_1 => 0xa100,
            FeatureLevel::L11_0 => 0xb000,
            FeatureLevel::L11_1 => 0xb100,
            FeatureLevel::L12_0 => 0xc000,
            FeatureLevel::L12_1 => 0xc100,
        }
    }
}

/// Every requestable level at or above the runtime's raw `D3D_FEATURE_LEVEL` minimum,
/// most capable first.
pub fn select_feature_levels(raw_min: u32) -> Result<Vec<FeatureLevel>> {
    let levels: Vec<_> = FeatureLevel::REQUESTABLE
        .into_iter()
        .filter(|level| level.to_raw() >= raw_min)
        .collect();
    if levels.is_empty() {
        return Err(XrAppError::unavailable(format!(
            "feature level at or above {:#x}",
            raw_min
        )));
    }
    Ok(levels)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// The hardware adapter the XR runtime asked for.
    Adapter,
    /// The WARP software rasterizer.
    Warp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub driver: DriverKind,
    pub debug_layers: bool,
}

/// Device-creation attempts in the order they are made: hardware with the debug layer
/// (if asked for), hardware without it, then WARP.
pub fn device_candidates(debug_layers: bool) -> Vec<DeviceCandidate> {
    let mut candidates = Vec::with_capacity(3);
    if debug_layers {
        candidates.push(DeviceCandidate {
            driver: DriverKind::Adapter,
            debug_layers: true,
        });
    }
    candidates.push(DeviceCandidate {
        driver: DriverKind::Adapter,
        debug_layers: false,
    });
    candidates.push(DeviceCandidate {
        driver: DriverKind::Warp,
        debug_layers: false,
    });
    candidates
}

pub trait DeviceFactory {
    type Device;

    /// Create a device for one candidate. Anything partially created must be released
    /// before returning an error.
    fn create(&mut self, candidate: DeviceCandidate, levels: &[FeatureLevel]) -> Result<Self::Device>;
}

/// Try every candidate in order and return the first device that could be created,
/// together with the candidate that produced it. When every attempt fails the last
/// error is returned.
pub fn create_device<F: DeviceFactory>(
    factory: &mut F,
    debug_layers: bool,
    levels: &[FeatureLevel],
) -> Result<(F::Device, DeviceCandidate)> {
    let mut last_error = None;
    for candidate in device_candidates(debug_layers) {
        match factory.create(candidate, levels) {
            Ok(device) => {
                log::info!("created graphics device with {:?}", candidate);
                return Ok((device, candidate));
            }
            Err(e) => {
                log::warn!("device creation with {:?} failed: {}", candidate, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| XrAppError::unavailable("graphics device")))
}

/// First of our preferred formats that the runtime also supports.
pub fn pick_format<F: Copy + PartialEq + std::fmt::Debug>(preferred: &[F], available: &[F]) -> Result<F> {
    log::debug!("available swapchain formats: {:?}", available);
    preferred
        .iter()
        .copied()
        .find(|format| available.contains(format))
        .ok_or_else(|| XrAppError::unavailable("swapchain format"))
}

/// Call `attempt` until it yields a value, sleeping `interval` after each `Ok(None)`.
/// Errors end the wait immediately; so does a cleared `quit_signal`.
pub fn poll_until_available<T>(
    what: &str,
    interval: Duration,
    quit_signal: &AtomicBool,
    mut attempt: impl FnMut() -> Result<Option<T>>,
) -> Result<T> {
    let mut announced = false;
    loop {
        if let Some(value) = attempt()? {
            return Ok(value);
        }
        if !announced {
            log::warn!("waiting for {} to become available", what);
            announced = true;
        }
        if !quit_signal.load(Ordering::Relaxed) {
            return Err(XrAppError::unavailable(what));
        }
        thread::sleep(interval);
    }
}
