use std::time::Duration;

use crate::xr;

// DXGI_FORMAT codes, as OpenXR reports them for the D3D11 binding.
pub const DXGI_FORMAT_R8G8B8A8_UNORM: u32 = 28;
pub const DXGI_FORMAT_R8G8B8A8_UNORM_SRGB: u32 = 29;
pub const DXGI_FORMAT_B8G8R8A8_UNORM: u32 = 87;
pub const DXGI_FORMAT_B8G8R8A8_UNORM_SRGB: u32 = 91;

#[cfg(all(windows, not(target_vendor = "uwp")))]
pub const PROGRAM_NAME: &str = "BasicXrApp_win32";
#[cfg(not(all(windows, not(target_vendor = "uwp"))))]
pub const PROGRAM_NAME: &str = "BasicXrApp_uwp";

/// Everything the app would otherwise read from globals. Built once at start-up
/// and handed by reference to the bootstrap, session and frame components.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub application_name: &'static str,
    pub application_version: u32,
    pub engine_name: &'static str,
    pub engine_version: u32,

    pub form_factor: xr::FormFactor,
    pub view_configuration: xr::ViewConfigurationType,
    pub view_count: u32,
    pub reference_space: xr::ReferenceSpaceType,

    /// Swapchain formats we can write to, most preferred first.
    pub preferred_color_formats: &'static [u32],
    /// Placeholder content written to every rendered image (RGBA).
    pub clear_color: [f32; 4],

    /// How long the driver loop sleeps while the session isn't running.
    pub idle_poll_interval: Duration,
    /// How long to wait between attempts to find a head-mounted display.
    pub system_retry_interval: Duration,

    /// Ask for the D3D11 debug layer on the first device-creation attempt.
    pub debug_layers: bool,

    /// Size of the pbuffer surface the EGL host makes current.
    pub pbuffer_size: (i32, i32),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application_name: PROGRAM_NAME,
            application_version: 1,
            engine_name: "basic-xr-app",
            engine_version: 1,

            form_factor: xr::FormFactor::HEAD_MOUNTED_DISPLAY,
            view_configuration: xr::ViewConfigurationType::PRIMARY_STEREO,
            view_count: 2,
            reference_space: xr::ReferenceSpaceType::LOCAL,

            preferred_color_formats: &[
                DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
                DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
                DXGI_FORMAT_R8G8B8A8_UNORM,
                DXGI_FORMAT_B8G8R8A8_UNORM,
            ],
            clear_color: [0.0, 0.0, 1.0, 1.0],

            idle_poll_interval: Duration::from_millis(250),
            system_retry_interval: Duration::from_secs(1),

            debug_layers: cfg!(debug_assertions),

            pbuffer_size: (1024, 768),
        }
    }
}
