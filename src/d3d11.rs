//! Direct3D 11 graphics binding: finds the adapter the runtime wants, creates a device on
//! it and clears the swapchain images to the configured color.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::sync::atomic::AtomicBool;

use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT;
use windows::Win32::Graphics::Dxgi::*;

use crate::config::AppConfig;
use crate::device::{create_device, select_feature_levels, DeviceCandidate, DeviceFactory, DriverKind, FeatureLevel};
use crate::error::XrAppError;
use crate::shell::{self, SwapchainPainter, XrShell};
use crate::{check, xr, Result};

pub type D3D11Shell = XrShell<xr::D3D11, D3D11Painter>;

/// Enumerate DXGI adapters until one has the LUID the runtime asked for.
pub fn find_adapter(low_part: u32, high_part: i32) -> Result<IDXGIAdapter1> {
    let factory: IDXGIFactory1 = check!(unsafe { CreateDXGIFactory1() })?;
    let mut index = 0;
    loop {
        let adapter = match unsafe { factory.EnumAdapters1(index) } {
            Ok(adapter) => adapter,
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => {
                return Err(XrAppError::unavailable(format!(
                    "adapter with LUID {high_part:08x}:{low_part:08x}"
                )));
            }
            Err(e) => return Err(XrAppError::external("EnumAdapters1", e, file!(), line!())),
        };
        let desc = check!(unsafe { adapter.GetDesc1() })?;
        if desc.AdapterLuid.LowPart == low_part && desc.AdapterLuid.HighPart == high_part {
            log::info!(
                "using adapter {}",
                String::from_utf16_lossy(&desc.Description).trim_end_matches('\0')
            );
            return Ok(adapter);
        }
        index += 1;
    }
}

pub struct D3D11Device {
    pub device: ID3D11Device,
    pub context: ID3D11DeviceContext,
    pub feature_level: D3D_FEATURE_LEVEL,
}

pub struct D3D11Factory {
    adapter: IDXGIAdapter,
}

impl D3D11Factory {
    pub fn new(adapter: &IDXGIAdapter1) -> Result<Self> {
        Ok(Self {
            adapter: check!(adapter.cast::<IDXGIAdapter>())?,
        })
    }
}

impl DeviceFactory for D3D11Factory {
    type Device = D3D11Device;

    fn create(&mut self, candidate: DeviceCandidate, levels: &[FeatureLevel]) -> Result<D3D11Device> {
        let levels: Vec<_> = levels
            .iter()
            .map(|level| D3D_FEATURE_LEVEL(level.to_raw() as i32))
            .collect();
        let mut flags = D3D11_CREATE_DEVICE_BGRA_SUPPORT;
        if candidate.debug_layers {
            flags |= D3D11_CREATE_DEVICE_DEBUG;
        }

        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;
        let mut feature_level = D3D_FEATURE_LEVEL::default();
        // An explicit adapter needs the UNKNOWN driver type.
        match candidate.driver {
            DriverKind::Adapter => check!(unsafe {
                D3D11CreateDevice(
                    &self.adapter,
                    D3D_DRIVER_TYPE_UNKNOWN,
                    HMODULE::default(),
                    flags,
                    Some(&levels),
                    D3D11_SDK_VERSION,
                    Some(&mut device),
                    Some(&mut feature_level),
                    Some(&mut context),
                )
            })?,
            DriverKind::Warp => check!(unsafe {
                D3D11CreateDevice(
                    None,
                    D3D_DRIVER_TYPE_WARP,
                    HMODULE::default(),
                    flags,
                    Some(&levels),
                    D3D11_SDK_VERSION,
                    Some(&mut device),
                    Some(&mut feature_level),
                    Some(&mut context),
                )
            })?,
        }

        match (device, context) {
            (Some(device), Some(context)) => Ok(D3D11Device {
                device,
                context,
                feature_level,
            }),
            _ => Err(XrAppError::unavailable("Direct3D 11 device")),
        }
    }
}

/// Clears every view slice of the acquired image to one color.
pub struct D3D11Painter {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    clear_color: [f32; 4],
    render_target_views: Vec<ID3D11RenderTargetView>,
}

impl D3D11Painter {
    pub fn new(device: &D3D11Device, clear_color: [f32; 4]) -> Self {
        Self {
            device: device.device.clone(),
            context: device.context.clone(),
            clear_color,
            render_target_views: Vec::new(),
        }
    }
}

impl SwapchainPainter<xr::D3D11> for D3D11Painter {
    fn attach(
        &mut self,
        images: &[<xr::D3D11 as xr::Graphics>::SwapchainImage],
        format: <xr::D3D11 as xr::Graphics>::Format,
        _resolution: xr::Extent2Di,
        view_count: u32,
    ) -> Result<()> {
        let rtv_desc = D3D11_RENDER_TARGET_VIEW_DESC {
            Format: DXGI_FORMAT(format as i32),
            ViewDimension: D3D11_RTV_DIMENSION_TEXTURE2DARRAY,
            Anonymous: D3D11_RENDER_TARGET_VIEW_DESC_0 {
                Texture2DArray: D3D11_TEX2D_ARRAY_RTV {
                    MipSlice: 0,
                    FirstArraySlice: 0,
                    ArraySize: view_count,
                },
            },
        };

        self.render_target_views = images
            .iter()
            .map(|&image| {
                // The swapchain owns the texture; we must not release it.
                let texture =
                    ManuallyDrop::new(unsafe { ID3D11Texture2D::from_raw(image as *mut c_void) });
                let mut rtv: Option<ID3D11RenderTargetView> = None;
                check!(unsafe {
                    self.device
                        .CreateRenderTargetView(&*texture, Some(&rtv_desc), Some(&mut rtv))
                })?;
                rtv.ok_or_else(|| XrAppError::unavailable("render target view"))
            })
            .collect::<Result<_>>()?;
        log::debug!(
            "created {} render target views",
            self.render_target_views.len()
        );
        Ok(())
    }

    fn paint(&mut self, image_index: u32) -> Result<()> {
        let rtv = self
            .render_target_views
            .get(image_index as usize)
            .ok_or_else(|| XrAppError::unavailable(format!("swapchain image {image_index}")))?;
        unsafe {
            self.context.ClearRenderTargetView(rtv, &self.clear_color);
        }
        Ok(())
    }
}

/// Bring up everything needed before the first `xrPollEvent`: instance, system, D3D11
/// device on the runtime's adapter, session and swapchain.
pub fn create_shell(config: &AppConfig, quit_signal: &AtomicBool) -> Result<D3D11Shell> {
    let mut extensions = xr::ExtensionSet::default();
    extensions.khr_d3d11_enable = true;
    let xr_instance = shell::create_instance(config, &extensions)?;
    let xr_system = shell::find_system(&xr_instance, config, quit_signal)?;

    let requirements = check!(xr_instance.graphics_requirements::<xr::D3D11>(xr_system))?;
    let min_level = requirements.min_feature_level as u32;
    log::info!("runtime requires feature level {:#x}", min_level);
    let levels = select_feature_levels(min_level)?;

    let adapter = find_adapter(
        requirements.adapter_luid.LowPart,
        requirements.adapter_luid.HighPart,
    )?;
    let mut factory = D3D11Factory::new(&adapter)?;
    let (device, _candidate) = create_device(&mut factory, config.debug_layers, &levels)?;
    log::info!("device feature level {:?}", device.feature_level);

    let painter = D3D11Painter::new(&device, config.clear_color);
    // The painter keeps its own references to the device, so it lives as long as the session.
    unsafe {
        XrShell::new(
            xr_instance,
            xr_system,
            config,
            &xr::d3d::SessionCreateInfo {
                device: device.device.as_raw() as _,
            },
            config.preferred_color_formats,
            painter,
        )
    }
}
