use std::sync::atomic::AtomicBool;

use crate::config::AppConfig;
use crate::device::{pick_format, poll_until_available};
use crate::error::XrAppError;
use crate::frame::{FrameRuntime, FrameTiming};
use crate::session::{ExitRequest, RuntimeEvent, SessionRuntime};
use crate::{check, ensure, xr, Result};

/// Fills swapchain images with placeholder content using whatever graphics API `G` is.
pub trait SwapchainPainter<G: xr::Graphics> {
    /// Called once with every image of the swapchain, before the first frame.
    fn attach(
        &mut self,
        images: &[G::SwapchainImage],
        format: G::Format,
        resolution: xr::Extent2Di,
        view_count: u32,
    ) -> Result<()>;

    fn paint(&mut self, image_index: u32) -> Result<()>;
}

pub struct Swapchain<G: xr::Graphics> {
    pub handle: xr::Swapchain<G>,
    pub resolution: xr::Extent2Di,
    pub image_count: usize,
}

/// Everything OpenXR: the instance, a session bound to a graphics device, a local
/// reference space and one array swapchain with a slice per view.
pub struct XrShell<G: xr::Graphics, P> {
    pub xr_instance: xr::Instance,
    pub xr_system: xr::SystemId,
    pub xr_session: xr::Session<G>,

    pub xr_frame_waiter: xr::FrameWaiter,
    pub xr_frame_stream: xr::FrameStream<G>,

    pub xr_blend_mode: xr::EnvironmentBlendMode,
    pub xr_space: xr::Space,
    pub xr_swapchain: Swapchain<G>,

    pub xr_event_storage: xr::EventDataBuffer,

    view_configuration: xr::ViewConfigurationType,
    view_count: u32,
    painter: P,
}

/// Load the OpenXR loader and create an instance with `extensions` enabled. Every
/// requested extension must be offered by the runtime.
pub fn create_instance(config: &AppConfig, extensions: &xr::ExtensionSet) -> Result<xr::Instance> {
    #[cfg(feature = "static")]
    let xr_entry = xr::Entry::linked();
    #[cfg(not(feature = "static"))]
    let xr_entry = check!(unsafe { xr::Entry::load() })?;

    let available_extensions = check!(xr_entry.enumerate_extensions())?;
    log::debug!("{available_extensions:#?}");
    require_extensions(extensions, &available_extensions)?;

    let xr_instance = check!(xr_entry.create_instance(
        &xr::ApplicationInfo {
            application_name: config.application_name,
            application_version: config.application_version,
            engine_name: config.engine_name,
            engine_version: config.engine_version,
        },
        extensions,
        &[],
    ))?;

    let instance_props = check!(xr_instance.properties())?;
    log::info!(
        "Loaded OpenXR runtime: {} {}",
        instance_props.runtime_name,
        instance_props.runtime_version
    );
    Ok(xr_instance)
}

#[cfg(windows)]
fn require_extensions(requested: &xr::ExtensionSet, available: &xr::ExtensionSet) -> Result<()> {
    if requested.khr_d3d11_enable && !available.khr_d3d11_enable {
        return Err(XrAppError::unavailable("XR_KHR_D3D11_enable extension"));
    }
    Ok(())
}

#[cfg(not(windows))]
fn require_extensions(_requested: &xr::ExtensionSet, _available: &xr::ExtensionSet) -> Result<()> {
    Ok(())
}

/// Wait for a system of the configured form factor. The runtime reports
/// FORM_FACTOR_UNAVAILABLE while the headset is unplugged, so that keeps being retried.
pub fn find_system(
    xr_instance: &xr::Instance,
    config: &AppConfig,
    quit_signal: &AtomicBool,
) -> Result<xr::SystemId> {
    poll_until_available(
        "head-mounted display",
        config.system_retry_interval,
        quit_signal,
        || match xr_instance.system(config.form_factor) {
            Ok(system) => Ok(Some(system)),
            Err(xr::sys::Result::ERROR_FORM_FACTOR_UNAVAILABLE) => Ok(None),
            Err(e) => Err(XrAppError::external("xrGetSystem", e, file!(), line!())),
        },
    )
}

impl<G, P> XrShell<G, P>
where
    G: xr::Graphics,
    G::Format: Copy + PartialEq + std::fmt::Debug,
    P: SwapchainPainter<G>,
{
    /// # Safety
    ///
    /// `session_info` must describe a live graphics device created on the adapter the
    /// runtime asked for, which must outlive the returned shell.
    pub unsafe fn new(
        xr_instance: xr::Instance,
        xr_system: xr::SystemId,
        config: &AppConfig,
        session_info: &G::SessionCreateInfo,
        preferred_formats: &[G::Format],
        mut painter: P,
    ) -> Result<Self> {
        // Opaque or see-through display: take the first mode the runtime lists.
        let xr_blend_modes = check!(
            xr_instance.enumerate_environment_blend_modes(xr_system, config.view_configuration)
        )?;
        let xr_blend_mode = *xr_blend_modes
            .first()
            .ok_or_else(|| XrAppError::unavailable("environment blend mode"))?;

        // This does not start the session; that happens once the runtime says READY.
        let (xr_session, xr_frame_waiter, xr_frame_stream) =
            check!(xr_instance.create_session::<G>(xr_system, session_info))?;

        let xr_space = check!(
            xr_session.create_reference_space(config.reference_space, xr::Posef::IDENTITY)
        )?;

        let xr_swapchain = Self::create_swapchain(
            &xr_instance,
            xr_system,
            &xr_session,
            config,
            preferred_formats,
            &mut painter,
        )?;

        Ok(Self {
            xr_instance,
            xr_system,
            xr_session,
            xr_frame_waiter,
            xr_frame_stream,
            xr_blend_mode,
            xr_space,
            xr_swapchain,
            xr_event_storage: xr::EventDataBuffer::new(),
            view_configuration: config.view_configuration,
            view_count: config.view_count,
            painter,
        })
    }

    fn create_swapchain(
        xr_instance: &xr::Instance,
        system: xr::SystemId,
        session: &xr::Session<G>,
        config: &AppConfig,
        preferred_formats: &[G::Format],
        painter: &mut P,
    ) -> Result<Swapchain<G>> {
        // One image array serves every view, so the views have to agree on a size.
        let views = check!(
            xr_instance.enumerate_view_configuration_views(system, config.view_configuration)
        )?;
        ensure!(views.len() == config.view_count as usize);
        ensure!(views.iter().all(|v| {
            v.recommended_image_rect_width == views[0].recommended_image_rect_width
                && v.recommended_image_rect_height == views[0].recommended_image_rect_height
        }));

        let resolution = xr::Extent2Di {
            width: views[0].recommended_image_rect_width as i32,
            height: views[0].recommended_image_rect_height as i32,
        };

        let formats = check!(session.enumerate_swapchain_formats())?;
        let format = pick_format(preferred_formats, &formats)?;
        log::info!(
            "creating {}x{} swapchain with format {:?}",
            resolution.width,
            resolution.height,
            format
        );

        let handle = check!(session.create_swapchain(&xr::SwapchainCreateInfo {
            create_flags: xr::SwapchainCreateFlags::EMPTY,
            usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT
                | xr::SwapchainUsageFlags::SAMPLED,
            format,
            sample_count: 1,
            width: resolution.width as u32,
            height: resolution.height as u32,
            face_count: 1,
            array_size: config.view_count,
            mip_count: 1,
        }))?;

        let images = check!(handle.enumerate_images())?;
        painter.attach(&images, format, resolution, config.view_count)?;

        Ok(Swapchain {
            handle,
            resolution,
            image_count: images.len(),
        })
    }
}

fn runtime_event(event: xr::Event<'_>) -> RuntimeEvent {
    use xr::Event::*;
    match event {
        SessionStateChanged(e) => RuntimeEvent::SessionStateChanged(e.state().into()),
        InstanceLossPending(_) => RuntimeEvent::InstanceLossPending,
        EventsLost(e) => RuntimeEvent::EventsLost(e.lost_event_count()),
        ReferenceSpaceChangePending(_) => RuntimeEvent::Other("reference space change pending"),
        InteractionProfileChanged(_) => RuntimeEvent::Other("interaction profile changed"),
        _ => RuntimeEvent::Other("unrecognized"),
    }
}

impl<G: xr::Graphics, P> SessionRuntime for XrShell<G, P> {
    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>> {
        let event = check!(self.xr_instance.poll_event(&mut self.xr_event_storage))?;
        Ok(event.map(runtime_event))
    }

    fn begin_session(&mut self) -> Result<()> {
        check!(self.xr_session.begin(self.view_configuration))?;
        Ok(())
    }

    fn end_session(&mut self) -> Result<()> {
        check!(self.xr_session.end())?;
        Ok(())
    }

    fn request_exit(&mut self) -> Result<ExitRequest> {
        match self.xr_session.request_exit() {
            Ok(()) => Ok(ExitRequest::Pending),
            Err(xr::sys::Result::ERROR_SESSION_NOT_RUNNING) => Ok(ExitRequest::NotRunning),
            Err(e) => Err(XrAppError::external("xrRequestExitSession", e, file!(), line!())),
        }
    }
}

impl<G: xr::Graphics, P: SwapchainPainter<G>> FrameRuntime for XrShell<G, P> {
    type View = xr::View;

    fn wait_frame(&mut self) -> Result<FrameTiming> {
        Ok(check!(self.xr_frame_waiter.wait())?.into())
    }

    fn begin_frame(&mut self) -> Result<()> {
        check!(self.xr_frame_stream.begin())?;
        Ok(())
    }

    fn locate_views(&mut self, display_time: xr::Time) -> Result<Vec<xr::View>> {
        let (_view_flags, views) = check!(self.xr_session.locate_views(
            self.view_configuration,
            display_time,
            &self.xr_space
        ))?;
        Ok(views)
    }

    fn acquire_image(&mut self) -> Result<u32> {
        check!(self.xr_swapchain.handle.acquire_image())
    }

    fn wait_image(&mut self, timeout: xr::Duration) -> Result<()> {
        check!(self.xr_swapchain.handle.wait_image(timeout))
    }

    fn write_image(&mut self, image_index: u32) -> Result<()> {
        self.painter.paint(image_index)
    }

    fn release_image(&mut self) -> Result<()> {
        check!(self.xr_swapchain.handle.release_image())
    }

    fn end_frame(&mut self, display_time: xr::Time, views: Option<&[xr::View]>) -> Result<()> {
        let Some(views) = views else {
            check!(self
                .xr_frame_stream
                .end(display_time, self.xr_blend_mode, &[]))?;
            return Ok(());
        };
        ensure!(views.len() == self.view_count as usize);

        let rect = xr::Rect2Di {
            offset: xr::Offset2Di { x: 0, y: 0 },
            extent: self.xr_swapchain.resolution,
        };
        let projection_views: Vec<_> = views
            .iter()
            .enumerate()
            .map(|(index, view)| {
                xr::CompositionLayerProjectionView::new()
                    .pose(view.pose)
                    .fov(view.fov)
                    .sub_image(
                        xr::SwapchainSubImage::new()
                            .swapchain(&self.xr_swapchain.handle)
                            .image_array_index(index as u32)
                            .image_rect(rect),
                    )
            })
            .collect();

        check!(self.xr_frame_stream.end(
            display_time,
            self.xr_blend_mode,
            &[&xr::CompositionLayerProjection::new()
                .space(&self.xr_space)
                .views(&projection_views)],
        ))
    }
}
