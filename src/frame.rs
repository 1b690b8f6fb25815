use crate::xr;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub predicted_display_time: xr::Time,
    pub should_render: bool,
}

impl From<xr::FrameState> for FrameTiming {
    fn from(state: xr::FrameState) -> Self {
        Self {
            predicted_display_time: state.predicted_display_time,
            should_render: state.should_render,
        }
    }
}

/// The runtime calls one frame is made of. Only valid while the session is running.
pub trait FrameRuntime {
    /// Per-eye pose and field of view, as located for a given display time.
    type View;

    /// Block until the runtime wants the next frame.
    fn wait_frame(&mut self) -> Result<FrameTiming>;
    fn begin_frame(&mut self) -> Result<()>;
    fn locate_views(&mut self, display_time: xr::Time) -> Result<Vec<Self::View>>;

    fn acquire_image(&mut self) -> Result<u32>;
    fn wait_image(&mut self, timeout: xr::Duration) -> Result<()>;
    /// Fill the acquired image with placeholder content.
    fn write_image(&mut self, image_index: u32) -> Result<()>;
    fn release_image(&mut self) -> Result<()>;

    /// Submit the frame: one projection layer built from `views`, or no layers at all.
    fn end_frame(&mut self, display_time: xr::Time, views: Option<&[Self::View]>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct FrameLoop {
    frames_submitted: u64,
    frames_rendered: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frame_update<R: FrameRuntime>(&mut self, runtime: &mut R) -> Result<()> {
        // Block until the previous frame is finished displaying, and is ready for another one.
        let timing = runtime.wait_frame()?;
        let display_time = timing.predicted_display_time;

        // Every wait must be matched by exactly one begin, and every begin by one end.
        runtime.begin_frame()?;

        if !timing.should_render {
            log::trace!("not rendering this frame");
            runtime.end_frame(display_time, None)?;
            self.frames_submitted += 1;
            return Ok(());
        }

        let views = runtime.locate_views(display_time)?;

        // The runtime decides which image we get, and the compositor may still be reading
        // from it until the wait returns.
        let image_index = runtime.acquire_image()?;
        runtime.wait_image(xr::Duration::INFINITE)?;
        runtime.write_image(image_index)?;
        runtime.release_image()?;

        runtime.end_frame(display_time, Some(&views))?;

        if self.frames_rendered == 0 {
            log::debug!("first frame rendered into image {}", image_index);
        } else {
            log::trace!("rendered frame into image {}", image_index);
        }
        self.frames_submitted += 1;
        self.frames_rendered += 1;
        Ok(())
    }
}
