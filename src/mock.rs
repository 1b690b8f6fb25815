//! Scripted stand-in for the OpenXR runtime. Records every call it receives and rejects
//! frame calls outside a running session the way a real runtime would.

use std::collections::VecDeque;

use crate::error::XrAppError;
use crate::frame::{FrameRuntime, FrameTiming};
use crate::session::{ExitRequest, RuntimeEvent, SessionRuntime, SessionState};
use crate::xr;
use crate::Result;

const CHAIN_LENGTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    BeginSession,
    EndSession,
    RequestExit,
    WaitFrame,
    BeginFrame,
    LocateViews,
    AcquireImage,
    WaitImage,
    WriteImage(u32),
    ReleaseImage,
    EndFrame { layers: usize },
}

pub struct MockRuntime {
    pub events: VecDeque<RuntimeEvent>,
    /// Events that become visible once the given number of frames has been ended.
    pub scheduled: Vec<(u64, RuntimeEvent)>,
    /// `should_render` answers for upcoming frames; `true` once exhausted.
    pub should_render: VecDeque<bool>,
    pub fail_on: Option<Call>,

    pub calls: Vec<Call>,
    pub session_running: bool,
    pub frames_ended: u64,
    pub images_held: u32,
    next_image: u32,
    time: i64,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
            scheduled: Vec::new(),
            should_render: VecDeque::new(),
            fail_on: None,
            calls: Vec::new(),
            session_running: false,
            frames_ended: 0,
            images_held: 0,
            next_image: 0,
            time: 0,
        }
    }
}

impl MockRuntime {
    pub fn push_state(&mut self, state: SessionState) {
        self.events
            .push_back(RuntimeEvent::SessionStateChanged(state));
    }

    pub fn schedule_state(&mut self, after_frames: u64, state: SessionState) {
        self.scheduled
            .push((after_frames, RuntimeEvent::SessionStateChanged(state)));
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    fn record(&mut self, call: Call) -> Result<()> {
        self.calls.push(call);
        if self.fail_on == Some(call) {
            return Err(XrAppError::external(
                "mock",
                xr::sys::Result::ERROR_RUNTIME_FAILURE,
                file!(),
                line!(),
            ));
        }
        Ok(())
    }

    fn require_running(&self) -> Result<()> {
        if self.session_running {
            Ok(())
        } else {
            Err(XrAppError::external(
                "mock",
                xr::sys::Result::ERROR_SESSION_NOT_RUNNING,
                file!(),
                line!(),
            ))
        }
    }
}

impl SessionRuntime for MockRuntime {
    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>> {
        Ok(self.events.pop_front())
    }

    fn begin_session(&mut self) -> Result<()> {
        self.record(Call::BeginSession)?;
        self.session_running = true;
        Ok(())
    }

    fn end_session(&mut self) -> Result<()> {
        self.record(Call::EndSession)?;
        self.session_running = false;
        Ok(())
    }

    fn request_exit(&mut self) -> Result<ExitRequest> {
        self.record(Call::RequestExit)?;
        Ok(if self.session_running {
            ExitRequest::Pending
        } else {
            ExitRequest::NotRunning
        })
    }
}

impl FrameRuntime for MockRuntime {
    type View = u32;

    fn wait_frame(&mut self) -> Result<FrameTiming> {
        self.record(Call::WaitFrame)?;
        self.require_running()?;
        self.time += 11_111_111;
        Ok(FrameTiming {
            predicted_display_time: xr::Time::from_nanos(self.time),
            should_render: self.should_render.pop_front().unwrap_or(true),
        })
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.record(Call::BeginFrame)?;
        self.require_running()
    }

    fn locate_views(&mut self, _display_time: xr::Time) -> Result<Vec<u32>> {
        self.record(Call::LocateViews)?;
        Ok(vec![0, 1])
    }

    fn acquire_image(&mut self) -> Result<u32> {
        self.record(Call::AcquireImage)?;
        assert!(self.images_held < CHAIN_LENGTH, "acquired past the chain length");
        self.images_held += 1;
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % CHAIN_LENGTH;
        Ok(index)
    }

    fn wait_image(&mut self, timeout: xr::Duration) -> Result<()> {
        assert_eq!(timeout, xr::Duration::INFINITE);
        self.record(Call::WaitImage)
    }

    fn write_image(&mut self, image_index: u32) -> Result<()> {
        self.record(Call::WriteImage(image_index))
    }

    fn release_image(&mut self) -> Result<()> {
        self.record(Call::ReleaseImage)?;
        assert!(self.images_held > 0, "released an image that was never acquired");
        self.images_held -= 1;
        Ok(())
    }

    fn end_frame(&mut self, _display_time: xr::Time, views: Option<&[u32]>) -> Result<()> {
        self.record(Call::EndFrame {
            layers: views.map_or(0, |_| 1),
        })?;
        self.require_running()?;
        self.frames_ended += 1;

        let frames_ended = self.frames_ended;
        let (due, later): (Vec<_>, Vec<_>) = self
            .scheduled
            .drain(..)
            .partition(|(after, _)| *after <= frames_ended);
        self.scheduled = later;
        self.events.extend(due.into_iter().map(|(_, event)| event));
        Ok(())
    }
}
