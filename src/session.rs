use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bitflags::bitflags;

use crate::xr;
use crate::Result;

/// Session lifecycle as reported by the runtime. Only [SessionController] ever changes
/// its copy, and only in response to a runtime event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl From<xr::SessionState> for SessionState {
    fn from(state: xr::SessionState) -> Self {
        match state {
            xr::SessionState::IDLE => Self::Idle,
            xr::SessionState::READY => Self::Ready,
            xr::SessionState::SYNCHRONIZED => Self::Synchronized,
            xr::SessionState::VISIBLE => Self::Visible,
            xr::SessionState::FOCUSED => Self::Focused,
            xr::SessionState::STOPPING => Self::Stopping,
            xr::SessionState::LOSS_PENDING => Self::LossPending,
            xr::SessionState::EXITING => Self::Exiting,
            _ => Self::Unknown,
        }
    }
}

/// The subset of `xr::Event` the lifecycle controller cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    SessionStateChanged(SessionState),
    InstanceLossPending,
    EventsLost(u32),
    Other(&'static str),
}

bitflags! {
    #[derive(Default)]
    pub struct PollStatus: u32 {
        const QUIT  = 1<<0;
        const FRAME = 1<<1;
    }
}

/// Outcome of asking the runtime to wind the session down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRequest {
    /// The runtime will walk the session through STOPPING and EXITING.
    Pending,
    /// There is no running session to stop; quit right away.
    NotRunning,
}

/// The runtime calls the lifecycle controller needs.
pub trait SessionRuntime {
    /// Next queued event, or `None` once the queue is drained. Never blocks.
    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>>;
    fn begin_session(&mut self) -> Result<()>;
    fn end_session(&mut self) -> Result<()>;
    fn request_exit(&mut self) -> Result<ExitRequest>;
}

pub struct SessionController {
    current_state: SessionState,
    running: bool,
    exit_requested: bool,
    quit_signal: Arc<AtomicBool>,
}

impl SessionController {
    /// `quit_signal` starts out `true` and is cleared (e.g. by a Ctrl-C handler) to ask
    /// for a clean shutdown.
    pub fn new(quit_signal: Arc<AtomicBool>) -> Self {
        Self {
            current_state: SessionState::Unknown,
            running: false,
            exit_requested: false,
            quit_signal,
        }
    }

    pub fn current_state(&self) -> SessionState {
        self.current_state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit_signal(&self) -> Arc<AtomicBool> {
        self.quit_signal.clone()
    }

    /// Drain every pending runtime event and report whether the caller should render a
    /// frame, quit, or neither (session not running yet).
    pub fn poll_events<R: SessionRuntime>(&mut self, runtime: &mut R) -> Result<PollStatus> {
        log::trace!("Poll Events");
        let mut status = PollStatus::empty();

        if !self.quit_signal.load(Ordering::Relaxed) && !self.exit_requested {
            log::debug!("requesting exit");
            // The runtime may want to transition out smoothly, so the exit only happens
            // once it tells us the session is EXITING.
            self.exit_requested = true;
            if runtime.request_exit()? == ExitRequest::NotRunning {
                status.insert(PollStatus::QUIT);
            }
        }

        while let Some(event) = runtime.poll_event()? {
            let quitting = status.contains(PollStatus::QUIT);
            if self.handle_event(runtime, event, quitting)? {
                status.insert(PollStatus::QUIT);
            }
        }

        if self.running && !status.contains(PollStatus::QUIT) {
            status.insert(PollStatus::FRAME);
        }
        Ok(status)
    }

    /// Returns `true` when the event ends the program. Once `quitting`, READY no longer
    /// begins a session.
    fn handle_event<R: SessionRuntime>(
        &mut self,
        runtime: &mut R,
        event: RuntimeEvent,
        quitting: bool,
    ) -> Result<bool> {
        match event {
            RuntimeEvent::SessionStateChanged(state) => {
                log::info!("entered state {:?}", state);
                self.current_state = state;
                match state {
                    SessionState::Ready => {
                        if quitting {
                            log::debug!("not beginning session, quitting");
                        } else if !self.running {
                            runtime.begin_session()?;
                            self.running = true;
                        }
                    }
                    SessionState::Stopping => {
                        runtime.end_session()?;
                        self.running = false;
                    }
                    // A LOSS_PENDING session could in principle be recreated once the
                    // system is available again; we treat it as final.
                    SessionState::Exiting | SessionState::LossPending => return Ok(true),
                    _ => {}
                }
            }
            RuntimeEvent::InstanceLossPending => {
                log::warn!("instance loss pending");
                return Ok(true);
            }
            RuntimeEvent::EventsLost(count) => {
                log::error!("lost {} events", count);
            }
            RuntimeEvent::Other(name) => {
                log::debug!("ignoring {} event", name);
            }
        }
        Ok(false)
    }
}
