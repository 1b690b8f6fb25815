use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

pub use openxr as xr;

pub mod config;
#[cfg(windows)]
pub mod d3d11;
pub mod device;
pub mod egl;
pub mod error;
pub mod frame;
pub mod logging;
#[cfg(test)]
mod mock;
pub mod owned;
pub mod session;
pub mod shell;

pub use config::AppConfig;
pub use error::{Result, XrAppError};
use frame::{FrameLoop, FrameRuntime};
use session::{PollStatus, SessionController, SessionRuntime};

/// Drives a runtime: drain its events, then render a frame whenever the session is running.
pub struct App<R> {
    pub runtime: R,
    session: SessionController,
    frame_loop: FrameLoop,
    config: AppConfig,
}

impl<R: SessionRuntime + FrameRuntime> App<R> {
    pub fn new(runtime: R, config: AppConfig, quit_signal: Arc<AtomicBool>) -> Self {
        Self {
            runtime,
            session: SessionController::new(quit_signal),
            frame_loop: FrameLoop::new(),
            config,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn frame_loop(&self) -> &FrameLoop {
        &self.frame_loop
    }

    pub fn poll_events(&mut self) -> Result<PollStatus> {
        self.session.poll_events(&mut self.runtime)
    }

    pub fn frame_update(&mut self) -> Result<()> {
        self.frame_loop.frame_update(&mut self.runtime)
    }

    pub fn run(&mut self) -> Result<()> {
        log::trace!("Running mainloop...");
        'mainloop: loop {
            let status = self.poll_events()?;

            if status.contains(PollStatus::QUIT) {
                log::info!("Mainloop Quitting");
                break 'mainloop;
            }

            if status.contains(PollStatus::FRAME) {
                self.frame_update()?;
            } else {
                // Nothing to render until the runtime says READY; don't spin.
                thread::sleep(self.config.idle_poll_interval);
            }
        }
        log::info!(
            "submitted {} frames, {} rendered",
            self.frame_loop.frames_submitted(),
            self.frame_loop.frames_rendered()
        );
        Ok(())
    }
}

/// Set up the graphics binding and run until the runtime or the user ends the session.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    let quit_signal = Arc::new(AtomicBool::new(true));
    let r = quit_signal.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    }) {
        log::warn!("could not install Ctrl-C handler: {}", e);
    }

    run_with_quit_signal(config, quit_signal)
}

#[cfg(windows)]
fn run_with_quit_signal(config: AppConfig, quit_signal: Arc<AtomicBool>) -> anyhow::Result<()> {
    let shell = d3d11::create_shell(&config, &quit_signal)?;
    let mut app = App::new(shell, config, quit_signal);
    app.run()?;
    Ok(())
}

#[cfg(not(windows))]
fn run_with_quit_signal(_config: AppConfig, _quit_signal: Arc<AtomicBool>) -> anyhow::Result<()> {
    Err(XrAppError::unavailable("Direct3D 11 graphics binding").into())
}

/// Entry point for native hosts. Returns 0 on a clean exit and 1 after logging the error.
#[no_mangle]
pub extern "C" fn run() -> i32 {
    logging::init();
    match run_app(AppConfig::default()) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{:?}", e);
            1
        }
    }
}
