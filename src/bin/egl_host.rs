//! Makes an ANGLE-backed GLES context current before handing over to the XR app, the way
//! an embedding host would.

use basic_xr_app::egl::{AnglePlatform, EglContext};
use basic_xr_app::{logging, run_app, AppConfig};

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = AppConfig::default();

    let platform = AnglePlatform::load()?;
    let context = EglContext::new(&platform, config.pbuffer_size)?;
    log::info!("EGL context current on {:?}", context.tier);

    run_app(config)
}
