use basic_xr_app::{logging, run_app, AppConfig};

fn main() {
    logging::init();

    if let Err(e) = run_app(AppConfig::default()) {
        log::error!("{:?}", e);
        std::process::exit(1);
    }
}
