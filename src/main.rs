use bundlefeed::{app, config};
use log::{error, info, LevelFilter};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // --- Logging Setup ---
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("bundlefeed::feed", LevelFilter::Debug)
        .filter_module("bundlefeed::core::transport", LevelFilter::Info)
        .filter_module("bundlefeed::core::images", LevelFilter::Info)
        .init();

    info!("Application starting...");
    config::load();

    if let Err(e) = app::run() {
        error!("Application exited with error: {}", e);
        return Err(e);
    }

    info!("Application exited gracefully.");
    Ok(())
}
