#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::Result;
use eframe::egui;
use log::info;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs;

use template_image_fetcher::app::FetcherApp;
use template_image_fetcher::settings;

fn setup_logging() -> Result<()> {
    let log_dir = settings::default_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get base directories"))?
        .join("logs");

    fs::create_dir_all(&log_dir)?;

    let log_file = log_dir.join(format!(
        "fetcher_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Debug)
        .build();

    WriteLogger::init(LevelFilter::Info, config, fs::File::create(log_file)?)?;

    Ok(())
}

fn main() -> Result<()> {
    setup_logging()?;

    info!("Template Image Fetcher starting");

    let app = FetcherApp::new(settings::default_dir());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([850.0, 500.0])
            .with_min_inner_size([600.0, 400.0])
            .with_title("Template Image Fetcher"),
        ..Default::default()
    };

    eframe::run_native(
        "Template Image Fetcher",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|err| anyhow::anyhow!("failed to start window: {}", err))?;

    info!("Template Image Fetcher exiting");
    Ok(())
}
