use eframe::egui;
use std::fs;
use std::path::{Path, PathBuf};

mod app;
mod category;
mod color;
mod config;
mod dataset;
mod errors;
mod fsutil;
mod marked;
mod ordering;
mod session;
mod tags;
mod thumbnail;
mod translation;
mod undo;

use config::{Settings, SettingsSource, SETTINGS_FILE};
use session::Session;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn setup_logging(log_file: Option<&Path>) {
    let var = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let level: log::LevelFilter = var.parse().unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(level)
        // egui and wgpu internals are noisy at info
        .level_for("eframe", log::LevelFilter::Warn)
        .level_for("egui_glow", log::LevelFilter::Warn)
        .chain(std::io::stderr());

    if let Some(path) = log_file {
        match fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(e) => eprintln!("Failed to open log file {}: {}", path.display(), e),
        }
    }

    if let Err(e) = dispatch.apply() {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn main() -> Result<(), eframe::Error> {
    let settings_path = Path::new(SETTINGS_FILE);
    let (settings, source) = Settings::load_or_default(settings_path);
    setup_logging(settings.log_file.as_deref());

    let settings_warning = match source {
        SettingsSource::File => {
            log::info!("Loaded settings from {}", settings_path.display());
            None
        }
        SettingsSource::Defaults => {
            log::info!("{} not found, using default settings", settings_path.display());
            None
        }
        SettingsSource::Fallback(err) => {
            log::warn!("{}; using default settings", err);
            Some(err)
        }
    };
    log::info!(
        "Danbooru Tag Editor starting in {}",
        std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default()
    );

    let font_path: Option<PathBuf> = settings.font_path.clone();
    let (session, mut warnings) = Session::open(settings);
    if let Some(warning) = settings_warning {
        warnings.insert(0, warning);
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1600.0, 900.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Danbooru Tag Editor",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(app::TagEditorApp::new(
                cc, session, warnings, font_path,
            )))
        }),
    )
}
