mod tui;

use color_eyre::Result;
use std::fs::{self, File};
use std::path::PathBuf;

use waveplayer::config;

/// Log file under the user cache directory; the terminal belongs to the UI.
fn log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("waveplayer")
        .join("waveplayer.log")
}

fn init_logging() -> Result<()> {
    let path = log_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(&path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging()?;

    let config_path = config::default_config_path();
    let declared = config::load_options(&config_path);
    log::info!("config: {}", config_path.display());

    // an optional file path or url to load right away
    let url = std::env::args().nth(1);
    tui::run(declared, url)
}
