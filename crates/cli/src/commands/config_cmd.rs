//! `wayfarer config`: Show, locate or initialize the config file.

use std::path::{Path, PathBuf};
use wayfarer_config::AppConfig;

fn config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        eprintln!("   No API key set (WAYFARER_API_KEY, DASHSCOPE_API_KEY or OPENAI_API_KEY)");
    }
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

pub fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    if write_default(&path, force)? {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

/// Write the default config to `path`. Returns false if a file is already
/// there and `force` is not set.
fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
