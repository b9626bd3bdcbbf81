//! Application runner - resolves paths and settings, then dispatches the subcommand.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, trace};

use crate::cli::{Args, Command};
use crate::config;
use crate::render;
use crate::settings::Settings;
use crate::viewer;

/// Run scrollreel with parsed arguments.
pub fn run_app(args: Args) -> Result<()> {
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());

    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    info!("scrollreel {} starting...", env!("CARGO_PKG_VERSION"));
    trace!("Command-line args: {:?}", args);

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| config::config_file(config::SETTINGS_FILE, &path_config));
    info!("Settings path: {}", settings_path.display());

    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    if let Some(dir) = &args.assets_dir {
        settings.assets_dir = Some(dir.clone());
    }

    let base = asset_base(&settings_path);
    let threads = args.workers.unwrap_or_else(|| settings.worker_threads()).max(1);
    info!("Assets base: {}, {} decode threads", base.display(), threads);

    match args.command.unwrap_or(Command::View) {
        Command::Render(render_args) => {
            let report = render::run_render(&settings, &render_args, &base, threads)?;
            println!(
                "Rendered {} ticks: {} events, {} canvas frames, final video mode {:?} -> {}",
                report.ticks,
                report.events,
                report.frames_written,
                report.final_mode,
                render_args.out_dir.display()
            );
        }
        Command::View => viewer::run_viewer(&settings, &base, threads)?,
    }

    info!("Application exiting");
    Ok(())
}

/// Relative frame templates resolve against the settings file's directory.
fn asset_base(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_base_from_settings_path() {
        assert_eq!(asset_base(Path::new("/srv/page/scrollreel.json")), PathBuf::from("/srv/page"));
        assert_eq!(asset_base(Path::new("scrollreel.json")), PathBuf::from("."));
    }
}
