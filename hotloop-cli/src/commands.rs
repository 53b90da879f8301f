//! CLI command implementations.

use crate::RunArgs;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use hotloop_core::{Configuration, Exit, CONFIG_FILE_NAME};
use hotloop_supervisor::DevLoop;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Watch, build and run until Ctrl-C or a fatal error.
///
/// Returns the process exit status.
pub async fn run(args: &RunArgs) -> Result<i32> {
    let cwd = std::env::current_dir().context("can't read the working directory")?;
    let config = resolve_config(args, &cwd)?;

    println!(
        "{} Building {} into {}",
        "▶".cyan(),
        config.build_target_path.cyan(),
        config.full_build_path().display()
    );

    let exit = DevLoop::new(config).run().await?;
    match &exit {
        Exit::Clean => info!("Stopped"),
        Exit::Fatal(_) => error!("Stopped after a fatal error"),
    }
    Ok(exit.code())
}

/// Write a default config file.
pub fn init(path: &Path) -> Result<()> {
    let config_path = path.join(CONFIG_FILE_NAME);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    let project = fs::canonicalize(path)
        .with_context(|| format!("can't resolve {}", path.display()))?;
    let config = Configuration::for_project(&project);

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("can't write {}", config_path.display()))?;

    println!("{} Wrote {}", "✓".green(), config_path.display());
    println!("  Run {} to start watching", "hotloop".cyan());

    Ok(())
}

/// Print the configuration `run` would use.
pub fn show_config(args: &RunArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("can't read the working directory")?;
    let config = resolve_config(args, &cwd)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Defaults, then the config file, then flags.
fn resolve_config(args: &RunArgs, cwd: &Path) -> Result<Configuration> {
    let mut config = match &args.config {
        Some(path) => Configuration::load(path)?,
        None => {
            let discovered = cwd.join(CONFIG_FILE_NAME);
            if discovered.is_file() {
                Configuration::load(&discovered)?
            } else {
                Configuration::default()
            }
        }
    };

    if config.binary_name.trim().is_empty() {
        config.binary_name = Configuration::for_project(cwd).binary_name;
    }

    if let Some(root) = &args.root {
        config.app_root = root.clone();
    }
    if !args.ignore.is_empty() {
        config.ignored_folders = args.ignore.clone();
    }
    if !args.ext.is_empty() {
        config.included_extensions = args.ext.clone();
    }
    if let Some(target) = &args.target {
        config.build_target_path = target.clone();
    }
    if let Some(out) = &args.out {
        config.build_path = out.clone();
    }
    if let Some(name) = &args.name {
        config.binary_name = name.clone();
    }
    if let Some(delay) = args.delay {
        config.build_delay_ms = delay;
    }

    if !config.app_root.is_dir() {
        bail!("watch root {} is not a directory", config.app_root.display());
    }

    Ok(config.validate()?)
}
