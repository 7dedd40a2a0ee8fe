//! Utility command handlers.

use std::path::Path;

use mxconsole_driver::config::Config;

use super::CommandResult;

/// Print the effective configuration
pub fn config_show(config: &Config, path: &Path) -> CommandResult {
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Write a default config file
pub fn config_init(path: &Path, force: bool) -> CommandResult {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    Config::default().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Print the config file path
pub fn config_path(path: &Path) -> CommandResult {
    println!("{}", path.display());
    Ok(())
}
