//! Effective configuration

use std::path::Path;

use padbridge::PadbridgeConfig;

use super::CommandResult;

/// Print the configuration at `path` with defaults filled in
pub fn show(path: &Path, save: bool) -> CommandResult {
    let config = PadbridgeConfig::load(path)?;
    print!("{}", config.to_toml()?);

    if save {
        config.save(path)?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}
