//! `driverobot check-config` — print the effective configuration.

use std::path::Path;

use driverobot_core::RobotConfig;

use crate::Format;

pub fn check(path: &Path, config: &RobotConfig, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(config)?),
        Format::Text => {
            println!("✓ {} is valid", path.display());
            println!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}
