//! The config command.

use anyhow::Result;

use libpep::PepConfig;

pub fn cmd_config_init() -> Result<()> {
    let path = PepConfig::write_default_if_missing()?;
    println!("Config file: {}", path.display());
    println!("Set endpoints there, or override with PEP_ENDPOINTS / --endpoint.");
    Ok(())
}
