//! Configuration commands.

use anyhow::{Result, bail};
use vouch_config::VouchConfig;

/// Prints the effective configuration.
pub fn show(config: &VouchConfig, format: &str) -> Result<()> {
    match format {
        "toml" => print!("{}", config.to_toml()?),
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        other => bail!("unknown format '{other}', expected toml or json"),
    }
    Ok(())
}
