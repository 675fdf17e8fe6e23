//! Config command handler.

use mnemos::config::MnemosConfig;

/// Config command.
pub fn cmd_config(config: &MnemosConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    let source = config.source.as_ref().map_or_else(
        || "(none - using defaults)".to_string(),
        |path| path.display().to_string(),
    );
    println!("Config File: {source}");
    println!("Database: {}", config.database_path().display());

    if show {
        println!();
        print!("{}", config.redacted().to_toml()?);
    }

    Ok(())
}
