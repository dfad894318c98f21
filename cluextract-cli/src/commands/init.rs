//! Init command - initialize configuration file.

use cluextract::config::{config_file_path, ConfigFile, PASSWORD_ENV_VAR};

use crate::error::CliError;

/// Run the init command.
///
/// Existing settings are kept; missing ones are filled in with defaults.
pub fn run() -> Result<(), CliError> {
    let path = config_file_path();
    let existed = path.exists();

    let config = ConfigFile::load()?;
    config.save()?;

    if existed {
        println!("Updated configuration file: {}", path.display());
    } else {
        println!("Created configuration file: {}", path.display());
    }
    println!();
    println!("Edit this file to customize CLU Extract settings.");
    println!("CLI arguments override config file values when specified.");
    println!(
        "For portal sign-in, set auth.username and export {}.",
        PASSWORD_ENV_VAR
    );
    Ok(())
}
