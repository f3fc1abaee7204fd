use checkin_core::util::normalize_base_url;

use crate::cli::ConfigCommands;
use crate::commands::common::load_config;
use crate::config::CliConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let config = load_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommands::Set {
            server,
            timeout,
            interval,
        } => {
            let mut config = load_config()?;
            apply_config_changes(&mut config, server.as_deref(), timeout, interval)?;
            let path = config.save().map_err(CliError::Config)?;
            println!("Configuration saved to {}", path.display());
            Ok(())
        }
    }
}

pub fn apply_config_changes(
    config: &mut CliConfig,
    server: Option<&str>,
    timeout_secs: Option<u64>,
    interval_secs: Option<u64>,
) -> Result<(), CliError> {
    if let Some(server) = server {
        let normalized = normalize_base_url(server).ok_or_else(|| {
            CliError::Config("server must include http:// or https://".to_string())
        })?;
        config.default_server = Some(normalized);
    }
    if let Some(secs) = timeout_secs {
        if secs == 0 {
            return Err(CliError::Config("timeout must be greater than zero".to_string()));
        }
        config.timeout_secs = Some(secs);
    }
    if let Some(secs) = interval_secs {
        if secs == 0 {
            return Err(CliError::Config("interval must be greater than zero".to_string()));
        }
        config.watch_interval_secs = Some(secs);
    }
    Ok(())
}
