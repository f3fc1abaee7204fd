use checkin_core::util::normalize_base_url;

use crate::auth::{resolve_token, TokenSource, TokenStore, API_TOKEN_ENV};
use crate::cli::AuthCommands;
use crate::commands::common::load_config;
use crate::error::CliError;

pub fn run_auth(command: AuthCommands) -> Result<(), CliError> {
    let config = load_config()?;
    match command {
        AuthCommands::Login { server, token } => {
            let server = resolve_server_url(config.resolve_server(server.as_deref()))?;
            TokenStore::for_server(&server).save(&token)?;
            println!("Stored API token for {server}");
        }
        AuthCommands::Status { server } => {
            let server = resolve_server_url(config.resolve_server(server.as_deref()))?;
            match resolve_token(&server)? {
                Some((_, TokenSource::Environment)) => {
                    println!("{server}: using token from {API_TOKEN_ENV}");
                }
                Some((_, TokenSource::Keychain)) => {
                    println!("{server}: token stored in keychain");
                }
                None => println!("{server}: no token (anonymous requests)"),
            }
        }
        AuthCommands::Logout { server } => {
            let server = resolve_server_url(config.resolve_server(server.as_deref()))?;
            TokenStore::for_server(&server).clear()?;
            println!("Removed stored API token for {server}");
        }
    }
    Ok(())
}

pub fn resolve_server_url(server: Option<String>) -> Result<String, CliError> {
    let server = server.ok_or(CliError::NoServer)?;
    normalize_base_url(&server).ok_or_else(|| {
        CliError::Config(format!("server must include http:// or https://: {server}"))
    })
}
