//! API token storage in the system keychain, one entry per server.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use thiserror::Error;

use checkin_core::util::normalize_text_option;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "checkin-cli";

/// Environment override for the stored token
pub const API_TOKEN_ENV: &str = "CHECKIN_API_TOKEN";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
    #[error("API token cannot be empty")]
    EmptyToken,
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a resolved token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    Keychain,
}

#[derive(Clone)]
pub struct TokenStore {
    username: String,
}

impl TokenStore {
    pub fn for_server(base_url: &str) -> Self {
        Self {
            username: format!("api_token:{}", base_url.trim_end_matches('/')),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(not(test))]
    pub fn load(&self) -> AuthResult<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(normalize_text_option(Some(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    pub fn load(&self) -> AuthResult<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(guard.get(&self.username).cloned())
    }

    #[cfg(not(test))]
    pub fn save(&self, token: &str) -> AuthResult<()> {
        let token = normalize_text_option(Some(token.to_string())).ok_or(AuthError::EmptyToken)?;
        self.entry()?
            .set_password(&token)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    pub fn save(&self, token: &str) -> AuthResult<()> {
        let token = normalize_text_option(Some(token.to_string())).ok_or(AuthError::EmptyToken)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), token);
        Ok(())
    }

    #[cfg(not(test))]
    pub fn clear(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    pub fn clear(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// Token for `base_url`: `CHECKIN_API_TOKEN` first, then the keychain
pub fn resolve_token(base_url: &str) -> AuthResult<Option<(String, TokenSource)>> {
    if let Some(token) = normalize_text_option(std::env::var(API_TOKEN_ENV).ok()) {
        return Ok(Some((token, TokenSource::Environment)));
    }
    Ok(TokenStore::for_server(base_url)
        .load()?
        .map(|token| (token, TokenSource::Keychain)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokens_are_scoped_per_server() {
        let first = TokenStore::for_server("https://one.example.org/");
        let second = TokenStore::for_server("https://two.example.org");

        first.save(" secret ").unwrap();
        assert_eq!(first.load().unwrap().as_deref(), Some("secret"));
        assert_eq!(second.load().unwrap(), None);

        first.clear().unwrap();
        assert_eq!(first.load().unwrap(), None);
        second.clear().unwrap();
    }

    #[test]
    fn trailing_slash_maps_to_same_entry() {
        let with_slash = TokenStore::for_server("https://slash.example.org/");
        let without = TokenStore::for_server("https://slash.example.org");

        with_slash.save("abc").unwrap();
        assert_eq!(without.load().unwrap().as_deref(), Some("abc"));
        without.clear().unwrap();
    }

    #[test]
    fn empty_token_is_rejected() {
        let store = TokenStore::for_server("https://empty.example.org");
        assert!(matches!(store.save("   "), Err(AuthError::EmptyToken)));
    }
}
