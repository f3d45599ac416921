//! Durable access-token storage using the OS credential store.
//!
//! On Windows this uses the Credential Manager, on macOS Keychain, and on
//! Linux the Secret Service API. The access token is the only piece of local
//! state that survives a restart; everything else is re-fetched.

use keyring::Entry;
use std::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroizing;

const SERVICE_NAME: &str = "ktl-storefront";

/// Credential key holding the bearer token.
pub const KEY_ACCESS_TOKEN: &str = "accessToken";

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Token stores
// ---------------------------------------------------------------------------

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<Zeroizing<String>>;
    fn save(&self, token: &str) -> Result<(), String>;
    fn clear(&self) -> Result<(), String>;
}

/// Production store backed by the OS keyring.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringTokenStore;

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Option<Zeroizing<String>> {
        get_credential(KEY_ACCESS_TOKEN)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Zeroizing::new)
    }

    fn save(&self, token: &str) -> Result<(), String> {
        set_credential(KEY_ACCESS_TOKEN, token)?;
        info!("access token persisted to credential store");
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        delete_credential(KEY_ACCESS_TOKEN)
    }
}

/// Process-local store for tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<Zeroizing<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(Zeroizing::new(token.to_string()))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<Zeroizing<String>> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    fn save(&self, token: &str) -> Result<(), String> {
        let mut guard = self.token.lock().map_err(|e| e.to_string())?;
        *guard = Some(Zeroizing::new(token.to_string()));
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        let mut guard = self.token.lock().map_err(|e| e.to_string())?;
        *guard = None;
        Ok(())
    }
}
