//! Terminal config storage using the OS credential store.
//!
//! The Supabase project URL and anon key are kept in the platform keyring
//! (DPAPI on Windows, Keychain on macOS, Secret Service on Linux). Headless
//! deployments can bypass the keyring entirely with `CHAIN_POS_*` environment
//! variables, which always take precedence when set.

use keyring::Entry;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::api;
use crate::error::{PosError, Result};

const SERVICE_NAME: &str = "chain-pos";

// Credential keys
pub(crate) const KEY_SUPABASE_URL: &str = "supabase_url";
pub(crate) const KEY_SUPABASE_ANON_KEY: &str = "supabase_anon_key";
pub(crate) const KEY_DEFAULT_STORE_ID: &str = "default_store_id";
pub(crate) const KEY_LANGUAGE: &str = "language";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[
    KEY_SUPABASE_URL,
    KEY_SUPABASE_ANON_KEY,
    KEY_DEFAULT_STORE_ID,
    KEY_LANGUAGE,
];

fn env_var_for(key: &str) -> String {
    format!("CHAIN_POS_{}", key.to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential. Environment overrides win over the keyring;
/// returns `None` when neither source has a non-empty value.
pub fn get_credential(key: &str) -> Option<String> {
    if let Ok(value) = std::env::var(env_var_for(key)) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

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
pub fn set_credential(key: &str, value: &str) -> Result<()> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| PosError::config(e.to_string()))?;
    entry
        .set_password(value)
        .map_err(|e| PosError::config(e.to_string()))?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<()> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| PosError::config(e.to_string()))?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(PosError::config(e.to_string())),
    }
}

pub fn has_credential(key: &str) -> bool {
    get_credential(key).is_some()
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

/// The terminal is considered configured when both Supabase credentials are
/// present.
pub fn is_configured() -> bool {
    has_credential(KEY_SUPABASE_URL) && has_credential(KEY_SUPABASE_ANON_KEY)
}

/// Resolve the Supabase base URL and anon key, or explain what is missing.
pub fn supabase_config() -> Result<(String, String)> {
    let url = get_credential(KEY_SUPABASE_URL)
        .ok_or_else(|| PosError::config("Supabase not configured: missing URL"))?;
    let key = get_credential(KEY_SUPABASE_ANON_KEY)
        .ok_or_else(|| PosError::config("Supabase not configured: missing anon key"))?;
    Ok((api::normalize_supabase_url(&url), key))
}

/// Store connection credentials received during onboarding.
///
/// `raw` is either the anon key itself (with `url` supplied separately) or a
/// compact base64 connection string carrying `{ "url": ..., "key": ... }`,
/// which operators paste as a single token.
pub fn update_connection(raw: &str, url: Option<&str>) -> Result<()> {
    let mut key = raw.trim().to_string();
    let mut base_url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

    if let Some(mut decoded_key) = api::extract_key_from_connection_string(raw) {
        key.zeroize();
        key = decoded_key.clone();
        decoded_key.zeroize();
        if let Some(decoded_url) = api::extract_url_from_connection_string(raw) {
            base_url = Some(decoded_url);
        }
    }

    if key.trim().is_empty() {
        return Err(PosError::validation("Missing required field: anon key"));
    }
    let base_url =
        base_url.ok_or_else(|| PosError::validation("Missing required field: Supabase URL"))?;
    let normalized = api::normalize_supabase_url(&base_url);
    if normalized.trim().is_empty() {
        return Err(PosError::validation("Supabase URL cannot be empty"));
    }

    set_credential(KEY_SUPABASE_URL, normalized.trim())?;
    set_credential(KEY_SUPABASE_ANON_KEY, key.trim())?;
    key.zeroize();

    info!(url = %normalized, "supabase connection credentials updated");
    Ok(())
}

/// Delete every stored credential (factory reset).
pub fn factory_reset() -> Result<()> {
    info!("performing factory reset - deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_override_wins_over_keyring() {
        std::env::set_var("CHAIN_POS_SUPABASE_URL", "https://env.supabase.co");
        assert_eq!(
            get_credential(KEY_SUPABASE_URL).as_deref(),
            Some("https://env.supabase.co")
        );
        std::env::remove_var("CHAIN_POS_SUPABASE_URL");
    }

    #[test]
    #[serial]
    fn supabase_config_reports_which_credential_is_missing() {
        std::env::remove_var("CHAIN_POS_SUPABASE_URL");
        std::env::remove_var("CHAIN_POS_SUPABASE_ANON_KEY");
        std::env::set_var("CHAIN_POS_SUPABASE_URL", "https://env.supabase.co/");
        let err = supabase_config().unwrap_err();
        assert!(err.to_string().contains("missing anon key"));

        std::env::set_var("CHAIN_POS_SUPABASE_ANON_KEY", "anon-key");
        let (url, key) = supabase_config().expect("both credentials set");
        assert_eq!(url, "https://env.supabase.co");
        assert_eq!(key, "anon-key");

        std::env::remove_var("CHAIN_POS_SUPABASE_URL");
        std::env::remove_var("CHAIN_POS_SUPABASE_ANON_KEY");
    }
}
