//! Configuration password hashing
//!
//! The password is stored only as a salted bcrypt hash in the
//! [`CONFIG_PASSWORD_HASH`] property.

use crate::property::CONFIG_PASSWORD_HASH;
use crate::snapshot::StoredConfiguration;
use cfgstore_model::{StoreError, StoreResult};

/// bcrypt work factor used when none is configured
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Hash a configuration password
///
/// # Errors
/// Returns a ConfigState error for blank input, or if hashing fails
pub fn hash_password(password: &str, cost: u32) -> StoreResult<String> {
    if password.trim().is_empty() {
        return Err(StoreError::config_state("password must not be blank"));
    }
    bcrypt::hash(password, cost).map_err(|e| StoreError::config_state(format!("cannot hash password: {e}")))
}

/// Whether a configuration password is set
#[must_use]
pub fn has_password(config: &StoredConfiguration) -> bool {
    config
        .read_config_property(CONFIG_PASSWORD_HASH)
        .is_some_and(|h| !h.is_empty())
}

/// Check `candidate` against the stored hash
///
/// Returns `false` when no password is set.
#[must_use]
pub fn verify_password(config: &StoredConfiguration, candidate: &str) -> bool {
    let Some(hash) = config.read_config_property(CONFIG_PASSWORD_HASH) else {
        return false;
    };
    match bcrypt::verify(candidate, &hash) {
        Ok(ok) => ok,
        Err(error) => {
            tracing::warn!(%error, "stored configuration password hash is unreadable");
            false
        }
    }
}
