//! Well-known config property names

/// bcrypt hash of the configuration password
pub const CONFIG_PASSWORD_HASH: &str = "configPasswordHash";

/// Opt-in for writing confidential values in clear text
pub const STORE_PLAINTEXT_VALUES: &str = "storePlaintextValues";

/// Schema version the document was last written with
pub const SCHEMA_VERSION: &str = "schemaVersion";
