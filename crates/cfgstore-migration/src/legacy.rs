//! Names of legacy records and their replacements

/// Structured application property overrides (`name=value` entries)
pub const APP_PROPERTY_OVERRIDES: &str = "pwm.appProperty.overrides";

/// Config property that became [`NOTE_TEXT_SETTING`]
pub const NOTES_PROPERTY: &str = "notes";
pub const NOTE_TEXT_SETTING: &str = "notes.noteText";

/// Config property that became [`SELF_URL_SETTING`]
pub const SITE_URL_PROPERTY: &str = "siteUrl";
pub const SELF_URL_SETTING: &str = "pwm.selfURL";

pub const AD_COMPLEXITY: &str = "password.policy.ADComplexity";
pub const AD_COMPLEXITY_LEVEL: &str = "password.policy.ADComplexityLevel";
pub const AD_COMPLEXITY_ON: &str = "AD2003";

pub const MINIMUM_LIFETIME_ENABLE: &str = "password.policy.minimumLifetime.enable";
pub const MINIMUM_LIFETIME_MODE: &str = "password.policy.minimumLifetime.mode";
pub const MINIMUM_LIFETIME_ON: &str = "ENFORCE";

/// Shared "off" option of both leveled replacements
pub const OPTION_NONE: &str = "NONE";

pub const HEALTH_STATS_PUBLIC: &str = "webservices.healthStats.makePublic";
pub const PUBLIC_WEBSERVICES: &str = "webservices.public.enable";
pub const HEALTH_OPTION: &str = "HEALTH";
