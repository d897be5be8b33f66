//! Per-record modification metadata

use crate::key::{DomainId, ProfileId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Who made a change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<ProfileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainId>,
}

impl UserIdentity {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            profile_id: None,
            domain: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: ProfileId) -> Self {
        self.profile_id = Some(profile);
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: DomainId) -> Self {
        self.domain = Some(domain);
        self
    }
}

impl Display for UserIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id)?;
        if let Some(profile) = &self.profile_id {
            write!(f, "@{profile}")?;
        }
        Ok(())
    }
}

/// Modification stamp attached to at most one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMetaData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<UserIdentity>,
}

impl ValueMetaData {
    /// Stamp for a change made now by `actor`
    ///
    /// Truncated to whole seconds so the stamp survives every codec unchanged.
    #[must_use]
    pub fn now(actor: Option<UserIdentity>) -> Self {
        Self {
            modify_date: Some(now_seconds()),
            user_identity: actor,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modify_date.is_none() && self.user_identity.is_none()
    }
}

/// Current time truncated to whole seconds
#[inline]
#[must_use]
pub fn now_seconds() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_has_no_subseconds() {
        let meta = ValueMetaData::now(Some(UserIdentity::new("admin")));
        assert_eq!(meta.modify_date.unwrap().timestamp_subsec_nanos(), 0);
        assert!(!meta.is_empty());
    }

    #[test]
    fn json_omits_absent_fields() {
        let json = serde_json::to_string(&ValueMetaData::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn identity_display_includes_profile() {
        let id = UserIdentity::new("bob").with_profile(ProfileId::new("corp"));
        assert_eq!(id.to_string(), "bob@corp");
    }
}
