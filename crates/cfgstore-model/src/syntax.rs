//! Value syntax tags
//!
//! Every stored value is tagged with a [`Syntax`]. Codecs persist the tag next
//! to the value so the matching decoder can be chosen from the
//! [`SyntaxRegistry`](crate::value::SyntaxRegistry) at load time.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Syntax tag of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Syntax {
    /// Single-line string
    String,
    /// Multi-line text
    Text,
    /// true/false flag
    Boolean,
    /// Signed integer
    Numeric,
    /// One key out of an enumerated option set
    Select,
    /// Any subset of an enumerated option set
    OptionList,
    /// Ordered list of strings
    StringArray,
    /// Ordered list of profile identifiers
    Profile,
    /// Confidential secret; never shown in debug output
    Password,
    /// One or more binary file attachments
    File,
    /// Locale → text map used by locale bundles
    LocalizedStringMap,
}

impl Syntax {
    /// All known syntaxes, in declaration order
    pub const ALL: [Self; 11] = [
        Self::String,
        Self::Text,
        Self::Boolean,
        Self::Numeric,
        Self::Select,
        Self::OptionList,
        Self::StringArray,
        Self::Profile,
        Self::Password,
        Self::File,
        Self::LocalizedStringMap,
    ];

    /// Stable wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Numeric => "NUMERIC",
            Self::Select => "SELECT",
            Self::OptionList => "OPTION_LIST",
            Self::StringArray => "STRING_ARRAY",
            Self::Profile => "PROFILE",
            Self::Password => "PASSWORD",
            Self::File => "FILE",
            Self::LocalizedStringMap => "LOCALIZED_STRING_MAP",
        }
    }

    /// Syntaxes whose values are drawn from an enumerated option set
    #[inline]
    #[must_use]
    pub const fn is_enumerated(self) -> bool {
        matches!(self, Self::Select | Self::OptionList)
    }

    /// Syntaxes whose values must never leak through search or debug output
    #[inline]
    #[must_use]
    pub const fn is_confidential(self) -> bool {
        matches!(self, Self::Password)
    }

    /// Syntaxes whose values carry binary attachments
    #[inline]
    #[must_use]
    pub const fn has_blobs(self) -> bool {
        matches!(self, Self::File)
    }
}

impl Display for Syntax {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Syntax {
    type Err = UnknownSyntax;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|syntax| syntax.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSyntax(s.to_string()))
    }
}

/// Unrecognised syntax name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value syntax: {0}")]
pub struct UnknownSyntax(pub String);
