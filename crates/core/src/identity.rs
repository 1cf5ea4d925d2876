//! User identity: which per-user memory document a turn reads and writes.
//!
//! Identities arrive from several places (request field, the first history
//! entry, a bare GUID typed by the user). All of them pass through
//! [`UserGuid::parse`] so the rest of the system only ever sees a validated,
//! lower-cased value that is safe to use as a storage path segment.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Identity used when no other source supplies one.
pub const DEFAULT_USER_GUID: &str = "c0p110t0-aaaa-bbbb-cccc-123456789abc";

const MAX_GUID_LEN: usize = 64;

static GUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .unwrap_or_else(|e| panic!("GUID pattern must compile: {e}"))
});

/// Does `text` look exactly like a canonical 8-4-4-4-12 hex GUID?
///
/// Matching is case-insensitive and does not trim; callers trim first when
/// surrounding whitespace should be tolerated.
pub fn is_guid(text: &str) -> bool {
    GUID_RE.is_match(text)
}

/// A validated user identifier.
///
/// Accepts ASCII alphanumerics, `-` and `_`, 1 to 64 characters. The fallback
/// identifier is not hex, so validation is broader than [`is_guid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserGuid(String);

impl UserGuid {
    /// Validate and normalize an identifier. Returns `None` when invalid.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_GUID_LEN {
            return None;
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return None;
        }
        Some(Self(trimmed.to_ascii_lowercase()))
    }

    /// The well-known fallback identity.
    pub fn fallback() -> Self {
        Self(DEFAULT_USER_GUID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == DEFAULT_USER_GUID
    }

    /// Case-insensitive comparison against raw text.
    pub fn matches(&self, text: &str) -> bool {
        self.0.eq_ignore_ascii_case(text.trim())
    }
}

impl Default for UserGuid {
    fn default() -> Self {
        Self::fallback()
    }
}

impl fmt::Display for UserGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserGuid {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        UserGuid::parse(&value).ok_or_else(|| format!("invalid user identifier: {value:?}"))
    }
}

impl From<UserGuid> for String {
    fn from(guid: UserGuid) -> Self {
        guid.0
    }
}
