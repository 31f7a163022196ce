//! Canonical identifier type
//!
//! A canonical identifier is the lowercase, dash-segmented 36 character
//! UUID form. Only the dashed form and the 32 character dash-free hex form
//! are accepted on input; braced and URN forms are rejected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the dashed `8-4-4-4-12` form
const DASHED_LEN: usize = 36;

/// Length of the dash-free hex form
const SIMPLE_LEN: usize = 32;

/// Lowercase, dash-formatted unique identifier
///
/// Constructing one is the only way to prove an input was well formed,
/// so every field that holds one has already been validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Parse a single identifier string
    ///
    /// Surrounding whitespace is ignored. Returns `None` for anything that
    /// is not a dashed UUID or 32 hex digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != DASHED_LEN && trimmed.len() != SIMPLE_LEN {
            return None;
        }
        Uuid::try_parse(trimmed).ok().map(Self::from_uuid)
    }

    /// Wrap an already-parsed UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    /// Generate a fresh random identifier
    pub fn new_v4() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a canonical identifier: {value:?}"))
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DASHED: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_dashed_passthrough() {
        assert_eq!(CanonicalId::parse(DASHED).unwrap().as_str(), DASHED);
    }

    #[test]
    fn test_dash_insertion_and_case_fold() {
        let id = CanonicalId::parse("550E8400E29B41D4A716446655440000").unwrap();
        assert_eq!(id.as_str(), DASHED);

        let upper = CanonicalId::parse("550E8400-E29B-41D4-A716-446655440000").unwrap();
        assert_eq!(upper.as_str(), DASHED);
    }

    #[test]
    fn test_rejects_malformed_shapes() {
        // wrong segment lengths, same total length
        assert!(CanonicalId::parse("550e840-0e29b-41d4-a716-446655440000").is_none());
        // non-hex character
        assert!(CanonicalId::parse("550e8400-e29b-41d4-a716-44665544000g").is_none());
        // braced and urn forms are not accepted
        assert!(CanonicalId::parse("{550e8400-e29b-41d4-a716-446655440000}").is_none());
        assert!(CanonicalId::parse("urn:uuid:550e8400-e29b-41d4-a716-446655440000").is_none());
        assert!(CanonicalId::parse("").is_none());
        assert!(CanonicalId::parse("42").is_none());
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: CanonicalId = serde_json::from_str(&format!("\"{DASHED}\"")).unwrap();
        assert_eq!(ok.as_str(), DASHED);
        assert!(serde_json::from_str::<CanonicalId>("\"bad-id\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), format!("\"{DASHED}\""));
    }
}
