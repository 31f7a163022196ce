//! Typed entity references

use super::{normalize_id, normalize_str, CanonicalId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of record an id points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Alter,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alter => "alter",
            Self::User => "user",
        }
    }

    /// Single-letter tag used by the mixed `A:`/`U:` encoding
    pub fn tag(&self) -> char {
        match self {
            Self::Alter => 'A',
            Self::User => 'U',
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.trim().to_ascii_lowercase().as_str() {
            "a" | "alter" => Some(Self::Alter),
            "u" | "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical pointer to an alter or a user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: CanonicalId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: CanonicalId) -> Self {
        Self { kind, id }
    }

    pub fn alter(id: CanonicalId) -> Self {
        Self::new(EntityKind::Alter, id)
    }

    pub fn user(id: CanonicalId) -> Self {
        Self::new(EntityKind::User, id)
    }

    /// Normalize a raw value and tag it with `kind`
    pub fn from_value(kind: EntityKind, value: &Value) -> Option<Self> {
        normalize_id(value).map(|id| Self::new(kind, id))
    }

    /// Parse the mixed `A:<uuid>` / `U:<uuid>` encoding
    ///
    /// `alter:` and `user:` are accepted too, case-insensitively.
    pub fn parse_mixed(raw: &str) -> Option<Self> {
        let (prefix, rest) = raw.trim().split_once(':')?;
        let kind = EntityKind::from_prefix(prefix)?;
        normalize_str(rest).map(|id| Self::new(kind, id))
    }

    /// Encode as `A:<uuid>` / `U:<uuid>`
    pub fn to_mixed(&self) -> String {
        format!("{}:{}", self.kind.tag(), self.id)
    }

    pub fn is_alter(&self) -> bool {
        self.kind == EntityKind::Alter
    }

    pub fn is_user(&self) -> bool {
        self.kind == EntityKind::User
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const A: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_mixed_round_trip() {
        let r = EntityRef::parse_mixed(&format!("U:{A}")).unwrap();
        assert!(r.is_user());
        assert_eq!(r.to_mixed(), format!("U:{A}"));

        let alter = EntityRef::parse_mixed(&format!("alter:{}", A.to_uppercase())).unwrap();
        assert!(alter.is_alter());
        assert_eq!(alter.id.as_str(), A);
    }

    #[test]
    fn test_mixed_rejects_unknown_prefix_and_numbers() {
        assert!(EntityRef::parse_mixed(&format!("G:{A}")).is_none());
        assert!(EntityRef::parse_mixed("A:42").is_none());
        assert!(EntityRef::parse_mixed(A).is_none());
    }

    #[test]
    fn test_from_value() {
        let r = EntityRef::from_value(EntityKind::Alter, &json!({ "id": A })).unwrap();
        assert_eq!(r.to_string(), format!("alter:{A}"));
        assert!(EntityRef::from_value(EntityKind::User, &json!(17)).is_none());
    }

    #[test]
    fn test_serde_shape() {
        let r = EntityRef::user(CanonicalId::parse(A).unwrap());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v, json!({ "kind": "user", "id": A }));
    }
}
