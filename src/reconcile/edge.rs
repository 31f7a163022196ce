//! Relationship edge model and wire shapes

use crate::identity::{normalize_str, CanonicalId, EntityKind, EntityRef};
use serde::{Deserialize, Deserializer, Serialize};

/// Relationship type
///
/// `Parent` edges run parent to child; `Child` edges run from the subject
/// to its dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Partner,
    Parent,
    Child,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Partner => "partner",
            Self::Parent => "parent",
            Self::Child => "child",
        }
    }

    /// Parse a stored type name; `spouse` is the legacy name for partner
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "partner" | "spouse" => Some(Self::Partner),
            "parent" => Some(Self::Parent),
            "child" => Some(Self::Child),
            _ => None,
        }
    }

    /// Partner edges have no meaningful direction
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::Partner)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an edge for diffing
///
/// Built from `(from, to, type)` with partner endpoints sorted. Past-life
/// flags and remote ids are attributes, not identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey(String);

impl EdgeKey {
    pub fn new(from: &EntityRef, to: &EntityRef, relation: RelationType) -> Self {
        let (a, b) = if relation.is_symmetric() && to < from {
            (to, from)
        } else {
            (from, to)
        };
        Self(format!(
            "{}|{}|{}",
            relation.as_str(),
            a.to_mixed(),
            b.to_mixed()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directed relationship between two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: EntityRef,
    pub to: EntityRef,
    #[serde(rename = "type")]
    pub relation: RelationType,
    #[serde(default)]
    pub is_past_life: bool,
    /// Present only for edges that already exist in the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl Edge {
    pub fn new(from: EntityRef, to: EntityRef, relation: RelationType) -> Self {
        Self {
            from,
            to,
            relation,
            is_past_life: false,
            remote_id: None,
        }
    }

    pub fn with_past_life(mut self, is_past_life: bool) -> Self {
        self.is_past_life = is_past_life;
        self
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.from, &self.to, self.relation)
    }

    /// Whether `entity` is one of the endpoints
    pub fn touches(&self, entity: &EntityRef) -> bool {
        &self.from == entity || &self.to == entity
    }

    pub fn is_self_edge(&self) -> bool {
        self.from == self.to
    }

    /// Create body for the relationship store
    pub fn to_payload(&self) -> EdgePayload {
        let mut payload = EdgePayload {
            relation_type: self.relation,
            side_a_user_id: None,
            side_a_alter_id: None,
            side_b_user_id: None,
            side_b_alter_id: None,
            past_life: i32::from(self.is_past_life),
        };

        match self.from.kind {
            EntityKind::User => payload.side_a_user_id = Some(self.from.id.clone()),
            EntityKind::Alter => payload.side_a_alter_id = Some(self.from.id.clone()),
        }
        match self.to.kind {
            EntityKind::User => payload.side_b_user_id = Some(self.to.id.clone()),
            EntityKind::Alter => payload.side_b_alter_id = Some(self.to.id.clone()),
        }

        payload
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.relation, self.to)?;
        if let Some(id) = &self.remote_id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

/// Create request body (`POST /relationships`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePayload {
    pub relation_type: RelationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_a_user_id: Option<CanonicalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_a_alter_id: Option<CanonicalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_b_user_id: Option<CanonicalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_b_alter_id: Option<CanonicalId>,
    /// 0 or 1
    pub past_life: i32,
}

/// Relationship as returned by the store
///
/// Ids are kept raw here; [`RelationshipRecord::into_edge`] runs them
/// through normalization and drops records that do not survive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    pub id: String,
    #[serde(alias = "type")]
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_a_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_a_alter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_b_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_b_alter_id: Option<String>,
    #[serde(default, alias = "isPastLife", deserialize_with = "bool_or_int")]
    pub past_life: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl RelationshipRecord {
    /// Convert to an [`Edge`] carrying the record id as `remote_id`
    ///
    /// Returns `None` when the type is unknown or a side does not name
    /// exactly one well-formed entity.
    pub fn into_edge(self) -> Option<Edge> {
        let relation = RelationType::parse(&self.relation_type)?;
        let from = side(self.side_a_user_id.as_deref(), self.side_a_alter_id.as_deref())?;
        let to = side(self.side_b_user_id.as_deref(), self.side_b_alter_id.as_deref())?;
        let remote_id = self.id.trim();
        if remote_id.is_empty() {
            return None;
        }
        Some(
            Edge::new(from, to, relation)
                .with_past_life(self.past_life)
                .with_remote_id(remote_id),
        )
    }
}

fn side(user: Option<&str>, alter: Option<&str>) -> Option<EntityRef> {
    let user = user.and_then(normalize_str).map(EntityRef::user);
    let alter = alter.and_then(normalize_str).map(EntityRef::alter);
    match (user, alter) {
        (Some(r), None) | (None, Some(r)) => Some(r),
        _ => None,
    }
}

/// Older servers send `0`/`1`, newer ones send booleans
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}
