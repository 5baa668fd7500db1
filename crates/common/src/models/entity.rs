//! Graph entities as immutable snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a graph node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of a graph node. Ids are only unique within one category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Entity category. Declaration order is the merge tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Question,
    Answer,
    User,
    Tag,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Question,
        EntityKind::Answer,
        EntityKind::User,
        EntityKind::Tag,
    ];

    /// Lower ranks first on equal scores
    pub fn priority(&self) -> u8 {
        match self {
            EntityKind::Question => 0,
            EntityKind::Answer => 1,
            EntityKind::User => 2,
            EntityKind::Tag => 3,
        }
    }

    /// Node label in the graph store
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Question => "Question",
            EntityKind::Answer => "Answer",
            EntityKind::User => "User",
            EntityKind::Tag => "Tag",
        }
    }

    /// Property the graph store keys this category on
    pub fn key_property(&self) -> &'static str {
        match self {
            EntityKind::Tag => "name",
            _ => "id",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Question" => Some(EntityKind::Question),
            "Answer" => Some(EntityKind::Answer),
            "User" => Some(EntityKind::User),
            "Tag" => Some(EntityKind::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub favorite_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub communities: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: EntityId,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub is_accepted: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub communities: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub communities: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub communities: Vec<i64>,
}

/// Closed union over the four node categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Question(Question),
    Answer(Answer),
    User(User),
    Tag(Tag),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Question(q) => &q.id,
            Entity::Answer(a) => &a.id,
            Entity::User(u) => &u.id,
            Entity::Tag(t) => &t.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Question(_) => EntityKind::Question,
            Entity::Answer(_) => EntityKind::Answer,
            Entity::User(_) => EntityKind::User,
            Entity::Tag(_) => EntityKind::Tag,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id().clone())
    }

    /// Community ids assigned by community detection, empty when unassigned
    pub fn communities(&self) -> &[i64] {
        match self {
            Entity::Question(q) => &q.communities,
            Entity::Answer(a) => &a.communities,
            Entity::User(u) => &u.communities,
            Entity::Tag(t) => &t.communities,
        }
    }

    pub fn into_question(self) -> Option<Question> {
        match self {
            Entity::Question(q) => Some(q),
            _ => None,
        }
    }

    pub fn into_answer(self) -> Option<Answer> {
        match self {
            Entity::Answer(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Entity::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn into_tag(self) -> Option<Tag> {
        match self {
            Entity::Tag(t) => Some(t),
            _ => None,
        }
    }
}
