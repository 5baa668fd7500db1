use super::entity::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed graph edge, used only to drive traversals
///
/// - `(User)-[:ASKED]->(Question)`
/// - `(Answer)-[:ANSWERS]->(Question)`
/// - `(Question)-[:TAGGED]->(Tag)`
/// - `(User)-[:PROVIDED]->(Answer)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Asked,
    Answers,
    Tagged,
    Provided,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Asked => "ASKED",
            RelationType::Answers => "ANSWERS",
            RelationType::Tagged => "TAGGED",
            RelationType::Provided => "PROVIDED",
        }
    }

    /// Categories at the `(from, to)` ends of the edge
    pub fn endpoints(&self) -> (EntityKind, EntityKind) {
        match self {
            RelationType::Asked => (EntityKind::User, EntityKind::Question),
            RelationType::Answers => (EntityKind::Answer, EntityKind::Question),
            RelationType::Tagged => (EntityKind::Question, EntityKind::Tag),
            RelationType::Provided => (EntityKind::User, EntityKind::Answer),
        }
    }

    /// Category reached when traversing from `start` in `direction`
    pub fn far_end(&self, direction: Direction) -> EntityKind {
        let (from, to) = self.endpoints();
        match direction {
            Direction::Outgoing => to,
            Direction::Incoming => from,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traversal direction relative to the starting node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}
