//! Expanded neighborhoods handed to prompt assembly

use super::candidate::Candidate;
use super::entity::{Answer, Entity, Question, Tag, User};
use serde::{Deserialize, Serialize};

/// An answer together with its author, if the author node exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerContext {
    pub answer: Answer,
    pub author: Option<User>,
}

/// A question with everything one hop away from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionContext {
    pub question: Question,
    pub asker: Option<User>,
    pub tags: Vec<Tag>,
    /// Accepted answer first, then descending score
    pub answers: Vec<AnswerContext>,
}

/// Neighborhood shape per candidate category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Neighborhood {
    Question(QuestionContext),
    Answer {
        author: Option<User>,
        question: Option<QuestionContext>,
    },
    User {
        asked: Vec<Question>,
        /// Questions the user answered and did not ask
        answered: Vec<Question>,
    },
    Tag {
        questions: Vec<Question>,
    },
}

/// A fully expanded candidate. Never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub candidate: Candidate,
    pub origin: Entity,
    pub neighborhood: Neighborhood,
}
