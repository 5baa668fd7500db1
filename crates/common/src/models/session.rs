use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters of the first question kept as the session title
pub const TITLE_MAX_CHARS: usize = 40;

/// One completed question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub reasoning: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(question: impl Into<String>, reasoning: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            reasoning: reasoning.into(),
            answer: answer.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    /// Empty until the first turn lands
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            created_at: now,
            updated_at: now,
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        if self.turns.is_empty() {
            self.title = title_from(&turn.question);
        }
        self.updated_at = turn.timestamp;
        self.turns.push(turn);
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

fn title_from(question: &str) -> String {
    let trimmed = question.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str("...");
    title
}
