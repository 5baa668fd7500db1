//! Domain data model
//!
//! Provides:
//! - Graph entities and typed relationships
//! - Retrieval candidates and expanded context bundles
//! - Chat sessions and turns
//! - Stream events exchanged with callers

pub mod bundle;
pub mod candidate;
pub mod entity;
pub mod event;
pub mod relationship;
pub mod session;

pub use bundle::{AnswerContext, ContextBundle, Neighborhood, QuestionContext};
pub use candidate::Candidate;
pub use entity::{Answer, Entity, EntityId, EntityKey, EntityKind, Question, Tag, User};
pub use event::{coalesce, StreamErrorKind, StreamEvent};
pub use relationship::{Direction, RelationType};
pub use session::{ChatSession, Turn};
