//! GraphQA Context Engine
//!
//! Turns retrieval candidates into an answer stream:
//! - Graph neighbourhood expansion around each candidate
//! - Deterministic prompt assembly
//! - Streaming generation with reasoning/answer splitting
//! - Per-request orchestration with cancellation

pub mod expander;
pub mod generation;
pub mod pipeline;
pub mod prompt;
pub mod splitter;

pub use expander::{order_answers, GraphContextExpander};
pub use generation::{create_generator, Generator, OllamaGenerator, ScriptEnd, ScriptedGenerator, TextStream};
pub use pipeline::{AnswerPipeline, AnswerStream};
pub use prompt::{Prompt, PromptAssembler};
pub use splitter::{SplitterState, ThinkTagSplitter};
