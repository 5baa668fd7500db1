//! Prompt assembly
//!
//! Pure and deterministic: the same question, bundles and history always
//! render to byte-identical text. Layout:
//!
//! ```text
//! <instructions + reasoning protocol>
//!
//! ### CONTEXT:
//! [1] QUESTION ...
//!
//! ### CONVERSATION HISTORY:
//! User: ...
//! Assistant: ...
//!
//! ### QUESTION:
//! <question>
//! ```

use graphqa_common::config::PromptConfig;
use graphqa_common::models::{
    Answer, AnswerContext, ContextBundle, Entity, Neighborhood, Question, QuestionContext, Turn, User,
};
use sha2::{Digest, Sha256};
use std::fmt::Write;

const DEFAULT_INSTRUCTIONS: &str = "\
You are a senior software engineer acting as a Q&A analyst. Answer the developer's question \
using the questions and answers in the context below as your primary reference.
- Be accurate, clear and concise. Include code snippets where they help.
- Use the conversation history to keep follow-up answers consistent.
- If the context is insufficient, say so and answer from general knowledge.
- If the question is unrelated to the context, ignore the context.";

const EMPTY_CONTEXT: &str = "(no related entries found)";
const EMPTY_HISTORY: &str = "(no previous turns)";

/// An assembled prompt and its SHA-256 fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub fingerprint: String,
}

impl Prompt {
    pub fn new(text: String) -> Self {
        let fingerprint = hex::encode(Sha256::digest(text.as_bytes()));
        Self { text, fingerprint }
    }
}

pub struct PromptAssembler {
    instructions: String,
    think_start: String,
    think_end: String,
    history_char_budget: usize,
}

impl PromptAssembler {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            instructions: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            think_start: config.think_start.clone(),
            think_end: config.think_end.clone(),
            history_char_budget: config.history_char_budget,
        }
    }

    /// Render the full prompt. Only history is ever truncated.
    pub fn assemble(&self, question: &str, bundles: &[ContextBundle], history: &[Turn]) -> Prompt {
        let mut out = String::new();

        out.push_str(&self.instructions);
        out.push_str("\n\n");
        let _ = writeln!(
            out,
            "First think step by step about the question and the context. Write that reasoning \
             between {start} and {end}, with {start} as the very first thing in your reply. \
             After {end}, write only the final answer for the user, in markdown.",
            start = self.think_start,
            end = self.think_end,
        );

        out.push_str("\n### CONTEXT:\n");
        if bundles.is_empty() {
            out.push_str(EMPTY_CONTEXT);
            out.push('\n');
        } else {
            for (i, bundle) in bundles.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                write_bundle(&mut out, i + 1, bundle);
            }
        }

        out.push_str("\n### CONVERSATION HISTORY:\n");
        let rendered = self.render_history(history);
        if rendered.is_empty() {
            out.push_str(EMPTY_HISTORY);
            out.push('\n');
        } else {
            out.push_str(&rendered);
        }

        out.push_str("\n### QUESTION:\n");
        out.push_str(question.trim());
        out.push('\n');

        Prompt::new(out)
    }

    /// Newest turns that fit the budget, oldest first
    fn render_history(&self, history: &[Turn]) -> String {
        let mut kept: Vec<String> = Vec::new();
        let mut used = 0;

        for turn in history.iter().rev() {
            let block = format!("User: {}\nAssistant: {}\n", turn.question.trim(), turn.answer.trim());
            let len = block.chars().count();
            if used + len > self.history_char_budget {
                break;
            }
            used += len;
            kept.push(block);
        }

        if kept.len() < history.len() {
            tracing::debug!(
                dropped = history.len() - kept.len(),
                budget = self.history_char_budget,
                "Truncated conversation history"
            );
        }

        kept.reverse();
        kept.concat()
    }
}

fn write_bundle(out: &mut String, n: usize, bundle: &ContextBundle) {
    let _ = writeln!(
        out,
        "[{}] {} (similarity {:.2}, via {})",
        n,
        bundle.origin.kind().label().to_uppercase(),
        bundle.candidate.score,
        bundle.candidate.index
    );

    match (&bundle.origin, &bundle.neighborhood) {
        (Entity::Question(_), Neighborhood::Question(ctx)) => write_question_context(out, ctx, ""),
        (Entity::Answer(answer), Neighborhood::Answer { author, question }) => {
            write_answer_line(out, answer, author.as_ref(), "");
            if let Some(ctx) = question {
                out.push_str("In reply to:\n");
                write_question_context(out, ctx, "  ");
            }
        }
        (Entity::User(user), Neighborhood::User { asked, answered }) => {
            let _ = writeln!(out, "User: {}", user_label(Some(user)));
            write_question_list(out, "Asked", asked);
            write_question_list(out, "Answered", answered);
        }
        (Entity::Tag(tag), Neighborhood::Tag { questions }) => {
            let _ = writeln!(out, "Tag: {}", tag.name);
            write_question_list(out, "Tagged questions", questions);
        }
        // Expansion always pairs origin and neighborhood by kind
        (origin, _) => {
            let _ = writeln!(out, "Entity: {}", origin.id());
        }
    }
}

fn write_question_context(out: &mut String, ctx: &QuestionContext, indent: &str) {
    let q = &ctx.question;
    let _ = writeln!(out, "{}Title: {}", indent, q.title.trim());
    if !q.body.trim().is_empty() {
        let _ = writeln!(out, "{}Body: {}", indent, q.body.trim());
    }
    if let Some(link) = &q.link {
        let _ = writeln!(out, "{}Link: {}", indent, link);
    }

    let tags: Vec<&str> = ctx.tags.iter().map(|t| t.name.as_str()).collect();
    let _ = writeln!(
        out,
        "{}Score: {} | Asked by: {} | Tags: {}",
        indent,
        q.score,
        user_label(ctx.asker.as_ref()),
        if tags.is_empty() { "none".to_string() } else { tags.join(", ") }
    );

    if ctx.answers.is_empty() {
        let _ = writeln!(out, "{}Answers: none", indent);
        return;
    }
    let _ = writeln!(out, "{}Answers:", indent);
    let nested = format!("{}  - ", indent);
    for AnswerContext { answer, author } in &ctx.answers {
        write_answer_line(out, answer, author.as_ref(), &nested);
    }
}

fn write_answer_line(out: &mut String, answer: &Answer, author: Option<&User>, prefix: &str) {
    let _ = writeln!(
        out,
        "{}{}score {} by {}: {}",
        prefix,
        if answer.is_accepted { "[accepted] " } else { "" },
        answer.score,
        user_label(author),
        answer.body.trim()
    );
}

fn write_question_list(out: &mut String, label: &str, questions: &[Question]) {
    if questions.is_empty() {
        let _ = writeln!(out, "{}: none", label);
        return;
    }
    let _ = writeln!(out, "{}:", label);
    for q in questions {
        let _ = writeln!(out, "  - {} (score {})", q.title.trim(), q.score);
    }
}

fn user_label(user: Option<&User>) -> String {
    match user {
        Some(u) if !u.display_name.is_empty() => format!("{} (reputation {})", u.display_name, u.reputation),
        Some(u) => u.id.to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphqa_common::models::{Candidate, EntityKind, Tag};

    fn question(id: &str, title: &str) -> Question {
        Question {
            id: id.into(),
            title: title.into(),
            body: "How can I remove vectors?".into(),
            link: Some(format!("https://example.com/q/{}", id)),
            score: 7,
            favorite_count: 1,
            created_at: None,
            communities: vec![],
        }
    }

    fn question_bundle() -> ContextBundle {
        let q = question("q1", "Deleting points in a vector database");
        ContextBundle {
            candidate: Candidate::new("q1", 0.91, EntityKind::Question, "Question_index"),
            origin: Entity::Question(q.clone()),
            neighborhood: Neighborhood::Question(QuestionContext {
                question: q,
                asker: Some(User {
                    id: "u1".into(),
                    display_name: "ada".into(),
                    reputation: 420,
                    communities: vec![],
                }),
                tags: vec![Tag {
                    id: "qdrant".into(),
                    name: "qdrant".into(),
                    communities: vec![],
                }],
                answers: vec![AnswerContext {
                    answer: Answer {
                        id: "a9".into(),
                        body: "Use the delete endpoint with a filter.".into(),
                        score: 3,
                        is_accepted: true,
                        created_at: None,
                        communities: vec![],
                    },
                    author: None,
                }],
            }),
        }
    }

    fn answer_bundle() -> ContextBundle {
        let a = Answer {
            id: "a1".into(),
            body: "Points can be removed by id.".into(),
            score: 11,
            is_accepted: false,
            created_at: None,
            communities: vec![],
        };
        ContextBundle {
            candidate: Candidate::new("a1", 0.85, EntityKind::Answer, "Answer_index"),
            origin: Entity::Answer(a),
            neighborhood: Neighborhood::Answer {
                author: None,
                question: None,
            },
        }
    }

    fn assembler() -> PromptAssembler {
        PromptAssembler::new(&PromptConfig::default())
    }

    #[test]
    fn test_deterministic() {
        let bundles = vec![question_bundle(), answer_bundle()];
        let history = vec![Turn::new("hi", "thinking", "hello")];

        let a = assembler().assemble("How to delete points?", &bundles, &history);
        let b = assembler().assemble("How to delete points?", &bundles, &history);
        assert_eq!(a.text, b.text);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_contains_both_bundles_and_protocol() {
        let prompt = assembler().assemble(
            "How to delete points in a vector database?",
            &[question_bundle(), answer_bundle()],
            &[],
        );

        assert!(prompt.text.contains("[1] QUESTION (similarity 0.91, via Question_index)"));
        assert!(prompt.text.contains("[2] ANSWER (similarity 0.85, via Answer_index)"));
        assert!(prompt.text.contains("Deleting points in a vector database"));
        assert!(prompt.text.contains("Points can be removed by id."));
        assert!(prompt.text.contains("[accepted] score 3 by unknown"));
        assert!(prompt.text.contains("between <think> and </think>"));
        assert!(prompt.text.ends_with("### QUESTION:\nHow to delete points in a vector database?\n"));
    }

    #[test]
    fn test_empty_context_still_valid() {
        let prompt = assembler().assemble("Anything?", &[], &[]);
        assert!(prompt.text.contains("### CONTEXT:\n(no related entries found)\n"));
        assert!(prompt.text.contains("### QUESTION:\nAnything?"));
    }

    #[test]
    fn test_history_drops_oldest_first() {
        let config = PromptConfig {
            history_char_budget: 60,
            ..PromptConfig::default()
        };
        let history = vec![
            Turn::new("first question", "", "first answer"),
            Turn::new("second question", "", "second answer"),
        ];

        let prompt = PromptAssembler::new(&config).assemble("third?", &[], &history);
        assert!(!prompt.text.contains("first question"));
        assert!(prompt.text.contains("User: second question\nAssistant: second answer\n"));
    }

    #[test]
    fn test_reasoning_not_replayed() {
        let history = vec![Turn::new("q", "secret chain of thought", "a")];
        let prompt = assembler().assemble("next", &[], &history);
        assert!(!prompt.text.contains("secret chain of thought"));
    }

    #[test]
    fn test_question_and_context_never_truncated() {
        let config = PromptConfig {
            history_char_budget: 0,
            ..PromptConfig::default()
        };
        let long_question = "why ".repeat(2000);
        let prompt = PromptAssembler::new(&config).assemble(&long_question, &[question_bundle()], &[]);
        assert!(prompt.text.contains(long_question.trim()));
        assert!(prompt.text.contains("Use the delete endpoint with a filter."));
    }

    #[test]
    fn test_custom_delimiters() {
        let config = PromptConfig {
            think_start: "[[reason]]".into(),
            think_end: "[[/reason]]".into(),
            ..PromptConfig::default()
        };
        let prompt = PromptAssembler::new(&config).assemble("q", &[], &[]);
        assert!(prompt.text.contains("between [[reason]] and [[/reason]]"));
    }
}
