//! Per-request answer orchestration
//!
//! One `ask` call runs embed → retrieve → expand → assemble → generate →
//! split on its own task and hands back the labeled events as a stream.
//! Dropping the returned [`AnswerStream`] cancels the task, which drops
//! the generation stream and any retrieval or expansion still in flight.

use crate::expander::GraphContextExpander;
use crate::generation::Generator;
use crate::prompt::{Prompt, PromptAssembler};
use crate::splitter::{SplitterState, ThinkTagSplitter};
use futures::{Stream, StreamExt};
use graphqa_common::config::AppConfig;
use graphqa_common::embeddings::Embedder;
use graphqa_common::errors::{AppError, Result};
use graphqa_common::graph::GraphStore;
use graphqa_common::metrics::{record_cancellation, record_chunk, record_generation};
use graphqa_common::models::{StreamEvent, Turn};
use graphqa_common::sessions::SessionStore;
use graphqa_search::{EnsembleRetriever, HybridIndex, IndexQuery};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Events buffered between the pipeline task and a slow consumer
const EVENT_BUFFER: usize = 64;

/// Question answering over the knowledge graph
#[derive(Clone)]
pub struct AnswerPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    embedder: Arc<dyn Embedder>,
    retriever: EnsembleRetriever,
    expander: GraphContextExpander,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
    sessions: SessionStore,
    k: usize,
    think_start: String,
    think_end: String,
}

impl AnswerPipeline {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        sessions: SessionStore,
    ) -> Self {
        let indexes = HybridIndex::all(store.clone(), &config.retrieval);

        Self {
            inner: Arc::new(PipelineInner {
                embedder,
                retriever: EnsembleRetriever::new(indexes, &config.retrieval),
                expander: GraphContextExpander::new(store, &config.expansion),
                assembler: PromptAssembler::new(&config.prompt),
                generator,
                sessions,
                k: config.retrieval.k,
                think_start: config.prompt.think_start.clone(),
                think_end: config.prompt.think_end.clone(),
            }),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn model_name(&self) -> &str {
        self.inner.generator.model_name()
    }

    /// Start answering `question` within a session.
    ///
    /// Fails with `SessionNotFound` before any work is started. Every
    /// other failure arrives as the stream's terminal `Error` event.
    pub async fn ask(&self, session_id: Uuid, question: impl Into<String>) -> Result<AnswerStream> {
        if !self.inner.sessions.contains(session_id).await {
            return Err(AppError::SessionNotFound {
                id: session_id.to_string(),
            });
        }

        let question = question.into();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = self.inner.clone();

        let task = async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    record_cancellation();
                    info!("Request cancelled by caller");
                }
                _ = inner.run(session_id, question, tx) => {}
            }
        };
        tokio::spawn(task.instrument(info_span!("ask", %session_id)));

        Ok(AnswerStream {
            events: ReceiverStream::new(rx),
            guard: Some(cancel.drop_guard()),
        })
    }
}

impl PipelineInner {
    async fn run(&self, session_id: Uuid, question: String, tx: mpsc::Sender<StreamEvent>) {
        let prompt = match self.prepare(session_id, &question).await {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(code = ?e.code(), error = %e, "Request aborted before generation");
                let _ = tx.send(StreamEvent::error(&e)).await;
                return;
            }
        };

        self.stream_answer(session_id, question, &prompt, &tx).await;
    }

    async fn prepare(&self, session_id: Uuid, question: &str) -> Result<Prompt> {
        let history = self.sessions.history(session_id).await?;
        let query = IndexQuery::new(self.embedder.embed(question).await?, question);
        let outcome = self.retriever.retrieve(&query, self.k).await?;
        let bundles = self.expander.expand_all(&outcome.candidates).await;
        let prompt = self.assembler.assemble(question, &bundles, &history);

        info!(
            candidates = outcome.candidates.len(),
            bundles = bundles.len(),
            partial = outcome.is_partial(),
            history_turns = history.len(),
            fingerprint = %prompt.fingerprint,
            "Prompt assembled"
        );

        Ok(prompt)
    }

    async fn stream_answer(
        &self,
        session_id: Uuid,
        question: String,
        prompt: &Prompt,
        tx: &mpsc::Sender<StreamEvent>,
    ) {
        let start = Instant::now();
        let model = self.generator.model_name().to_string();

        let mut fragments = match self.generator.generate_stream(prompt).await {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(code = ?e.code(), error = %e, model = %model, "Generation could not start");
                record_generation(start.elapsed().as_secs_f64(), &model, "error");
                let _ = tx.send(StreamEvent::error(&e)).await;
                return;
            }
        };

        let mut splitter = ThinkTagSplitter::new(self.think_start.as_str(), self.think_end.as_str());
        let mut reasoning = String::new();
        let mut answer = String::new();

        while !splitter.is_terminal() {
            let events = match fragments.next().await {
                Some(Ok(fragment)) => splitter.push(&fragment),
                Some(Err(e)) => {
                    warn!(code = ?e.code(), error = %e, model = %model, "Generation failed mid-stream");
                    splitter.fail((&e).into(), e.to_string())
                }
                None => splitter.finish(),
            };

            for event in events {
                match &event {
                    StreamEvent::ReasoningChunk { text } => reasoning.push_str(text),
                    StreamEvent::AnswerChunk { text } => answer.push_str(text),
                    StreamEvent::Done => {
                        let turn = Turn::new(
                            question.as_str(),
                            std::mem::take(&mut reasoning),
                            std::mem::take(&mut answer),
                        );
                        // The session may have been deleted while streaming
                        if let Err(e) = self.sessions.append_turn(session_id, turn).await {
                            warn!(code = ?e.code(), error = %e, "Turn not recorded");
                        }
                    }
                    StreamEvent::Error { .. } => {}
                }

                record_chunk(event.name());
                if tx.send(event).await.is_err() {
                    debug!("Receiver dropped, stopping generation");
                    return;
                }
            }
        }

        let outcome = match splitter.state() {
            SplitterState::Done => "done",
            _ => "error",
        };
        let elapsed = start.elapsed();
        record_generation(elapsed.as_secs_f64(), &model, outcome);
        info!(
            model = %model,
            outcome,
            latency_ms = elapsed.as_millis() as u64,
            "Generation finished"
        );
    }
}

/// Ordered events of one answer, ending with `Done` or `Error`.
///
/// Dropping the stream before its terminal event cancels the request.
pub struct AnswerStream {
    events: ReceiverStream<StreamEvent>,
    guard: Option<DropGuard>,
}

impl Stream for AnswerStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.events).poll_next(cx);
        if let Poll::Ready(Some(event)) = &polled {
            if event.is_terminal() {
                if let Some(guard) = self.guard.take() {
                    guard.disarm();
                }
            }
        }
        polled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{ScriptEnd, ScriptedGenerator, TextStream};
    use async_trait::async_trait;
    use graphqa_common::embeddings::MockEmbedder;
    use graphqa_common::graph::InMemoryGraph;
    use graphqa_common::models::{
        coalesce, Answer, Direction, Entity, EntityId, EntityKey, Question, RelationType, StreamErrorKind,
    };
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_test::assert_ok;

    const QUESTION: &str = "How to delete points in a vector database?";
    const DIM: usize = 16;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.retrieval.retry_backoff_ms = 1;
        config.expansion.retry_backoff_ms = 1;
        config
    }

    async fn seeded_graph() -> InMemoryGraph {
        let embedder = MockEmbedder::new(DIM);
        let near = embedder.embed(QUESTION).await.unwrap();
        let far = embedder.embed("something unrelated").await.unwrap();

        InMemoryGraph::new()
            .with_entity(Entity::Question(Question {
                id: "q1".into(),
                title: "Deleting points by filter".into(),
                body: "How do I remove points matching a payload filter?".into(),
                link: None,
                score: 12,
                favorite_count: 0,
                created_at: None,
                communities: vec![],
            }))
            .with_entity(Entity::Answer(Answer {
                id: "a1".into(),
                body: "Use the delete endpoint with a filter selector.".into(),
                score: 8,
                is_accepted: true,
                created_at: None,
                communities: vec![],
            }))
            .with_edge("a1", RelationType::Answers, "q1")
            .with_embedding("Question_index", "q1", near)
            .with_embedding("Answer_index", "a1", far)
    }

    /// Records every prompt it is asked to complete
    struct CapturingGenerator {
        script: ScriptedGenerator,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for CapturingGenerator {
        async fn generate_stream(&self, prompt: &Prompt) -> Result<TextStream> {
            self.prompts.lock().unwrap().push(prompt.text.clone());
            self.script.generate_stream(prompt).await
        }

        fn model_name(&self) -> &str {
            "capturing"
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::EmbeddingUnavailable {
                message: "connection refused".into(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    struct DownStore;

    #[async_trait]
    impl GraphStore for DownStore {
        async fn search(&self, _index: &str, _vector: &[f32], _k: usize) -> Result<Vec<(EntityId, f32)>> {
            Err(AppError::StoreUnavailable {
                message: "connection refused".into(),
            })
        }

        async fn keyword_search(&self, _index: &str, _query: &str, _k: usize) -> Result<Vec<(EntityId, f32)>> {
            Err(AppError::StoreUnavailable {
                message: "connection refused".into(),
            })
        }

        async fn fetch_entity(&self, _key: &EntityKey) -> Result<Option<Entity>> {
            Ok(None)
        }

        async fn fetch_related(
            &self,
            _key: &EntityKey,
            _relation: RelationType,
            _direction: Direction,
        ) -> Result<Vec<Entity>> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<()> {
            Err(AppError::StoreUnavailable {
                message: "connection refused".into(),
            })
        }
    }

    fn pipeline(store: Arc<dyn GraphStore>, generator: Arc<dyn Generator>) -> AnswerPipeline {
        AnswerPipeline::new(
            &config(),
            store,
            Arc::new(MockEmbedder::new(DIM)),
            generator,
            SessionStore::new(),
        )
    }

    #[tokio::test]
    async fn test_full_answer_is_streamed_and_recorded() {
        let generator = Arc::new(CapturingGenerator {
            script: ScriptedGenerator::new(["<think>look", " it up</thi", "nk>Use delete", " with a filter."]),
            prompts: Mutex::new(Vec::new()),
        });
        let pipeline = pipeline(Arc::new(seeded_graph().await), generator.clone());
        let session = pipeline.sessions().create().await;

        let events: Vec<StreamEvent> = pipeline.ask(session.id, QUESTION).await.unwrap().collect().await;

        assert_eq!(
            coalesce(events),
            vec![
                StreamEvent::reasoning("look it up"),
                StreamEvent::answer("Use delete with a filter."),
                StreamEvent::Done,
            ]
        );

        let prompts = generator.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Deleting points by filter"));
        assert!(prompts[0].contains("Use the delete endpoint with a filter selector."));
        assert!(prompts[0].contains(QUESTION));

        let history = assert_ok!(pipeline.sessions().history(session.id).await);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, QUESTION);
        assert_eq!(history[0].reasoning, "look it up");
        assert_eq!(history[0].answer, "Use delete with a filter.");
    }

    #[tokio::test]
    async fn test_history_reaches_the_next_prompt() {
        let generator = Arc::new(CapturingGenerator {
            script: ScriptedGenerator::new(["<think>r</think>first answer"]),
            prompts: Mutex::new(Vec::new()),
        });
        let pipeline = pipeline(Arc::new(seeded_graph().await), generator.clone());
        let session = pipeline.sessions().create().await;

        let _: Vec<_> = pipeline.ask(session.id, QUESTION).await.unwrap().collect().await;
        let _: Vec<_> = pipeline.ask(session.id, "And by id?").await.unwrap().collect().await;

        let prompts = generator.prompts.lock().unwrap().clone();
        assert!(!prompts[0].contains("first answer"));
        assert!(prompts[1].contains(&format!("User: {}", QUESTION)));
        assert!(prompts[1].contains("Assistant: first answer"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected_up_front() {
        let generator = Arc::new(ScriptedGenerator::new(["never"]));
        let pipeline = pipeline(Arc::new(InMemoryGraph::new()), generator.clone());

        let err = pipeline.ask(Uuid::new_v4(), QUESTION).await.err().unwrap();
        assert!(matches!(err, AppError::SessionNotFound { .. }));
        assert_eq!(generator.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_zero_candidates_still_generates() {
        let pipeline = pipeline(
            Arc::new(InMemoryGraph::new()),
            Arc::new(ScriptedGenerator::new(["no context needed"])),
        );
        let session = pipeline.sessions().create().await;

        let events: Vec<StreamEvent> = pipeline.ask(session.id, QUESTION).await.unwrap().collect().await;

        assert_eq!(
            coalesce(events),
            vec![StreamEvent::answer("no context needed"), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_retrieval_outage_ends_with_error() {
        let pipeline = pipeline(Arc::new(DownStore), Arc::new(ScriptedGenerator::new(["unused"])));
        let session = pipeline.sessions().create().await;

        let events: Vec<StreamEvent> = pipeline.ask(session.id, QUESTION).await.unwrap().collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            StreamEvent::Error {
                kind: StreamErrorKind::RetrievalUnavailable,
                ..
            }
        ));
        assert!(pipeline.sessions().history(session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_outage_ends_with_error() {
        let pipeline = AnswerPipeline::new(
            &config(),
            Arc::new(InMemoryGraph::new()),
            Arc::new(DownEmbedder),
            Arc::new(ScriptedGenerator::new(["unused"])),
            SessionStore::new(),
        );
        let session = pipeline.sessions().create().await;

        let events: Vec<StreamEvent> = pipeline.ask(session.id, QUESTION).await.unwrap().collect().await;

        assert!(matches!(
            events.as_slice(),
            [StreamEvent::Error {
                kind: StreamErrorKind::EmbeddingUnavailable,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_model_failure_keeps_streamed_text_and_skips_history() {
        let generator = ScriptedGenerator::new(["<think>partial", "</think>half an ans"])
            .ending_with(ScriptEnd::Unavailable("connection reset".into()));
        let pipeline = pipeline(Arc::new(seeded_graph().await), Arc::new(generator));
        let session = pipeline.sessions().create().await;

        let events: Vec<StreamEvent> = pipeline.ask(session.id, QUESTION).await.unwrap().collect().await;
        let events = coalesce(events);

        assert_eq!(events[0], StreamEvent::reasoning("partial"));
        assert_eq!(events[1], StreamEvent::answer("half an ans"));
        assert!(matches!(
            events[2],
            StreamEvent::Error {
                kind: StreamErrorKind::ModelUnavailable,
                ..
            }
        ));
        assert_eq!(events.len(), 3);
        assert!(pipeline.sessions().history(session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_that_cannot_open_reports_error() {
        let pipeline = pipeline(
            Arc::new(InMemoryGraph::new()),
            Arc::new(ScriptedGenerator::new(["unused"]).failing_on_open()),
        );
        let session = pipeline.sessions().create().await;

        let events: Vec<StreamEvent> = pipeline.ask(session.id, QUESTION).await.unwrap().collect().await;

        assert!(matches!(
            events.as_slice(),
            [StreamEvent::Error {
                kind: StreamErrorKind::ModelUnavailable,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_dropping_the_stream_releases_generation() {
        let fragments: Vec<String> = (0..200).map(|i| format!("word{} ", i)).collect();
        let generator = Arc::new(ScriptedGenerator::new(fragments).with_delay(Duration::from_millis(10)));
        let pipeline = pipeline(Arc::new(InMemoryGraph::new()), generator.clone());
        let session = pipeline.sessions().create().await;

        let mut stream = pipeline.ask(session.id, QUESTION).await.unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first, StreamEvent::answer("word0 "));
        assert_eq!(generator.open_streams(), 1);

        drop(stream);

        for _ in 0..100 {
            if generator.open_streams() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(generator.open_streams(), 0);
        assert!(pipeline.sessions().history(session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_history() {
        let pipeline = pipeline(
            Arc::new(InMemoryGraph::new()),
            Arc::new(ScriptedGenerator::new(["<think>r</think>ok"])),
        );
        let a = pipeline.sessions().create().await;
        let b = pipeline.sessions().create().await;

        let (ea, eb) = tokio::join!(
            async { pipeline.ask(a.id, "question for a").await.unwrap().collect::<Vec<_>>().await },
            async { pipeline.ask(b.id, "question for b").await.unwrap().collect::<Vec<_>>().await },
        );
        assert_eq!(ea.last(), Some(&StreamEvent::Done));
        assert_eq!(eb.last(), Some(&StreamEvent::Done));

        let ha = assert_ok!(pipeline.sessions().history(a.id).await);
        let hb = assert_ok!(pipeline.sessions().history(b.id).await);
        assert_eq!(ha.len(), 1);
        assert_eq!(hb.len(), 1);
        assert_eq!(ha[0].question, "question for a");
        assert_eq!(hb[0].question, "question for b");
    }
}
