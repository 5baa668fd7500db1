//! Graph context expansion
//!
//! Turns each retrieval candidate into a [`ContextBundle`] by walking
//! the graph one or two hops out from it. Every hit is routed to
//! question-centric context:
//!
//! | Candidate | Neighborhood |
//! |-----------|--------------|
//! | Question  | asker, tags, answers with authors |
//! | Answer    | author, plus the answered question expanded as above |
//! | User      | questions the user asked, and questions the user answered |
//! | Tag       | questions carrying the tag |
//!
//! When community detection has tagged both the hit and a routed
//! question, the question is kept only if their communities overlap.
//!
//! A bundle is all or nothing. When any rule still fails after its single
//! retry, the candidate is dropped and the reason logged.

use futures::future::try_join_all;
use futures::{stream, StreamExt};
use graphqa_common::config::ExpansionConfig;
use graphqa_common::errors::{AppError, ErrorCode, Result};
use graphqa_common::graph::GraphStore;
use graphqa_common::metrics::record_expansion;
use graphqa_common::models::{
    Answer, AnswerContext, Candidate, ContextBundle, Direction, Entity, EntityKey, EntityKind, Neighborhood,
    Question, QuestionContext, RelationType, Tag, User,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct GraphContextExpander {
    store: Arc<dyn GraphStore>,
    max_answers: usize,
    max_related_questions: usize,
    concurrency: usize,
    retry_backoff: Duration,
    community_filter: bool,
}

impl GraphContextExpander {
    pub fn new(store: Arc<dyn GraphStore>, config: &ExpansionConfig) -> Self {
        Self {
            store,
            max_answers: config.max_answers,
            max_related_questions: config.max_related_questions,
            concurrency: config.concurrency.max(1),
            retry_backoff: config.retry_backoff(),
            community_filter: config.community_filter,
        }
    }

    /// Expand candidates with bounded concurrency, keeping retrieval order.
    ///
    /// Candidates whose expansion fails are left out.
    pub async fn expand_all(&self, candidates: &[Candidate]) -> Vec<ContextBundle> {
        let start = Instant::now();

        let futures: Vec<_> = candidates
            .iter()
            .map(|candidate| async move { (candidate, self.expand(candidate).await) })
            .collect();
        let results: Vec<_> = stream::iter(futures)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut bundles = Vec::with_capacity(results.len());
        let mut dropped = 0;
        for (candidate, result) in results {
            match result {
                Ok(bundle) => bundles.push(bundle),
                Err(e) => {
                    dropped += 1;
                    tracing::warn!(
                        code = ?ErrorCode::ExpansionFailure,
                        entity_id = %candidate.entity_id,
                        source = %candidate.source,
                        error = %e,
                        "Dropping candidate"
                    );
                }
            }
        }

        record_expansion(start.elapsed().as_secs_f64(), dropped);
        bundles
    }

    /// Expand one candidate into a complete bundle
    pub async fn expand(&self, candidate: &Candidate) -> Result<ContextBundle> {
        let key = candidate.key();
        let failure = |message: String| AppError::ExpansionFailure {
            entity_id: key.to_string(),
            message,
        };

        let origin = self
            .fetch_entity(&key)
            .await
            .map_err(|e| failure(e.to_string()))?
            .ok_or_else(|| failure("entity not found in graph".to_string()))?;

        let neighborhood = match &origin {
            Entity::Question(q) => self.question_context(q.clone()).await.map(Neighborhood::Question),
            Entity::Answer(a) => self.answer_neighborhood(a).await,
            Entity::User(u) => self.user_neighborhood(u).await,
            Entity::Tag(t) => self
                .related_questions(&origin.key(), RelationType::Tagged, Direction::Incoming)
                .await
                .map(|questions| Neighborhood::Tag {
                    questions: self.routed(&t.communities, questions),
                }),
        }
        .map_err(|e| failure(e.to_string()))?;

        Ok(ContextBundle {
            candidate: candidate.clone(),
            origin,
            neighborhood,
        })
    }

    async fn answer_neighborhood(&self, answer: &Answer) -> Result<Neighborhood> {
        let key = EntityKey::new(EntityKind::Answer, answer.id.clone());
        let (author, question) = tokio::try_join!(
            self.author_of(&key),
            self.related(&key, RelationType::Answers, Direction::Outgoing),
        )?;

        let question = question
            .into_iter()
            .find_map(Entity::into_question)
            .filter(|q| self.same_community(&answer.communities, &q.communities));
        let question = match question {
            Some(q) => Some(self.question_context(q).await?),
            None => None,
        };

        Ok(Neighborhood::Answer { author, question })
    }

    async fn user_neighborhood(&self, user: &User) -> Result<Neighborhood> {
        let key = EntityKey::new(EntityKind::User, user.id.clone());
        let (asked, answered) = tokio::try_join!(
            self.related_questions(&key, RelationType::Asked, Direction::Outgoing),
            self.answered_by(&key),
        )?;

        let asked = self.routed(&user.communities, asked);
        let seen: HashSet<_> = asked.iter().map(|q| q.id.clone()).collect();
        let answered = self
            .routed(&user.communities, answered)
            .into_iter()
            .filter(|q| !seen.contains(&q.id))
            .collect();

        Ok(Neighborhood::User { asked, answered })
    }

    /// Questions reached through the user's answers, deduplicated
    async fn answered_by(&self, user: &EntityKey) -> Result<Vec<Question>> {
        let answers = self.related(user, RelationType::Provided, Direction::Outgoing).await?;

        let per_answer = try_join_all(answers.iter().map(|answer| async move {
            let key = answer.key();
            self.related(&key, RelationType::Answers, Direction::Outgoing).await
        }))
        .await?;

        let mut seen = HashSet::new();
        let questions = per_answer
            .into_iter()
            .flatten()
            .filter_map(Entity::into_question)
            .filter(|q| seen.insert(q.id.clone()))
            .collect();
        Ok(rank_questions(questions))
    }

    /// Asker, tags and answers of a question, fetched concurrently
    async fn question_context(&self, question: Question) -> Result<QuestionContext> {
        let key = EntityKey::new(EntityKind::Question, question.id.clone());
        let (asker, tags, answers) = tokio::try_join!(
            self.related(&key, RelationType::Asked, Direction::Incoming),
            self.related(&key, RelationType::Tagged, Direction::Outgoing),
            self.answers_with_authors(&key),
        )?;

        let asker = asker.into_iter().find_map(Entity::into_user);
        let mut tags: Vec<Tag> = tags.into_iter().filter_map(Entity::into_tag).collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(QuestionContext {
            question,
            asker,
            tags,
            answers,
        })
    }

    async fn answers_with_authors(&self, question: &EntityKey) -> Result<Vec<AnswerContext>> {
        let mut answers: Vec<Answer> = self
            .related(question, RelationType::Answers, Direction::Incoming)
            .await?
            .into_iter()
            .filter_map(Entity::into_answer)
            .collect();

        order_answers(&mut answers);
        answers.truncate(self.max_answers);

        try_join_all(answers.into_iter().map(|answer| async move {
            let key = EntityKey::new(EntityKind::Answer, answer.id.clone());
            let author = self.author_of(&key).await?;
            Ok::<_, AppError>(AnswerContext { answer, author })
        }))
        .await
    }

    async fn author_of(&self, answer: &EntityKey) -> Result<Option<User>> {
        Ok(self
            .related(answer, RelationType::Provided, Direction::Incoming)
            .await?
            .into_iter()
            .find_map(Entity::into_user))
    }

    async fn related_questions(
        &self,
        key: &EntityKey,
        relation: RelationType,
        direction: Direction,
    ) -> Result<Vec<Question>> {
        let questions = self
            .related(key, relation, direction)
            .await?
            .into_iter()
            .filter_map(Entity::into_question)
            .collect();
        Ok(rank_questions(questions))
    }

    /// Community filter, then the per-list cap
    fn routed(&self, origin: &[i64], questions: Vec<Question>) -> Vec<Question> {
        questions
            .into_iter()
            .filter(|q| self.same_community(origin, &q.communities))
            .take(self.max_related_questions)
            .collect()
    }

    fn same_community(&self, origin: &[i64], routed: &[i64]) -> bool {
        !self.community_filter || communities_overlap(origin, routed)
    }

    async fn fetch_entity(&self, key: &EntityKey) -> Result<Option<Entity>> {
        match self.store.fetch_entity(key).await {
            Err(e) if e.is_transient() => {
                tracing::debug!(entity = %key, error = %e, "Retrying entity fetch");
                tokio::time::sleep(self.retry_backoff).await;
                self.store.fetch_entity(key).await
            }
            other => other,
        }
    }

    async fn related(&self, key: &EntityKey, relation: RelationType, direction: Direction) -> Result<Vec<Entity>> {
        match self.store.fetch_related(key, relation, direction).await {
            Err(e) if e.is_transient() => {
                tracing::debug!(entity = %key, relation = %relation, error = %e, "Retrying traversal");
                tokio::time::sleep(self.retry_backoff).await;
                self.store.fetch_related(key, relation, direction).await
            }
            other => other,
        }
    }
}

/// Descending score, then id. Not yet capped.
fn rank_questions(mut questions: Vec<Question>) -> Vec<Question> {
    questions.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    questions
}

/// True unless both sides carry communities and none is shared
pub fn communities_overlap(a: &[i64], b: &[i64]) -> bool {
    a.is_empty() || b.is_empty() || a.iter().any(|c| b.contains(c))
}

/// Accepted answer first, then descending score, then id
pub fn order_answers(answers: &mut [Answer]) {
    answers.sort_by(|a, b| {
        b.is_accepted
            .cmp(&a.is_accepted)
            .then_with(|| b.score.cmp(&a.score))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graphqa_common::graph::InMemoryGraph;
    use graphqa_common::models::EntityId;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn question(id: &str, score: i64) -> Entity {
        Entity::Question(Question {
            id: id.into(),
            title: format!("Question {}", id),
            body: "body".into(),
            link: None,
            score,
            favorite_count: 0,
            created_at: None,
            communities: vec![],
        })
    }

    fn answer(id: &str, score: i64, accepted: bool) -> Entity {
        Entity::Answer(Answer {
            id: id.into(),
            body: format!("Answer {}", id),
            score,
            is_accepted: accepted,
            created_at: None,
            communities: vec![],
        })
    }

    fn user(id: &str) -> Entity {
        Entity::User(User {
            id: id.into(),
            display_name: format!("user-{}", id),
            reputation: 100,
            communities: vec![],
        })
    }

    fn tag(name: &str) -> Entity {
        Entity::Tag(Tag {
            id: name.into(),
            name: name.into(),
            communities: vec![],
        })
    }

    fn fixture() -> InMemoryGraph {
        InMemoryGraph::new()
            .with_entity(question("q1", 10))
            .with_entity(question("q2", 30))
            .with_entity(answer("a1", 50, false))
            .with_entity(answer("a2", 3, true))
            .with_entity(answer("a3", 20, false))
            .with_entity(user("u1"))
            .with_entity(user("u2"))
            .with_entity(tag("vector-db"))
            .with_entity(tag("qdrant"))
            .with_edge("u1", RelationType::Asked, "q1")
            .with_edge("u1", RelationType::Asked, "q2")
            .with_edge("q1", RelationType::Tagged, "vector-db")
            .with_edge("q1", RelationType::Tagged, "qdrant")
            .with_edge("q2", RelationType::Tagged, "qdrant")
            .with_edge("a1", RelationType::Answers, "q1")
            .with_edge("a2", RelationType::Answers, "q1")
            .with_edge("a3", RelationType::Answers, "q1")
            .with_edge("u2", RelationType::Provided, "a1")
            .with_edge("u2", RelationType::Provided, "a2")
    }

    fn question_key(id: &str) -> EntityKey {
        EntityKey::new(EntityKind::Question, id)
    }

    fn config() -> ExpansionConfig {
        ExpansionConfig {
            retry_backoff_ms: 1,
            ..ExpansionConfig::default()
        }
    }

    fn expander(store: impl GraphStore + 'static, config: &ExpansionConfig) -> GraphContextExpander {
        GraphContextExpander::new(Arc::new(store), config)
    }

    #[tokio::test]
    async fn test_question_bundle() {
        let expander = expander(fixture(), &config());
        let bundle = expander
            .expand(&Candidate::new("q1", 0.9, EntityKind::Question, "Question_index"))
            .await
            .unwrap();

        let Neighborhood::Question(ctx) = bundle.neighborhood else {
            panic!("expected question neighborhood");
        };
        assert_eq!(ctx.asker.unwrap().id.as_str(), "u1");
        let tags: Vec<_> = ctx.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["qdrant", "vector-db"]);

        let answers: Vec<_> = ctx.answers.iter().map(|a| a.answer.id.as_str()).collect();
        assert_eq!(answers, vec!["a2", "a1", "a3"]);
        assert_eq!(ctx.answers[0].author.as_ref().unwrap().id.as_str(), "u2");
        assert!(ctx.answers[2].author.is_none());
    }

    #[tokio::test]
    async fn test_answer_cap() {
        let config = ExpansionConfig {
            max_answers: 2,
            ..config()
        };
        let expander = expander(fixture(), &config);
        let bundle = expander
            .expand(&Candidate::new("q1", 0.9, EntityKind::Question, "Question_index"))
            .await
            .unwrap();

        let Neighborhood::Question(ctx) = bundle.neighborhood else {
            panic!("expected question neighborhood");
        };
        let answers: Vec<_> = ctx.answers.iter().map(|a| a.answer.id.as_str()).collect();
        assert_eq!(answers, vec!["a2", "a1"]);
    }

    #[tokio::test]
    async fn test_empty_rules_are_valid() {
        let expander = expander(fixture(), &config());
        let bundle = expander
            .expand(&Candidate::new("q2", 0.7, EntityKind::Question, "Question_index"))
            .await
            .unwrap();

        let Neighborhood::Question(ctx) = bundle.neighborhood else {
            panic!("expected question neighborhood");
        };
        assert!(ctx.answers.is_empty());
        assert_eq!(ctx.tags.len(), 1);
    }

    #[tokio::test]
    async fn test_answer_routes_to_question() {
        let expander = expander(fixture(), &config());
        let bundle = expander
            .expand(&Candidate::new("a1", 0.85, EntityKind::Answer, "Answer_index"))
            .await
            .unwrap();

        match bundle.neighborhood {
            Neighborhood::Answer { author, question } => {
                assert_eq!(author.unwrap().id.as_str(), "u2");
                let question = question.unwrap();
                assert_eq!(question.question.id.as_str(), "q1");
                assert_eq!(question.answers.len(), 3);
            }
            other => panic!("unexpected neighborhood: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_user_and_tag_route_to_questions() {
        let config = ExpansionConfig {
            max_related_questions: 1,
            ..config()
        };
        let expander = expander(fixture(), &config);

        let user_bundle = expander
            .expand(&Candidate::new("u1", 0.5, EntityKind::User, "User_index"))
            .await
            .unwrap();
        match user_bundle.neighborhood {
            Neighborhood::User { asked, answered } => {
                assert_eq!(asked.len(), 1);
                assert_eq!(asked[0].id.as_str(), "q2");
                assert!(answered.is_empty());
            }
            other => panic!("unexpected neighborhood: {:?}", other),
        }

        // u2 asked nothing but answered q1 twice
        let answerer = expander
            .expand(&Candidate::new("u2", 0.5, EntityKind::User, "User_index"))
            .await
            .unwrap();
        match answerer.neighborhood {
            Neighborhood::User { asked, answered } => {
                assert!(asked.is_empty());
                let ids: Vec<_> = answered.iter().map(|q| q.id.as_str()).collect();
                assert_eq!(ids, vec!["q1"]);
            }
            other => panic!("unexpected neighborhood: {:?}", other),
        }

        let tag_bundle = expander
            .expand(&Candidate::new("qdrant", 0.5, EntityKind::Tag, "Tag_index"))
            .await
            .unwrap();
        match tag_bundle.neighborhood {
            Neighborhood::Tag { questions } => assert_eq!(questions[0].id.as_str(), "q2"),
            other => panic!("unexpected neighborhood: {:?}", other),
        }
    }

    /// Wraps a graph and fails chosen traversals a set number of times
    struct FlakyStore {
        inner: InMemoryGraph,
        failures: Mutex<HashMap<(EntityKey, RelationType), usize>>,
    }

    impl FlakyStore {
        fn new(inner: InMemoryGraph, fail: &[(EntityKey, RelationType, usize)]) -> Self {
            let failures = fail
                .iter()
                .map(|(key, rel, n)| ((key.clone(), *rel), *n))
                .collect();
            Self {
                inner,
                failures: Mutex::new(failures),
            }
        }
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn search(&self, index: &str, vector: &[f32], k: usize) -> Result<Vec<(EntityId, f32)>> {
            self.inner.search(index, vector, k).await
        }

        async fn keyword_search(&self, index: &str, query: &str, k: usize) -> Result<Vec<(EntityId, f32)>> {
            self.inner.keyword_search(index, query, k).await
        }

        async fn fetch_entity(&self, key: &EntityKey) -> Result<Option<Entity>> {
            self.inner.fetch_entity(key).await
        }

        async fn fetch_related(
            &self,
            key: &EntityKey,
            relation: RelationType,
            direction: Direction,
        ) -> Result<Vec<Entity>> {
            let should_fail = {
                let mut failures = self.failures.lock().unwrap();
                match failures.get_mut(&(key.clone(), relation)) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if should_fail {
                return Err(AppError::StoreTimeout {
                    operation: "fetch_related".into(),
                    timeout_ms: 5,
                });
            }
            self.inner.fetch_related(key, relation, direction).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let store = FlakyStore::new(fixture(), &[(question_key("q1"), RelationType::Tagged, 1)]);
        let expander = expander(store, &config());

        let bundle = expander
            .expand(&Candidate::new("q1", 0.9, EntityKind::Question, "Question_index"))
            .await;
        assert!(bundle.is_ok());
    }

    #[tokio::test]
    async fn test_persistent_failure_drops_candidate() {
        let store = FlakyStore::new(fixture(), &[(question_key("q1"), RelationType::Answers, 2)]);
        let expander = expander(store, &config());

        let candidates = vec![
            Candidate::new("q1", 0.9, EntityKind::Question, "Question_index"),
            Candidate::new("q2", 0.8, EntityKind::Question, "Question_index"),
        ];
        let bundles = expander.expand_all(&candidates).await;

        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].origin.id().as_str(), "q2");
    }

    #[tokio::test]
    async fn test_missing_entity_is_expansion_failure() {
        let expander = expander(fixture(), &config());
        let err = expander
            .expand(&Candidate::new("ghost", 0.9, EntityKind::Question, "Question_index"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExpansionFailure { .. }));
    }

    #[tokio::test]
    async fn test_expand_all_keeps_retrieval_order() {
        let config = ExpansionConfig {
            concurrency: 3,
            ..config()
        };
        let expander = expander(fixture(), &config);
        let candidates = vec![
            Candidate::new("q2", 0.95, EntityKind::Question, "Question_index"),
            Candidate::new("a1", 0.90, EntityKind::Answer, "Answer_index"),
            Candidate::new("qdrant", 0.80, EntityKind::Tag, "Tag_index"),
            Candidate::new("q1", 0.70, EntityKind::Question, "Question_index"),
        ];

        let bundles = expander.expand_all(&candidates).await;
        let ids: Vec<_> = bundles.iter().map(|b| b.origin.id().as_str()).collect();
        assert_eq!(ids, vec!["q2", "a1", "qdrant", "q1"]);
    }

    #[tokio::test]
    async fn test_same_id_expands_by_candidate_category() {
        let graph = fixture()
            .with_entity(question("42", 5))
            .with_entity(user("42"))
            .with_edge("42", RelationType::Asked, "q2");
        let expander = expander(graph, &config());

        let as_question = expander
            .expand(&Candidate::new("42", 0.91, EntityKind::Question, "Question_index"))
            .await
            .unwrap();
        assert_eq!(as_question.origin.kind(), EntityKind::Question);
        assert!(matches!(as_question.neighborhood, Neighborhood::Question(_)));

        let as_user = expander
            .expand(&Candidate::new("42", 0.80, EntityKind::User, "User_index"))
            .await
            .unwrap();
        assert_eq!(as_user.origin.kind(), EntityKind::User);
        match as_user.neighborhood {
            Neighborhood::User { asked, .. } => assert_eq!(asked[0].id.as_str(), "q2"),
            other => panic!("unexpected neighborhood: {:?}", other),
        }

        // A tag hit never resolves to a question that happens to share its id
        let err = expander
            .expand(&Candidate::new("42", 0.5, EntityKind::Tag, "Tag_index"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExpansionFailure { .. }));
    }

    fn in_communities(entity: Entity, ids: &[i64]) -> Entity {
        match entity {
            Entity::Question(mut q) => {
                q.communities = ids.to_vec();
                Entity::Question(q)
            }
            Entity::Answer(mut a) => {
                a.communities = ids.to_vec();
                Entity::Answer(a)
            }
            Entity::User(mut u) => {
                u.communities = ids.to_vec();
                Entity::User(u)
            }
            Entity::Tag(mut t) => {
                t.communities = ids.to_vec();
                Entity::Tag(t)
            }
        }
    }

    fn community_fixture() -> InMemoryGraph {
        fixture()
            .with_entity(in_communities(question("q1", 10), &[1]))
            .with_entity(in_communities(question("q2", 30), &[2]))
            .with_entity(in_communities(answer("a1", 50, false), &[2]))
            .with_entity(in_communities(tag("qdrant"), &[1, 3]))
    }

    #[tokio::test]
    async fn test_community_filter_drops_foreign_questions() {
        let expander = expander(community_fixture(), &config());

        // qdrant tags q1 (community 1) and q2 (community 2)
        let bundle = expander
            .expand(&Candidate::new("qdrant", 0.5, EntityKind::Tag, "Tag_index"))
            .await
            .unwrap();
        match bundle.neighborhood {
            Neighborhood::Tag { questions } => {
                let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
                assert_eq!(ids, vec!["q1"]);
            }
            other => panic!("unexpected neighborhood: {:?}", other),
        }

        // a1 sits in community 2, its question in community 1
        let bundle = expander
            .expand(&Candidate::new("a1", 0.85, EntityKind::Answer, "Answer_index"))
            .await
            .unwrap();
        match bundle.neighborhood {
            Neighborhood::Answer { author, question } => {
                assert!(author.is_some());
                assert!(question.is_none());
            }
            other => panic!("unexpected neighborhood: {:?}", other),
        }

        // u1 carries no community, so nothing is filtered
        let bundle = expander
            .expand(&Candidate::new("u1", 0.5, EntityKind::User, "User_index"))
            .await
            .unwrap();
        match bundle.neighborhood {
            Neighborhood::User { asked, .. } => assert_eq!(asked.len(), 2),
            other => panic!("unexpected neighborhood: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_community_filter_can_be_disabled() {
        let config = ExpansionConfig {
            community_filter: false,
            ..config()
        };
        let expander = expander(community_fixture(), &config);
        let bundle = expander
            .expand(&Candidate::new("qdrant", 0.5, EntityKind::Tag, "Tag_index"))
            .await
            .unwrap();
        match bundle.neighborhood {
            Neighborhood::Tag { questions } => assert_eq!(questions.len(), 2),
            other => panic!("unexpected neighborhood: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_user_answered_questions_exclude_asked() {
        let graph = fixture()
            .with_entity(answer("a4", 1, false))
            .with_edge("u1", RelationType::Provided, "a4")
            .with_edge("a4", RelationType::Answers, "q2")
            .with_edge("u1", RelationType::Provided, "a3");
        let expander = expander(graph, &config());

        let bundle = expander
            .expand(&Candidate::new("u1", 0.5, EntityKind::User, "User_index"))
            .await
            .unwrap();
        match bundle.neighborhood {
            Neighborhood::User { asked, answered } => {
                let asked: Vec<_> = asked.iter().map(|q| q.id.as_str()).collect();
                assert_eq!(asked, vec!["q2", "q1"]);
                // q1 and q2 were both asked by u1, so neither repeats
                assert!(answered.is_empty());
            }
            other => panic!("unexpected neighborhood: {:?}", other),
        }
    }

    #[test]
    fn test_communities_overlap() {
        assert!(communities_overlap(&[], &[1]));
        assert!(communities_overlap(&[1, 2], &[]));
        assert!(communities_overlap(&[1, 2], &[2, 5]));
        assert!(!communities_overlap(&[1], &[2]));
    }

    #[test]
    fn test_accepted_answer_first_regardless_of_score() {
        let mut answers: Vec<Answer> = vec![
            answer("x", 100, false),
            answer("y", -5, true),
            answer("z", 40, false),
        ]
        .into_iter()
        .filter_map(Entity::into_answer)
        .collect();

        order_answers(&mut answers);
        let ids: Vec<_> = answers.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x", "z"]);
    }
}
