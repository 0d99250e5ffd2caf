/// Query orchestration.
///
/// A query is ranked lexically, gated through the rate limiter when a remote client
/// is configured, answered remotely or by the local synthesizer, and resolved into a
/// `ResponseEnvelope`. The remote path degrades to local synthesis on any upstream
/// failure — after the rate-limit gate, the engine always produces an envelope.
use std::sync::Arc;

use tracing::warn;

use crate::embedding;
use crate::error::AppError;
use crate::lexical;
use crate::model::{PolicyRecord, RelatedSection, ResponseEnvelope, ScoredCandidate};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::remote::{RemoteAnswer, RemoteAnswerAdapter};
use crate::resolve::Resolver;
use crate::store::PolicyStore;
use crate::synthesize::AnswerSynthesizer;

const MAX_RELATED: usize = 3;

pub struct AnswerEngine {
    store: Arc<PolicyStore>,
    synthesizer: AnswerSynthesizer,
    remote: Option<RemoteAnswerAdapter>,
    limiter: Arc<RateLimiter>,
}

impl AnswerEngine {
    pub fn new(
        store: Arc<PolicyStore>,
        synthesizer: AnswerSynthesizer,
        remote: Option<RemoteAnswerAdapter>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            store,
            synthesizer,
            remote,
            limiter,
        }
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Answer one query for `user_id`.
    ///
    /// Errors only on a blank query or a rate-limit rejection; every other failure
    /// degrades to the local pipeline.
    pub async fn answer(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<ResponseEnvelope, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::EmptyPrompt);
        }

        let ranked = lexical::rank(query, self.store.policies());
        // No lexical hit: fall back to the pseudo-embedding ordering and treat its
        // leader as a low-confidence candidate. The synthesizer still returns the
        // fixed no-information answer when the content has no textual overlap.
        let local_primary = ranked.first().map(|c| c.policy).or_else(|| {
            embedding::rank_by_similarity(query, self.store.policies())
                .into_iter()
                .next()
        });
        let Some(local_primary) = local_primary else {
            return Ok(no_information_envelope(query));
        };

        if let Some(remote) = &self.remote {
            match self.limiter.check(user_id).await {
                RateDecision::Allowed => {
                    match remote.ask(query, self.store.policies()).await {
                        Ok(mut answer) => {
                            self.limiter.record_success(user_id).await;
                            if answer.text.trim().is_empty() {
                                answer.text =
                                    self.synthesizer.synthesize(query, local_primary);
                            }
                            return Ok(assemble_remote(
                                &self.store,
                                query,
                                answer,
                                &ranked,
                                local_primary,
                            ));
                        }
                        Err(e) => {
                            warn!(query, error = %e, "remote answer failed, degrading to local synthesis");
                        }
                    }
                }
                RateDecision::Throttled { wait } => {
                    return Err(AppError::Throttled {
                        wait_ms: wait.as_millis() as u64,
                    });
                }
                RateDecision::DailyExhausted { reset_at } => {
                    return Err(AppError::DailyExhausted {
                        limit: self.limiter.daily_limit(),
                        reset_at: reset_at.to_rfc3339(),
                    });
                }
            }
        }

        let answer = self.synthesizer.synthesize(query, local_primary);
        Ok(assemble_local(&self.store, query, answer, &ranked, local_primary))
    }
}

/// Envelope for a locally synthesized answer.
fn assemble_local(
    store: &PolicyStore,
    query: &str,
    answer_text: String,
    ranked: &[ScoredCandidate<'_>],
    primary: &PolicyRecord,
) -> ResponseEnvelope {
    let resolver = Resolver::new(store);
    let primary = resolver.topic_override(query, &answer_text).unwrap_or(primary);

    ResponseEnvelope {
        related_policy_ids: related_from_ranked(ranked, &primary.id),
        related_sections: resolver.sections_for_query(query, primary, MAX_RELATED),
        primary_policy_id: primary.id.clone(),
        answer_text,
    }
}

/// Envelope for a remote answer: remote metadata resolves to canonical ids where
/// possible, the lexical ranking fills the gaps, and the topic overrides win over
/// everything the metadata suggested.
fn assemble_remote(
    store: &PolicyStore,
    query: &str,
    answer: RemoteAnswer,
    ranked: &[ScoredCandidate<'_>],
    local_primary: &PolicyRecord,
) -> ResponseEnvelope {
    let resolver = Resolver::new(store);
    let RemoteAnswer { text, metadata } = answer;

    let mut primary = metadata
        .as_ref()
        .and_then(|m| resolver.resolve_policy_ref(&m.primary_policy))
        .unwrap_or(local_primary);
    if let Some(overridden) = resolver.topic_override(query, &text) {
        primary = overridden;
    }

    let mut related_ids: Vec<String> = Vec::new();
    let mut related_sections: Vec<RelatedSection> = Vec::new();
    if let Some(metadata) = &metadata {
        for reference in &metadata.related_policies {
            if let Some(policy) = resolver.resolve_policy_ref(reference) {
                if policy.id != primary.id
                    && !related_ids.contains(&policy.id)
                    && related_ids.len() < MAX_RELATED
                {
                    related_ids.push(policy.id.clone());
                }
            }
            if let Some(section) = resolver.resolve_section_ref(reference) {
                if !related_sections.contains(&section) && related_sections.len() < MAX_RELATED {
                    related_sections.push(section);
                }
            }
        }
    }

    if related_ids.is_empty() {
        related_ids = related_from_ranked(ranked, &primary.id);
    }
    if related_sections.is_empty() {
        related_sections = resolver.sections_for_query(query, primary, MAX_RELATED);
    }

    ResponseEnvelope {
        answer_text: text,
        primary_policy_id: primary.id.clone(),
        related_policy_ids: related_ids,
        related_sections,
    }
}

/// Up to 3 unique related ids from the lexical ranking, skipping the primary.
fn related_from_ranked(ranked: &[ScoredCandidate<'_>], primary_id: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for candidate in ranked {
        if candidate.policy.id == primary_id || ids.contains(&candidate.policy.id) {
            continue;
        }
        ids.push(candidate.policy.id.clone());
        if ids.len() == MAX_RELATED {
            break;
        }
    }
    ids
}

fn no_information_envelope(query: &str) -> ResponseEnvelope {
    ResponseEnvelope {
        answer_text: format!(
            "I don't have specific information about {query} in our policies."
        ),
        primary_policy_id: String::new(),
        related_policy_ids: Vec::new(),
        related_sections: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiterConfig;
    use crate::remote::AnswerMetadata;
    use crate::resolve::BEHAVIOR_POLICY_ID;
    use crate::synthesize::FixedFraming;
    use ministry_common::redis::RedisCache;

    fn local_engine() -> AnswerEngine {
        let store = Arc::new(PolicyStore::load(None).expect("bundled set"));
        let limiter = Arc::new(RateLimiter::new(
            RateLimiterConfig::default(),
            RedisCache::new(None),
        ));
        AnswerEngine::new(
            store,
            AnswerSynthesizer::new(Box::new(FixedFraming(0))),
            None,
            limiter,
        )
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let engine = local_engine();
        assert!(matches!(
            engine.answer("   ", "u").await,
            Err(AppError::EmptyPrompt)
        ));
    }

    #[tokio::test]
    async fn dress_code_routes_to_behavior_guidelines() {
        let engine = local_engine();
        let envelope = engine.answer("dress code", "u").await.expect("answered");
        assert_eq!(envelope.primary_policy_id, BEHAVIOR_POLICY_ID);
        assert!(!envelope.related_policy_ids.contains(&envelope.primary_policy_id));
        assert!(envelope.related_policy_ids.len() <= 3);
        assert!(envelope.related_sections.len() <= 3);
    }

    #[tokio::test]
    async fn arrival_question_answers_from_weekly_schedule() {
        let engine = local_engine();
        let envelope = engine
            .answer("what time should I arrive", "u")
            .await
            .expect("answered");
        assert_eq!(envelope.primary_policy_id, "team-guidelines");
        assert!(
            envelope.answer_text.contains("8:15") || envelope.answer_text.contains("arrive"),
            "unexpected answer: {}",
            envelope.answer_text
        );
    }

    #[tokio::test]
    async fn unmatched_query_yields_fixed_fallback_envelope() {
        let engine = local_engine();
        let envelope = engine
            .answer("quantum flux capacitor maintenance", "u")
            .await
            .expect("answered");
        assert!(envelope
            .answer_text
            .contains("I don't have specific information"));
    }

    #[test]
    fn remote_metadata_resolves_titles_to_ids() {
        let store = PolicyStore::load(None).expect("bundled set");
        let ranked = lexical::rank("when should I arrive", store.policies());
        let local_primary = store.get("team-guidelines").expect("present");

        let answer = RemoteAnswer {
            text: "Arrive by 8:15 AM for the huddle.".to_string(),
            metadata: Some(AnswerMetadata {
                primary_policy: "2. Team Guidelines".to_string(),
                related_policies: vec![
                    "3. Safety Policies".to_string(),
                    "Weekly Schedule".to_string(),
                ],
            }),
        };

        let envelope = assemble_remote(&store, "when should I arrive", answer, &ranked, local_primary);
        assert_eq!(envelope.primary_policy_id, "team-guidelines");
        assert!(envelope
            .related_policy_ids
            .contains(&"safety-policies".to_string()));
        assert!(envelope
            .related_sections
            .iter()
            .any(|s| s.heading.contains("Weekly Schedule")));
    }

    #[test]
    fn topic_override_beats_remote_metadata() {
        let store = PolicyStore::load(None).expect("bundled set");
        let ranked = lexical::rank("dress code", store.policies());
        let local_primary = ranked.first().map(|c| c.policy).expect("ranked");

        // Remote metadata points somewhere else entirely; the override wins.
        let answer = RemoteAnswer {
            text: "Wear your ministry t-shirt.".to_string(),
            metadata: Some(AnswerMetadata {
                primary_policy: "6. Training & Development".to_string(),
                related_policies: vec![],
            }),
        };

        let envelope = assemble_remote(&store, "dress code", answer, &ranked, local_primary);
        assert_eq!(envelope.primary_policy_id, BEHAVIOR_POLICY_ID);
    }

    #[tokio::test]
    async fn related_ids_are_unique_and_capped() {
        let engine = local_engine();
        let envelope = engine
            .answer("safety check-in procedures for volunteers", "u")
            .await
            .expect("answered");

        let mut seen = std::collections::HashSet::new();
        for id in &envelope.related_policy_ids {
            assert!(seen.insert(id.clone()), "duplicate related id: {id}");
            assert_ne!(id, &envelope.primary_policy_id);
        }
        assert!(envelope.related_policy_ids.len() <= 3);
    }
}
