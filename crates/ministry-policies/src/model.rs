use serde::{Deserialize, Serialize};

/// A single ministry policy document (e.g. "3. Safety Policies").
///
/// Records are created once at load time and immutable thereafter; the `PolicyStore`
/// owns the collection and every other component reads through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Stable identifier, e.g. "safety-policies"
    pub id: String,
    /// Display title, e.g. "3. Safety Policies"
    pub title: String,
    /// Category name, e.g. "Safety Policies"
    pub category: String,
    /// One-sentence summary used in search results
    pub summary: String,
    /// Full policy text, markdown-like with `###`/`####` section headings
    pub content: String,
    /// Optional keyword tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A policy paired with its relevance score for one query. Transient; discarded
/// after ranking.
#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub policy: &'a PolicyRecord,
    pub score: f32,
}

/// A secondary policy location surfaced alongside the primary answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedSection {
    pub policy_id: String,
    pub heading: String,
}

/// The result of one answered query. Created fresh per query; never persisted.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub answer_text: String,
    pub primary_policy_id: String,
    /// Up to 3 unique related policy ids, most relevant first.
    pub related_policy_ids: Vec<String>,
    /// Up to 3 related sections, most relevant first.
    pub related_sections: Vec<RelatedSection>,
}

/// A policy category with its document count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub policy_count: usize,
}
