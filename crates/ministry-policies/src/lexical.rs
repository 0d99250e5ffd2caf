/// Lexical relevance scoring over the policy store.
///
/// Pure functions: a query and a policy produce a score, identical inputs produce
/// identical output. Weights favor title matches over summary matches over body
/// matches, with a large bonus when the policy contains the query verbatim. A fixed
/// expansion table recovers matches that don't share exact vocabulary (a query for
/// "checkin" should still land on content that only says "kiosk").
use std::cmp::Ordering;

use crate::model::{PolicyRecord, ScoredCandidate};

const EXACT_PHRASE_BONUS: f32 = 100.0;
const TITLE_WEIGHT: f32 = 10.0;
const SUMMARY_WEIGHT: f32 = 5.0;
const CONTENT_WEIGHT: f32 = 1.0;

/// Minimum term length counted against title/summary.
const MIN_TERM_LEN: usize = 2;
/// Minimum term length counted against the full document body.
const MIN_TERM_LEN_FULL_SCAN: usize = 3;

/// Query-term expansion table. Expanded terms are added to the term set before
/// scoring; they earn the same positional weights as the original terms.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("checkin", &["kiosk", "register", "app"]),
    ("check-in", &["kiosk", "register", "app"]),
    ("safety", &["emergency", "protocol", "procedure"]),
    ("volunteer", &["team", "serve", "serving"]),
    ("training", &["orientation", "certification"]),
    ("schedule", &["rotation", "huddle"]),
    ("dress", &["attire", "clothing", "wear"]),
    ("discipline", &["behavior", "redirection", "time-out"]),
];

/// Score one policy against a query. Always ≥ 0; 0 means no textual overlap.
pub fn score(query: &str, policy: &PolicyRecord) -> f32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0.0;
    }

    let title = policy.title.to_lowercase();
    let summary = policy.summary.to_lowercase();
    let content = policy.content.to_lowercase();

    let mut total = 0.0;

    if title.contains(&query) || summary.contains(&query) || content.contains(&query) {
        total += EXACT_PHRASE_BONUS;
    }

    for term in expand_terms(&query) {
        if title.contains(&term) {
            total += TITLE_WEIGHT;
        } else if summary.contains(&term) {
            total += SUMMARY_WEIGHT;
        } else if term.len() >= MIN_TERM_LEN_FULL_SCAN && content.contains(&term) {
            total += CONTENT_WEIGHT;
        }
    }

    total
}

/// Rank all policies against a query.
///
/// Returns only policies with score > 0, sorted descending; ties keep the original
/// collection order (stable sort).
pub fn rank<'a>(query: &str, policies: &'a [PolicyRecord]) -> Vec<ScoredCandidate<'a>> {
    let mut candidates: Vec<ScoredCandidate<'a>> = policies
        .iter()
        .map(|policy| ScoredCandidate {
            policy,
            score: score(query, policy),
        })
        .filter(|c| c.score > 0.0)
        .collect();

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates
}

/// Split a lowercased query into terms and apply the expansion table.
/// Each distinct term is counted once.
fn expand_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut push_unique = |term: &str| {
        if !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    };

    for raw in query.split_whitespace() {
        let term = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if term.len() < MIN_TERM_LEN {
            continue;
        }
        push_unique(term);
        for (key, expansions) in SYNONYMS {
            if term == *key {
                for expansion in *expansions {
                    push_unique(expansion);
                }
            }
        }
    }

    terms
}
