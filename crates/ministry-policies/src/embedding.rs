/// Deterministic pseudo-embeddings.
///
/// A cheap stand-in for real semantic embeddings: each character's code point is
/// accumulated into a fixed-length vector bucketed by position, then the vector is
/// normalized to unit length. The result captures coarse character-frequency
/// similarity only — the contract is exact determinism (same text, same vector,
/// bit for bit), not semantic accuracy.
use std::cmp::Ordering;

use crate::model::PolicyRecord;

pub const EMBEDDING_DIM: usize = 128;

/// Embed text into a unit-length vector of `EMBEDDING_DIM` floats.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];

    let normalized = text.trim().to_lowercase();
    for (i, ch) in normalized.chars().enumerate() {
        vector[i % EMBEDDING_DIM] += ch as u32 as f32;
    }

    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for v in &mut vector {
            *v /= magnitude;
        }
    }
    vector
}

/// Cosine similarity between two vectors, in [-1, 1]. Returns 0 when either
/// vector has zero norm.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Reorder the full policy list by similarity to the query, most similar first.
///
/// Every policy is embedded from `title + " " + summary`. The list is not filtered:
/// callers that need a relevance cutoff should use the lexical scorer instead. Ties
/// keep the original collection order.
pub fn rank_by_similarity<'a>(query: &str, policies: &'a [PolicyRecord]) -> Vec<&'a PolicyRecord> {
    let query_embedding = embed(query);

    let mut scored: Vec<(&'a PolicyRecord, f32)> = policies
        .iter()
        .map(|policy| {
            let text = format!("{} {}", policy.title, policy.summary);
            let score = similarity(&query_embedding, &embed(&text));
            (policy, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(policy, _)| policy).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PolicyRecord;

    fn policy(id: &str, title: &str, summary: &str) -> PolicyRecord {
        PolicyRecord {
            id: id.to_string(),
            title: title.to_string(),
            category: "Test".to_string(),
            summary: summary.to_string(),
            content: String::new(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn embed_is_deterministic_bit_for_bit() {
        let a = embed("When should volunteers arrive on Sunday?");
        let b = embed("When should volunteers arrive on Sunday?");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn embed_normalizes_to_unit_length() {
        let v = embed("check-in procedures");
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn self_similarity_is_one() {
        let v = embed("safety protocols");
        assert!((similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector_without_panicking() {
        let v = embed("   ");
        assert!(v.iter().all(|&x| x == 0.0));
        assert_eq!(similarity(&v, &embed("anything")), 0.0);
    }

    #[test]
    fn rank_returns_full_reordered_list() {
        let policies = vec![
            policy("a", "Safety Policies", "emergency procedures"),
            policy("b", "Training", "orientation and certification"),
            policy("c", "Appendix", "forms and contacts"),
        ];
        let ranked = rank_by_similarity("safety emergency procedures", &policies);
        assert_eq!(ranked.len(), policies.len());

        // Identical inputs yield an identical ordering.
        let again = rank_by_similarity("safety emergency procedures", &policies);
        let ids: Vec<&str> = ranked.iter().map(|p| p.id.as_str()).collect();
        let ids_again: Vec<&str> = again.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ids_again);
    }
}
