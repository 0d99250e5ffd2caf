/// In-memory policy store.
///
/// Policies load once at startup — from the bundled default set or an operator-supplied
/// JSON file — and are immutable afterwards. All lookups iterate in collection order, so
/// any "first match wins" resolution downstream is deterministic.
use std::path::Path;

use regex::Regex;
use tracing::info;

use crate::error::AppError;
use crate::model::{Category, PolicyRecord};

const BUNDLED_POLICIES: &str = include_str!("../data/policies.json");

#[derive(Debug)]
pub struct PolicyStore {
    policies: Vec<PolicyRecord>,
}

impl PolicyStore {
    /// Parse a policy set from JSON and validate it.
    ///
    /// Fails on malformed JSON, an empty collection, or a duplicate id.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let policies: Vec<PolicyRecord> = serde_json::from_str(json)
            .map_err(|e| AppError::PolicyData(format!("invalid policy JSON: {e}")))?;

        if policies.is_empty() {
            return Err(AppError::PolicyData("policy set is empty".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for policy in &policies {
            if !seen.insert(policy.id.as_str()) {
                return Err(AppError::PolicyData(format!(
                    "duplicate policy id: {}",
                    policy.id
                )));
            }
        }

        Ok(Self { policies })
    }

    /// Load the policy set from `path`, or the bundled default set when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let store = match path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    AppError::PolicyData(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_json(&json)?
            }
            None => Self::from_json(BUNDLED_POLICIES)?,
        };
        info!(policies = store.len(), "policy store loaded");
        Ok(store)
    }

    pub fn policies(&self) -> &[PolicyRecord] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Look up a policy by exact id.
    pub fn get(&self, id: &str) -> Option<&PolicyRecord> {
        self.policies.iter().find(|p| p.id == id)
    }

    /// Look up a policy by id, case-insensitively.
    pub fn get_ci(&self, id: &str) -> Option<&PolicyRecord> {
        let id = id.trim();
        self.policies.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    /// Look up a policy by title. Case-insensitive and whitespace-trimmed on both sides.
    pub fn find_by_title(&self, title: &str) -> Option<&PolicyRecord> {
        let wanted = title.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.policies
            .iter()
            .find(|p| p.title.trim().to_lowercase() == wanted)
    }

    /// Distinct categories with policy counts, in collection order.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = Vec::new();
        for policy in &self.policies {
            match categories.iter_mut().find(|c| c.name == policy.category) {
                Some(category) => category.policy_count += 1,
                None => categories.push(Category {
                    name: policy.category.clone(),
                    policy_count: 1,
                }),
            }
        }
        categories
    }
}

/// Extract section headings (`###`/`####` lines) from policy content, in document order.
pub fn section_headings(content: &str) -> Vec<String> {
    let heading_re = Regex::new(r"^\s*#{3,4}\s+(.+?)\s*$").expect("valid regex");
    content
        .lines()
        .filter_map(|line| heading_re.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_set_loads_with_unique_ids() {
        let store = PolicyStore::load(None).expect("bundled set is valid");
        assert!(store.len() >= 7);
        assert!(store.get("behavior-guidelines-and-discipline").is_some());
        assert!(store.get("team-guidelines").is_some());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let json = r#"[
            {"id": "a", "title": "A", "category": "C", "summary": "s", "content": "x"},
            {"id": "a", "title": "B", "category": "C", "summary": "s", "content": "y"}
        ]"#;
        let err = PolicyStore::from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate policy id"));
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(PolicyStore::from_json("[]").is_err());
    }

    #[test]
    fn title_lookup_is_case_insensitive_and_trimmed() {
        let store = PolicyStore::load(None).expect("bundled set is valid");
        let policy = store
            .find_by_title("  4. BEHAVIOR guidelines  ")
            .expect("title match");
        assert_eq!(policy.id, "behavior-guidelines-and-discipline");
        assert!(store.find_by_title("no such policy").is_none());
    }

    #[test]
    fn categories_preserve_collection_order() {
        let store = PolicyStore::load(None).expect("bundled set is valid");
        let categories = store.categories();
        assert_eq!(categories[0].name, "Vision");
        assert!(categories.iter().all(|c| c.policy_count >= 1));
    }

    #[test]
    fn section_headings_extracted_in_order() {
        let store = PolicyStore::load(None).expect("bundled set is valid");
        let team = store.get("team-guidelines").expect("present");
        let headings = section_headings(&team.content);
        assert!(headings.iter().any(|h| h.contains("Weekly Schedule")));
        let behavior = store
            .get("behavior-guidelines-and-discipline")
            .expect("present");
        assert!(section_headings(&behavior.content)
            .iter()
            .any(|h| h.contains("Dress Code")));
    }
}
