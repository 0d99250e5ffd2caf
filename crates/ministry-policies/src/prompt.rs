/// Prompt construction for the remote answer path.
///
/// The template is a text resource with `<|system|>`-style role markers and
/// `{{POLICY_TITLE}}` / `{{POLICY_CONTENT}}` placeholders. Markers are normalized to
/// plain `SYSTEM:` / `USER:` / `ASSISTANT:` labels once at load time so the endpoint
/// never sees tokenizer-specific delimiters. The policy catalog is grouped by the
/// category inferred from each title.
use std::path::Path;

use regex::Regex;

use crate::error::AppError;
use crate::model::PolicyRecord;

const BUNDLED_TEMPLATE: &str = include_str!("../prompts/policy_question.md");
const GENERAL_CATEGORY: &str = "General Policies";

pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    /// Load the template from `path`, or the bundled default when `path` is `None`.
    /// The template is read once and cached for the life of the builder.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let raw = match path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("cannot read prompt template {}: {e}", path.display()))
            })?,
            None => BUNDLED_TEMPLATE.to_string(),
        };
        Ok(Self {
            template: normalize_role_markers(&raw),
        })
    }

    /// Build the full prompt: system instruction + policy catalog + verbatim query.
    pub fn build(&self, query: &str, policies: &[PolicyRecord]) -> String {
        let index_line = format!("Policy Index ({} total)", policies.len());
        let catalog = build_catalog(policies);

        let system = self
            .template
            .replace("{{POLICY_TITLE}}", index_line.trim())
            .replace("{{POLICY_CONTENT}}", catalog.trim());

        format!("{system}\nUSER: {}\nASSISTANT:", query.trim())
    }
}

/// Replace `<|role|>` and `</|role|>` delimiters with plain prefixed labels.
fn normalize_role_markers(template: &str) -> String {
    let open_re = Regex::new(r"<\|(system|user|assistant)\|>").expect("valid regex");
    let close_re = Regex::new(r"</\|(system|user|assistant)\|>").expect("valid regex");

    let replaced = open_re.replace_all(template, |caps: &regex::Captures<'_>| {
        format!("{}:", caps[1].to_uppercase())
    });
    close_re.replace_all(&replaced, "").into_owned()
}

/// Group policies by inferred category and render a markdown catalog.
/// Category order follows the first appearance in the collection.
fn build_catalog(policies: &[PolicyRecord]) -> String {
    let mut groups: Vec<(String, Vec<&PolicyRecord>)> = Vec::new();
    for policy in policies {
        let category = infer_category(&policy.title);
        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(policy),
            None => groups.push((category, vec![policy])),
        }
    }

    let mut catalog = String::new();
    for (category, members) in groups {
        catalog.push_str(&format!("\n\n## {category}\n"));
        for policy in members {
            catalog.push_str(&format!("\n### {}\n{}\n", policy.title, policy.content.trim()));
        }
    }
    catalog
}

/// The text preceding the first `:` or `-` in a title, else the general bucket.
pub fn infer_category(title: &str) -> String {
    let re = Regex::new(r"^([^:\-]+)[:\-]").expect("valid regex");
    re.captures(title)
        .map(|caps| caps[1].trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| GENERAL_CATEGORY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(title: &str, content: &str) -> PolicyRecord {
        PolicyRecord {
            id: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            category: "Test".to_string(),
            summary: "summary".to_string(),
            content: content.to_string(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn role_markers_are_normalized() {
        let normalized =
            normalize_role_markers("<|system|>\ninstructions\n</|system|>\n<|user|>q</|user|>");
        assert!(normalized.contains("SYSTEM:"));
        assert!(normalized.contains("USER:"));
        assert!(!normalized.contains("<|"));
        assert!(!normalized.contains("</|"));
    }

    #[test]
    fn build_substitutes_placeholders_and_appends_query() {
        let builder = PromptBuilder::load(None).expect("bundled template");
        let policies = vec![policy("Safety: Check-In", "kiosk rules")];
        let prompt = builder.build("when do I arrive?", &policies);

        assert!(!prompt.contains("{{POLICY_TITLE}}"));
        assert!(!prompt.contains("{{POLICY_CONTENT}}"));
        assert!(prompt.contains("Policy Index (1 total)"));
        assert!(prompt.contains("kiosk rules"));
        assert!(prompt.ends_with("USER: when do I arrive?\nASSISTANT:"));
    }

    #[test]
    fn catalog_groups_by_inferred_category() {
        let policies = vec![
            policy("Safety: Check-In", "a"),
            policy("Safety: Emergencies", "b"),
            policy("Team Guidelines", "c"),
        ];
        let catalog = build_catalog(&policies);
        assert_eq!(catalog.matches("\n## Safety\n").count(), 1);
        assert!(catalog.contains(&format!("## {GENERAL_CATEGORY}")));
    }

    #[test]
    fn category_inference_handles_missing_separator() {
        assert_eq!(infer_category("Safety: Check-In"), "Safety");
        assert_eq!(infer_category("Rooms - Layout"), "Rooms");
        assert_eq!(infer_category("1. Movement & Vision"), GENERAL_CATEGORY);
    }
}
