/// Mapping of free-text policy references onto canonical policy ids.
///
/// Remote metadata names policies by title or section heading, not id. Resolution
/// order: exact title match, exact section-heading match, section-heading
/// containment, then raw content containment. Every pass iterates in collection
/// order, so an ambiguous reference resolves to the first matching policy.
///
/// Two topic overrides take precedence over anything the remote metadata says:
/// dress-code vocabulary routes to the behavior guidelines, devotional vocabulary
/// routes to the vision policy, and dress-code wins when both match.
use crate::model::{PolicyRecord, RelatedSection};
use crate::store::{section_headings, PolicyStore};

pub const BEHAVIOR_POLICY_ID: &str = "behavior-guidelines-and-discipline";
pub const VISION_POLICY_ID: &str = "movement-vision";

const DRESS_CODE_TERMS: &[&str] = &[
    "dress code",
    "dress",
    "attire",
    "clothing",
    "t-shirt",
    "lanyard",
];

const DEVOTIONAL_TERMS: &[&str] = &[
    "devotion",
    "devotional",
    "theology",
    "theological",
    "gospel",
    "scripture",
    "bible",
    "prayer",
];

/// Static keyword → section table used when remote metadata is absent or
/// unresolvable. First matching keyword wins.
const SECTION_KEYWORDS: &[(&str, &str, &str)] = &[
    ("dress", BEHAVIOR_POLICY_ID, "4.1.2 Dress Code"),
    ("clothing", BEHAVIOR_POLICY_ID, "4.1.2 Dress Code"),
    ("discipline", BEHAVIOR_POLICY_ID, "4.3 Discipline Policy"),
    ("check-in", "safety-policies", "3.1 Check-In and Check-Out Procedures"),
    ("checkin", "safety-policies", "3.1 Check-In and Check-Out Procedures"),
    ("kiosk", "safety-policies", "3.1 Check-In and Check-Out Procedures"),
    ("emergency", "safety-policies", "3.3 Emergency Procedures"),
    ("restroom", "safety-policies", "3.5 Restroom Policies"),
    ("training", "training-development", "6.1 Required Training"),
    ("schedule", "team-guidelines", "2.2 Weekly Schedule"),
    ("arrive", "team-guidelines", "2.2 Weekly Schedule"),
    ("huddle", "team-guidelines", "2.2 Weekly Schedule"),
];

pub struct Resolver<'a> {
    store: &'a PolicyStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a PolicyStore) -> Self {
        Self { store }
    }

    /// Resolve a free-text policy or section reference to a policy.
    pub fn resolve_policy_ref(&self, reference: &str) -> Option<&'a PolicyRecord> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if let Some(policy) = self.store.find_by_title(reference) {
            return Some(policy);
        }

        let needle = reference.to_lowercase();

        // Exact section-heading match beats containment across the whole set.
        for policy in self.store.policies() {
            if section_headings(&policy.content)
                .iter()
                .any(|h| h.trim().to_lowercase() == needle)
            {
                return Some(policy);
            }
        }

        for policy in self.store.policies() {
            if section_headings(&policy.content)
                .iter()
                .any(|h| h.to_lowercase().contains(&needle))
            {
                return Some(policy);
            }
        }

        self.store
            .policies()
            .iter()
            .find(|p| p.content.to_lowercase().contains(&needle))
    }

    /// Resolve a reference that names a section, yielding the matched heading.
    pub fn resolve_section_ref(&self, reference: &str) -> Option<RelatedSection> {
        let needle = reference.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        for policy in self.store.policies() {
            if let Some(heading) = section_headings(&policy.content)
                .into_iter()
                .find(|h| h.trim().to_lowercase() == needle)
            {
                return Some(RelatedSection {
                    policy_id: policy.id.clone(),
                    heading,
                });
            }
        }

        for policy in self.store.policies() {
            if let Some(heading) = section_headings(&policy.content)
                .into_iter()
                .find(|h| h.to_lowercase().contains(&needle))
            {
                return Some(RelatedSection {
                    policy_id: policy.id.clone(),
                    heading,
                });
            }
        }

        None
    }

    /// First static-table entry whose keyword appears in `text` and whose policy
    /// exists in the store.
    pub fn keyword_section(&self, text: &str) -> Option<RelatedSection> {
        let text = text.to_lowercase();
        SECTION_KEYWORDS
            .iter()
            .filter(|(keyword, _, _)| text.contains(keyword))
            .find_map(|(_, policy_id, heading)| {
                self.store.get(policy_id).map(|p| RelatedSection {
                    policy_id: p.id.clone(),
                    heading: heading.to_string(),
                })
            })
    }

    /// Hard-coded topic overrides over query + answer text.
    pub fn topic_override(&self, query: &str, answer: &str) -> Option<&'a PolicyRecord> {
        let haystack = format!("{} {}", query.to_lowercase(), answer.to_lowercase());

        if DRESS_CODE_TERMS.iter().any(|t| haystack.contains(t)) {
            if let Some(policy) = self.store.get(BEHAVIOR_POLICY_ID) {
                return Some(policy);
            }
        }
        if DEVOTIONAL_TERMS.iter().any(|t| haystack.contains(t)) {
            if let Some(policy) = self.store.get(VISION_POLICY_ID) {
                return Some(policy);
            }
        }
        None
    }

    /// Related sections for a locally answered query: headings of the primary
    /// policy sharing a query term, then the static keyword entry. Deduped, in
    /// discovery order, at most `limit`.
    pub fn sections_for_query(
        &self,
        query: &str,
        primary: &PolicyRecord,
        limit: usize,
    ) -> Vec<RelatedSection> {
        let query_lc = query.to_lowercase();
        let terms: Vec<&str> = query_lc
            .split_whitespace()
            .filter(|t| t.len() > 3)
            .collect();

        let mut sections: Vec<RelatedSection> = Vec::new();
        let push_unique = |section: RelatedSection, sections: &mut Vec<RelatedSection>| {
            if !sections.contains(&section) {
                sections.push(section);
            }
        };

        for heading in section_headings(&primary.content) {
            let heading_lc = heading.to_lowercase();
            if terms.iter().any(|t| heading_lc.contains(t)) {
                push_unique(
                    RelatedSection {
                        policy_id: primary.id.clone(),
                        heading,
                    },
                    &mut sections,
                );
            }
        }

        if let Some(section) = self.keyword_section(&query_lc) {
            push_unique(section, &mut sections);
        }

        sections.truncate(limit);
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PolicyStore {
        PolicyStore::load(None).expect("bundled set is valid")
    }

    #[test]
    fn title_match_is_case_insensitive_and_trimmed() {
        let store = store();
        let resolver = Resolver::new(&store);
        let policy = resolver
            .resolve_policy_ref("  3. safety POLICIES ")
            .expect("resolved");
        assert_eq!(policy.id, "safety-policies");
    }

    #[test]
    fn exact_heading_match_beats_containment() {
        let json = r####"[
            {"id": "a", "title": "A", "category": "C", "summary": "s",
             "content": "### Weekly Schedule Overview\ntext"},
            {"id": "b", "title": "B", "category": "C", "summary": "s",
             "content": "### Weekly Schedule\ntext"}
        ]"####;
        let store = PolicyStore::from_json(json).expect("valid");
        let resolver = Resolver::new(&store);

        // "a" comes first and contains the phrase, but "b" matches the heading exactly.
        let policy = resolver.resolve_policy_ref("Weekly Schedule").expect("resolved");
        assert_eq!(policy.id, "b");
    }

    #[test]
    fn ambiguous_reference_takes_first_in_collection_order() {
        let json = r#"[
            {"id": "a", "title": "A", "category": "C", "summary": "s",
             "content": "both mention the kiosk here"},
            {"id": "b", "title": "B", "category": "C", "summary": "s",
             "content": "both mention the kiosk here"}
        ]"#;
        let store = PolicyStore::from_json(json).expect("valid");
        let resolver = Resolver::new(&store);
        let policy = resolver.resolve_policy_ref("mention the kiosk").expect("resolved");
        assert_eq!(policy.id, "a");
    }

    #[test]
    fn section_ref_resolves_heading_by_containment() {
        let store = store();
        let resolver = Resolver::new(&store);
        let section = resolver.resolve_section_ref("Dress Code").expect("resolved");
        assert_eq!(section.policy_id, BEHAVIOR_POLICY_ID);
        assert!(section.heading.contains("Dress Code"));
    }

    #[test]
    fn keyword_fallback_finds_section() {
        let store = store();
        let resolver = Resolver::new(&store);
        let section = resolver
            .keyword_section("when should i arrive on sunday")
            .expect("keyword hit");
        assert_eq!(section.policy_id, "team-guidelines");
        assert!(section.heading.contains("Weekly Schedule"));
    }

    #[test]
    fn dress_code_override_beats_devotional() {
        let store = store();
        let resolver = Resolver::new(&store);

        let dress = resolver.topic_override("what is the dress code", "").expect("override");
        assert_eq!(dress.id, BEHAVIOR_POLICY_ID);

        let devotional = resolver
            .topic_override("is there a devotional guide", "")
            .expect("override");
        assert_eq!(devotional.id, VISION_POLICY_ID);

        // Both vocabularies present: dress code wins.
        let both = resolver
            .topic_override("devotional dress code question", "")
            .expect("override");
        assert_eq!(both.id, BEHAVIOR_POLICY_ID);

        assert!(resolver.topic_override("when do i arrive", "arrive by 8:15").is_none());
    }
}
