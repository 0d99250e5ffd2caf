use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskPoliciesParams {
    /// The question to answer from the policy set.
    pub query: String,
    /// Identifier used for rate limiting (defaults to "default" for a single-user install).
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchPoliciesParams {
    /// The search query describing what you're looking for.
    pub query: String,
    /// Maximum number of results to return (default: 10, max: 50).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetPolicyParams {
    /// Stable policy ID such as "safety-policies", or a policy title.
    pub policy_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RateLimitStatusParams {
    /// Identifier used for rate limiting (defaults to "default").
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelatedSectionInfo {
    pub policy_id: String,
    pub heading: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskPoliciesResponse {
    pub answer: String,
    pub primary_policy_id: String,
    pub related_policy_ids: Vec<String>,
    pub related_sections: Vec<RelatedSectionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicySearchResult {
    pub id: String,
    pub title: String,
    pub category: String,
    pub score: f32,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchPoliciesResponse {
    pub results: Vec<PolicySearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyDetailResponse {
    pub id: String,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Section headings extracted from the policy content, in document order.
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryInfo {
    pub name: String,
    pub policy_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitStatusResponse {
    pub limited: bool,
    pub daily_used: u32,
    pub daily_limit: u32,
    /// Milliseconds until the next query is allowed (0 when not throttled).
    pub wait_ms: u64,
}
