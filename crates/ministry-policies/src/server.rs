/// MCP server implementation for the ministry policy assistant.
///
/// Exposes five tools:
/// - `ask_policies`: Answer a question from the policy set (remote or local pipeline)
/// - `search_policies`: Keyword-relevance search over policies
/// - `get_policy`: Look up a specific policy by id or title
/// - `list_categories`: List policy categories with counts
/// - `rate_limit_status`: Current rate-limit usage for a user
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};

use crate::engine::AnswerEngine;
use crate::lexical;
use crate::store::section_headings;
use ministry_common::mcp_api::{
    AskPoliciesParams, AskPoliciesResponse, CategoryInfo, CategoryListResponse, GetPolicyParams,
    PolicyDetailResponse, PolicySearchResult, RateLimitStatusParams, RateLimitStatusResponse,
    RelatedSectionInfo, SearchPoliciesParams, SearchPoliciesResponse,
};

const DEFAULT_USER: &str = "default";

#[derive(Clone)]
pub struct PolicyAssistantServer {
    engine: Arc<AnswerEngine>,
    tool_router: ToolRouter<PolicyAssistantServer>,
}

impl PolicyAssistantServer {
    pub fn new(engine: Arc<AnswerEngine>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl PolicyAssistantServer {
    #[tool(description = "Answer a question from the ministry policy documents. Returns the answer plus the primary and related policy ids for navigation.")]
    async fn ask_policies(
        &self,
        Parameters(params): Parameters<AskPoliciesParams>,
    ) -> Result<Json<AskPoliciesResponse>, String> {
        let user_id = params.user_id.unwrap_or_else(|| DEFAULT_USER.to_string());

        let envelope = self
            .engine
            .answer(&params.query, &user_id)
            .await
            .map_err(|e| e.to_string())?;

        Ok(Json(AskPoliciesResponse {
            answer: envelope.answer_text,
            primary_policy_id: envelope.primary_policy_id,
            related_policy_ids: envelope.related_policy_ids,
            related_sections: envelope
                .related_sections
                .into_iter()
                .map(|s| RelatedSectionInfo {
                    policy_id: s.policy_id,
                    heading: s.heading,
                })
                .collect(),
        }))
    }

    #[tool(description = "Search ministry policies by keyword relevance. Returns ranked results matching the query.")]
    async fn search_policies(
        &self,
        Parameters(params): Parameters<SearchPoliciesParams>,
    ) -> Result<Json<SearchPoliciesResponse>, String> {
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return Err("query must not be empty".to_string());
        }

        let limit = params.limit.unwrap_or(10).min(50) as usize;

        let results: Vec<PolicySearchResult> =
            lexical::rank(&query, self.engine.store().policies())
                .into_iter()
                .take(limit)
                .map(|c| PolicySearchResult {
                    id: c.policy.id.clone(),
                    title: c.policy.title.clone(),
                    category: c.policy.category.clone(),
                    score: c.score,
                    summary: c.policy.summary.clone(),
                })
                .collect();

        Ok(Json(SearchPoliciesResponse { results }))
    }

    #[tool(description = "Get the full content of a specific policy by id (e.g. 'safety-policies') or by title.")]
    async fn get_policy(
        &self,
        Parameters(params): Parameters<GetPolicyParams>,
    ) -> Result<Json<PolicyDetailResponse>, String> {
        let policy_id = params.policy_id.trim().to_string();
        if policy_id.is_empty() {
            return Err("policy_id must not be empty".to_string());
        }

        let store = self.engine.store();
        let found = store
            .get_ci(&policy_id)
            .or_else(|| store.find_by_title(&policy_id));
        let Some(policy) = found else {
            return Err(crate::error::AppError::NotFound(policy_id).to_string());
        };

        Ok(Json(PolicyDetailResponse {
            id: policy.id.clone(),
            title: policy.title.clone(),
            category: policy.category.clone(),
            summary: policy.summary.clone(),
            content: policy.content.clone(),
            tags: policy.tags.clone(),
            sections: section_headings(&policy.content),
        }))
    }

    #[tool(description = "List all policy categories with the number of policies in each.")]
    async fn list_categories(&self) -> Result<Json<CategoryListResponse>, String> {
        let categories = self
            .engine
            .store()
            .categories()
            .into_iter()
            .map(|c| CategoryInfo {
                name: c.name,
                policy_count: c.policy_count,
            })
            .collect();

        Ok(Json(CategoryListResponse { categories }))
    }

    #[tool(description = "Report rate-limit usage for a user: daily queries used, the daily limit, and how long until the next query is allowed.")]
    async fn rate_limit_status(
        &self,
        Parameters(params): Parameters<RateLimitStatusParams>,
    ) -> Result<Json<RateLimitStatusResponse>, String> {
        let user_id = params.user_id.unwrap_or_else(|| DEFAULT_USER.to_string());
        let status = self.engine.limiter().status(&user_id).await;

        Ok(Json(RateLimitStatusResponse {
            limited: status.limited,
            daily_used: status.daily_used,
            daily_limit: status.daily_limit,
            wait_ms: status.wait.as_millis() as u64,
        }))
    }
}

#[tool_handler]
impl ServerHandler for PolicyAssistantServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "ministry-policies".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Ministry policy assistant MCP server. Provides question answering and \
                 keyword search over the Kidz Ministry policy documents. Use ask_policies \
                 for natural language questions, search_policies for ranked keyword \
                 search, get_policy for full policy text by id, list_categories for \
                 browsing, and rate_limit_status to inspect the query quota."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PolicyAssistantServer;

    #[test]
    fn tools_publish_output_schemas() {
        let tools = PolicyAssistantServer::tool_router().list_all();
        for name in [
            "ask_policies",
            "search_policies",
            "get_policy",
            "list_categories",
            "rate_limit_status",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }
}
