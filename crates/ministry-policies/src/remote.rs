/// Remote answer adapter.
///
/// Sends the structured policy prompt to the Gemini endpoint and turns the free-text
/// reply into an answer plus optional metadata. The model is asked to append a fenced
/// JSON block naming the primary and related policies; that block is best-effort —
/// malformed or missing metadata degrades to `None`, never to an error.
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use ministry_common::gemini::{GeminiClient, GeminiClientError};

use crate::model::PolicyRecord;
use crate::prompt::PromptBuilder;

/// Policy references extracted from the model's fenced JSON block. Free-text titles
/// or section headings — the resolver maps them onto canonical ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerMetadata {
    pub primary_policy: String,
    pub related_policies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteAnswer {
    pub text: String,
    pub metadata: Option<AnswerMetadata>,
}

pub struct RemoteAnswerAdapter {
    client: GeminiClient,
    prompt: PromptBuilder,
}

impl RemoteAnswerAdapter {
    pub fn new(client: GeminiClient, prompt: PromptBuilder) -> Self {
        Self { client, prompt }
    }

    /// Ask the remote endpoint to answer `query` over the full policy catalog.
    pub async fn ask(
        &self,
        query: &str,
        policies: &[PolicyRecord],
    ) -> Result<RemoteAnswer, GeminiClientError> {
        let prompt = self.prompt.build(query, policies);
        let raw = self.client.generate_content(&prompt).await?;
        Ok(parse_remote_answer(&raw))
    }
}

/// Strip control-token artifacts and extract the optional metadata block.
pub fn parse_remote_answer(raw: &str) -> RemoteAnswer {
    let cleaned = strip_artifacts(raw);
    let (text, metadata) = extract_metadata(&cleaned);
    RemoteAnswer { text, metadata }
}

fn strip_artifacts(raw: &str) -> String {
    let artifact_re =
        Regex::new(r"(</?\|assistant\|>)|(ASSISTANT:\s*)").expect("valid regex");
    artifact_re.replace_all(raw, "").trim().to_string()
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(rename = "primaryPolicy")]
    primary_policy: Option<String>,
    #[serde(rename = "relatedPolicies")]
    related_policies: Option<Vec<String>>,
}

/// Extract the fenced ```json block when present and parseable.
///
/// The block is removed from the visible answer only on a successful parse; on
/// malformed JSON the text is left untouched and metadata is absent.
fn extract_metadata(text: &str) -> (String, Option<AnswerMetadata>) {
    let block_re = Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex");

    let Some(caps) = block_re.captures(text) else {
        return (text.to_string(), None);
    };

    match serde_json::from_str::<RawMetadata>(&caps[1]) {
        Ok(raw) => {
            let metadata = AnswerMetadata {
                primary_policy: raw.primary_policy.unwrap_or_default(),
                related_policies: raw.related_policies.unwrap_or_default(),
            };
            let visible = block_re.replace(text, "").trim().to_string();
            (visible, Some(metadata))
        }
        Err(e) => {
            warn!(error = %e, "failed to parse answer metadata block");
            (text.to_string(), None)
        }
    }
}
