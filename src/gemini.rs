use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::ServiceCredential;
use crate::session::{Turn, TurnRole};

pub const MODEL: &str = "gemini-2.0-flash-001";
pub const LOCATION: &str = "global";

/// Shown in place of an answer when the model returns nothing usable.
pub const FALLBACK_ANSWER: &str = "Answer not found.";

const API_BASE: &str = "https://aiplatform.googleapis.com/v1";

// Sampling is fixed; the instruction is the only generation knob the UI exposes.
const TEMPERATURE: f64 = 0.2;
const TOP_P: f64 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    max_output_tokens: u32,
    response_modalities: Vec<&'static str>,
}

#[derive(Serialize)]
struct Tool {
    retrieval: Retrieval,
}

#[derive(Serialize)]
struct Retrieval {
    #[serde(rename = "vertexAiSearch")]
    vertex_ai_search: VertexAiSearch,
}

#[derive(Serialize)]
struct VertexAiSearch {
    datastore: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// What a completed call produced. `Empty` is the degraded-but-valid case
/// (no candidates, or a candidate without text); transport and HTTP
/// failures stay on the error path and never collapse into `Empty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Answer(String),
    Empty,
}

impl GenerationOutcome {
    pub fn into_text(self) -> String {
        match self {
            GenerationOutcome::Answer(text) => text,
            GenerationOutcome::Empty => FALLBACK_ANSWER.to_string(),
        }
    }
}

fn wire_role(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "model",
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    credential: ServiceCredential,
    datastore: String,
}

impl GeminiClient {
    pub fn new(credential: ServiceCredential, datastore: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            credential,
            datastore: datastore.into(),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            API_BASE, self.credential.project_id, LOCATION, MODEL
        )
    }

    /// Serialize the session into one request: prior turns in order, the
    /// new prompt as the final user block, instruction kept separate.
    fn build_request(&self, instruction: &str, history: &[Turn], prompt: &str) -> GenerateRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content {
                role: wire_role(turn.role),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        contents.push(Content {
            role: wire_role(TurnRole::User),
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        });

        GenerateRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: instruction.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_modalities: vec!["TEXT"],
            },
            tools: vec![Tool {
                retrieval: Retrieval {
                    vertex_ai_search: VertexAiSearch {
                        datastore: self.datastore.clone(),
                    },
                },
            }],
        }
    }

    pub async fn generate(
        &self,
        instruction: &str,
        history: &[Turn],
        prompt: &str,
    ) -> Result<GenerationOutcome> {
        let request = self.build_request(instruction, history, prompt);
        let url = self.request_url();

        debug!(model = MODEL, history_turns = history.len(), "sending generate request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.credential.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "generation request failed with status {}: {}",
                status,
                text
            ));
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(extract_outcome(parsed))
    }
}

/// First candidate, first part, its text. Anything missing along that
/// path is `Empty`, never an error.
fn extract_outcome(response: GenerateResponse) -> GenerationOutcome {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text);

    match text {
        Some(text) => GenerationOutcome::Answer(text),
        None => GenerationOutcome::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client(datastore: &str) -> GeminiClient {
        let credential = ServiceCredential::from_json(
            r#"{"project_id": "demo-project", "api_key": "test-key"}"#,
        )
        .unwrap();
        GeminiClient::new(credential, datastore)
    }

    #[test]
    fn history_then_prompt_in_order() {
        let client = test_client("ds");
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let request = client.build_request("be brief", &history, "bye");
        let value = serde_json::to_value(&request).unwrap();

        let contents = value["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "hi");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "hello");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "bye");
    }

    #[test]
    fn each_content_block_has_exactly_one_part() {
        let client = test_client("ds");
        let history = vec![Turn::user("a"), Turn::assistant("b")];
        let request = client.build_request("", &history, "c");
        let value = serde_json::to_value(&request).unwrap();

        for block in value["contents"].as_array().unwrap() {
            assert_eq!(block["parts"].as_array().unwrap().len(), 1);
        }
    }

    #[test]
    fn role_mapping_covers_both_roles() {
        assert_eq!(wire_role(TurnRole::User), "user");
        assert_eq!(wire_role(TurnRole::Assistant), "model");
    }

    #[test]
    fn instruction_rides_outside_the_contents() {
        let client = test_client("ds");
        let request = client.build_request("answer in French", &[], "hi");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            "answer in French"
        );
        // The instruction must not leak into the message list.
        assert_eq!(value["contents"].as_array().unwrap().len(), 1);
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn generation_config_is_fixed_across_calls() {
        let client = test_client("ds");
        let first = serde_json::to_value(client.build_request("a", &[], "one")).unwrap();
        let second = serde_json::to_value(
            client.build_request("b", &[Turn::user("x")], "two"),
        )
        .unwrap();

        assert_eq!(first["generationConfig"], second["generationConfig"]);
        assert_eq!(
            first["generationConfig"],
            json!({
                "temperature": 0.2,
                "topP": 0.95,
                "maxOutputTokens": 8192,
                "responseModalities": ["TEXT"],
            })
        );
    }

    #[test]
    fn datastore_flows_from_configuration() {
        let docs = test_client("projects/p/dataStores/docs");
        let faq = test_client("projects/p/dataStores/faq");

        let docs_value = serde_json::to_value(docs.build_request("", &[], "q")).unwrap();
        let faq_value = serde_json::to_value(faq.build_request("", &[], "q")).unwrap();

        let tools = docs_value["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(
            tools[0]["retrieval"]["vertexAiSearch"]["datastore"],
            "projects/p/dataStores/docs"
        );
        assert_eq!(
            faq_value["tools"][0]["retrieval"]["vertexAiSearch"]["datastore"],
            "projects/p/dataStores/faq"
        );
    }

    #[test]
    fn url_addresses_the_configured_project() {
        let client = test_client("ds");
        let url = client.request_url();
        assert!(url.contains("/projects/demo-project/locations/global/"));
        assert!(url.ends_with("/models/gemini-2.0-flash-001:generateContent"));
    }

    #[test]
    fn text_in_first_candidate_is_an_answer() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Paris"}]}}
            ]
        }))
        .unwrap();

        assert_eq!(
            extract_outcome(response),
            GenerationOutcome::Answer("Paris".to_string())
        );
    }

    #[test]
    fn missing_candidates_are_empty_not_an_error() {
        for body in [
            json!({}),
            json!({"candidates": []}),
            json!({"candidates": [{"finishReason": "SAFETY"}]}),
            json!({"candidates": [{"content": {"parts": []}}]}),
            json!({"candidates": [{"content": {"parts": [{"inlineData": {}}]}}]}),
        ] {
            let response: GenerateResponse = serde_json::from_value(body).unwrap();
            assert_eq!(extract_outcome(response), GenerationOutcome::Empty);
        }
    }

    #[test]
    fn empty_outcome_yields_the_fallback_text() {
        assert_eq!(GenerationOutcome::Empty.into_text(), FALLBACK_ANSWER);
        assert_eq!(
            GenerationOutcome::Answer("hi".to_string()).into_text(),
            "hi"
        );
    }
}
