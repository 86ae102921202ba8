//! OpenAI-compatible HTTP backend for the [`Brain`] contract. Works against
//! any endpoint speaking the chat-completions and embeddings wire format.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract;
use crate::traits::*;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiBrain {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
}

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiBrain {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
            model: model.to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, prompt: String, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        debug!(model = %self.model, "Brain chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Brain API error ({}): {}", status, error_text));
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No content in brain response"))
    }
}

#[async_trait]
impl Brain for OpenAiBrain {
    async fn rank(
        &self,
        items: &[RankCandidate],
        interests: &HashMap<String, f32>,
    ) -> Result<Vec<f32>> {
        let interest_str = interests
            .iter()
            .map(|(k, v)| format!("{k}: {v:.0}"))
            .collect::<Vec<_>>()
            .join(", ");
        let listing = items
            .iter()
            .enumerate()
            .map(|(i, it)| format!("{i}. {}", it.title))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Task: News Triage Score.\n\
             Rate these {} items against user interests: {}.\n\n\
             Return ONLY a JSON array of integers (0-100), one per item, in order.\n\
             Example: [90, 10, 50]\n\n\
             ITEMS:\n{}",
            items.len(),
            interest_str,
            listing
        );

        let text = self.chat(prompt, 0.2).await?;
        let scores = extract::number_array(&text)
            .ok_or_else(|| anyhow!("No numeric array in rank response"))?;
        if scores.len() != items.len() {
            return Err(anyhow!(
                "Rank response length mismatch: expected {}, got {}",
                items.len(),
                scores.len()
            ));
        }
        Ok(scores)
    }

    async fn normalize(&self, text: &str) -> Result<Normalization> {
        let truncated: String = text.chars().take(15_000).collect();
        let prompt = format!(
            "Task: Entity & Summary Extraction.\n\
             Return a FLAT JSON object:\n\
             {{\"topics\": [\"TECH\"|\"POLITICS\"|\"PHILOSOPHY\"|\"MUSIC\"|\"COOKING\"|\"GENERAL\"],\n\
              \"entities\": [\"Organization Names\"],\n\
              \"summary\": \"2-3 sentence editorial summary\"}}\n\n\
             TEXT: {truncated}"
        );

        let response = self.chat(prompt, 0.2).await?;
        let json = extract::json_object(&response)
            .ok_or_else(|| anyhow!("No JSON object in normalize response"))?;
        Ok(serde_json::from_str(json)?)
    }

    async fn scrutinize(&self, items: &[SynthesisItem]) -> Result<ScrutinyReport> {
        let listing = items
            .iter()
            .map(|it| format!("[{}] {}: {}", it.source, it.title, it.summary))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Task: Cross-reference these {} reports of the same story for factual conflicts.\n\
             Return a FLAT JSON object:\n\
             {{\"integrity_score\": 0-100, \"is_controversial\": bool, \"conflict_points\": [\"...\"]}}\n\n\
             REPORTS:\n{listing}",
            items.len()
        );

        let response = self.chat(prompt, 0.2).await?;
        let json = extract::json_object(&response)
            .ok_or_else(|| anyhow!("No JSON object in scrutiny response"))?;
        Ok(serde_json::from_str(json)?)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: text.to_string(),
        };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Brain embedding error ({}): {}", status, error_text));
        }

        let embed: EmbeddingResponse = response.json().await?;
        embed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("No embedding in response"))
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis> {
        let format_instruction = match request.detail {
            DetailLevel::Detailed => {
                "\"narrative\": \"A deep-dive 3-paragraph executive analysis.\","
            }
            DetailLevel::Brief => "\"narrative\": \"3 concise bullet points with the key facts.\",",
        };
        let listing = request
            .items
            .iter()
            .map(|it| format!("[{}] {}: {}", it.source, it.title, it.summary))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Persona: {}\n\
             Task: Synthesize these {} news signals into an executive briefing.\n\n\
             Return a FLAT JSON object:\n\
             {{\"title\": \"A Compelling Editorial Headline\",\n\
              {format_instruction}\n\
              \"whyItMatters\": \"Strategic/future impact statement\"}}\n\n\
             RULES:\n\
             1. \"whyItMatters\" MUST be generated. Never return \"N/A\".\n\
             2. No fluff.\n\n\
             INPUTS:\n{listing}",
            request.persona,
            request.items.len()
        );

        let response = self.chat(prompt, 0.7).await?;
        let json = extract::json_object(&response)
            .ok_or_else(|| anyhow!("No JSON object in synthesis response"))?;
        Ok(serde_json::from_str(json)?)
    }

    async fn synthesize_global(
        &self,
        clusters: &[ClusterDigest],
        persona: &str,
    ) -> Result<GlobalSummary> {
        let listing = clusters
            .iter()
            .map(|c| format!("[{}] {}: {}", c.category, c.title, c.narrative))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Persona: {persona}\n\
             Task: Write the overarching daily brief across today's top {} stories.\n\
             Return a FLAT JSON object:\n\
             {{\"headline\": \"...\", \"content\": \"Multi-paragraph narrative brief\"}}\n\n\
             STORIES:\n{listing}",
            clusters.len()
        );

        let response = self.chat(prompt, 0.7).await?;
        let json = extract::json_object(&response)
            .ok_or_else(|| anyhow!("No JSON object in global synthesis response"))?;
        Ok(serde_json::from_str(json)?)
    }
}
