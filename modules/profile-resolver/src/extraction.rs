//! Boundary to the structured-extraction service.
//!
//! The resolver hands the winning page to a [`StructuredExtractor`] exactly
//! once and returns whatever it produces. [`OpenAiExtractor`] is the concrete
//! adapter: chat completions with a strict JSON-schema response format.

use std::sync::LazyLock;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use regex::Regex;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{debug, info};

use crate::classify::{parse_web_url, profile_slug};
use crate::error::{ResolverError, Result};
use crate::types::Candidate;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Page text sent to the extractor is capped at this many bytes.
const MAX_PAGE_TEXT_BYTES: usize = 48_000;

static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_+%]+").expect("valid regex"));

/// Structured company attributes. Every field is optional: the service
/// returns null for anything the page does not state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompanyProfile {
    pub company_name: Option<String>,
    pub address_contact_information: Option<String>,
    pub company_size: Option<String>,
    pub type_of_industry: Option<String>,
    pub products_or_services: Option<String>,
    pub target_market: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    /// Page content, markdown when the HTML could be simplified.
    pub content: String,
    pub company_name: String,
    /// Company identifier taken from the URL, used to ignore other companies
    /// mentioned on the page.
    pub company_hint: Option<String>,
    pub source_url: String,
}

#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> anyhow::Result<CompanyProfile>;
}

/// Hand the selected candidate to `extractor`. Errors from the service come
/// back as `ResolverError::Extraction` with the cause attached.
pub async fn dispatch(
    extractor: &dyn StructuredExtractor,
    selected: &Candidate,
    company_name: &str,
) -> Result<CompanyProfile> {
    let html = selected.content()?;
    let request = ExtractionRequest {
        content: page_text(html, &selected.url),
        company_name: company_name.trim().to_string(),
        company_hint: company_hint(&selected.url),
        source_url: selected.url.clone(),
    };
    info!(
        url = %request.source_url,
        hint = request.company_hint.as_deref().unwrap_or("-"),
        chars = request.content.len(),
        "Dispatching extraction"
    );

    extractor
        .extract(&request)
        .await
        .map_err(ResolverError::Extraction)
}

/// Company identifier from a URL: the profile slug on known profile hosts,
/// otherwise the first label of the host without `www.`.
pub fn company_hint(url: &str) -> Option<String> {
    let raw = match profile_slug(url) {
        Some(slug) => slug,
        None => {
            let parsed = parse_web_url(url)?;
            let host = parsed.host_str()?.to_lowercase();
            let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
            host.split('.').next()?.to_string()
        }
    };
    let stem = raw.split('.').next().unwrap_or_default();
    let hint = SLUG_SEPARATORS.replace_all(stem, " ").trim().to_string();
    (!hint.is_empty()).then_some(hint)
}

/// Readable text for the extractor: Readability markdown when it yields
/// anything, the raw page otherwise. Truncated at a char boundary.
pub fn page_text(html: &str, url: &str) -> String {
    let markdown = html_to_markdown(html.as_bytes(), Some(url));
    let text = if markdown.trim().is_empty() {
        html
    } else {
        markdown.as_str()
    };
    truncate_to_char_boundary(text.trim(), MAX_PAGE_TEXT_BYTES).to_string()
}

fn html_to_markdown(html: &[u8], url: Option<&str>) -> String {
    let parsed_url = url.and_then(|u| url::Url::parse(u).ok());
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html,
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

// ---------------------------------------------------------------------------
// OpenAI adapter
// ---------------------------------------------------------------------------

pub struct OpenAiExtractor {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiExtractor {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_API_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, request: &ExtractionRequest) -> serde_json::Value {
        let target = request
            .company_hint
            .clone()
            .unwrap_or_else(|| request.source_url.clone());
        let system = format!(
            "You extract structured information about a company from raw page text.\n\
             Fill these fields: company_name, address_contact_information, company_size, \
             type_of_industry, products_or_services, target_market.\n\
             Only describe the company matching this hint (from the URL): '{target}' \
             (searched for as '{name}'). Ignore any other company on the page. \
             Use null for anything the text does not state.",
            name = request.company_name,
        );
        let user = format!(
            "Extract company information ONLY for the company matching '{target}'.\n\
             Source: {}\n\n{}",
            request.source_url, request.content
        );

        serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "company_profile",
                    "strict": true,
                    "schema": profile_schema(),
                },
            },
        })
    }
}

#[async_trait]
impl StructuredExtractor for OpenAiExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> anyhow::Result<CompanyProfile> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, source = %request.source_url, "OpenAI extraction request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .context("OpenAI request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error ({}): {}", status, error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response from OpenAI"))?;

        serde_json::from_str(strip_code_blocks(&content))
            .with_context(|| format!("OpenAI returned invalid profile JSON: {content}"))
    }
}

/// JSON schema for [`CompanyProfile`] in the shape strict structured output
/// requires: closed objects, every property required, no `$schema`.
pub fn profile_schema() -> serde_json::Value {
    let mut value = serde_json::to_value(schema_for!(CompanyProfile)).unwrap_or_default();
    close_object_schemas(&mut value);
    if let serde_json::Value::Object(map) = &mut value {
        map.remove("definitions");
        map.remove("$schema");
        map.remove("title");
    }
    value
}

fn close_object_schemas(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), serde_json::Value::Bool(false));
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let keys = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(keys));
                }
            }
            for (_, v) in map.iter_mut() {
                close_object_schemas(v);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                close_object_schemas(item);
            }
        }
        _ => {}
    }
}
