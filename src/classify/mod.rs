//! Classification oracle: an LLM separates distinctive resources from
//! generic components.

use std::fmt::Write as _;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ClassifyError;
use crate::profile::ResourceProfile;

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// References of each kind listed in the prompt.
pub const PROMPT_LIST_LIMIT: usize = 50;
/// Sampling temperature used for classification.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Completion budget for one classification.
pub const DEFAULT_MAX_TOKENS: usize = 2000;
/// Timeout applied to every provider request.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a web application fingerprinting expert. \
Remove generic components and anything that is not a fingerprint from a site's resources, \
keeping only features that can find sites running the same application through FOFA style \
search engines. Reply with strict JSON only and never add extra text.";

const GENERIC_FAMILIES: &[&str] = &[
    "CDN resources (jsdelivr, cdnjs, unpkg, cloudflare, etc.)",
    "Public libraries (jquery, bootstrap, vue, react, angular, etc.)",
    "Generic advertising and analytics code (google-analytics, baidu tongji, etc.)",
    "Social media widgets (facebook, twitter, etc.)",
];

/// Fingerprints the oracle kept for one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// Favicon hash carried over from the profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_hash: Option<String>,
    /// Distinctive resource paths or URLs, in oracle order.
    pub fingerprints: Vec<String>,
}

/// Turns a profile into a classification.
#[allow(async_fn_in_trait)]
pub trait Classifier {
    /// Classifies the resources of `profile`.
    async fn classify(
        &self,
        profile: &ResourceProfile,
    ) -> Result<ClassificationResult, ClassifyError>;
}

/// Trait implemented by concrete LLM providers.
#[allow(async_fn_in_trait)]
pub trait LlmProvider {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Sends one prompt and returns the reply text.
    async fn answer(&self, request: &ProviderRequest<'_>) -> Result<String, ClassifyError>;
}

/// Request envelope shared by the various providers.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    /// System instructions.
    pub system: &'a str,
    /// User prompt.
    pub prompt: &'a str,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion budget.
    pub max_tokens: usize,
}

/// Supported provider APIs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// OpenAI compatible chat completions (DeepSeek by default).
    #[value(name = "openai", alias = "deepseek")]
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
}

/// Provider chosen at runtime.
pub enum AnyProvider {
    /// OpenAI compatible provider.
    OpenAi(OpenAiProvider),
    /// Anthropic provider.
    Anthropic(AnthropicProvider),
}

impl AnyProvider {
    /// Builds the provider for `kind`, falling back to its default base URL
    /// and model.
    pub fn build(
        kind: ProviderKind,
        api_key: String,
        base_url: Option<&str>,
        model: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ClassifyError> {
        Ok(match kind {
            ProviderKind::OpenAi => Self::OpenAi(OpenAiProvider::new(
                api_key,
                base_url.unwrap_or(openai::DEFAULT_BASE_URL),
                model.unwrap_or(openai::DEFAULT_MODEL),
                timeout,
            )?),
            ProviderKind::Anthropic => Self::Anthropic(AnthropicProvider::new(
                api_key,
                base_url.unwrap_or(anthropic::DEFAULT_BASE_URL),
                model.unwrap_or(anthropic::DEFAULT_MODEL),
                timeout,
            )?),
        })
    }
}

impl LlmProvider for AnyProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(provider) => provider.name(),
            Self::Anthropic(provider) => provider.name(),
        }
    }

    async fn answer(&self, request: &ProviderRequest<'_>) -> Result<String, ClassifyError> {
        match self {
            Self::OpenAi(provider) => provider.answer(request).await,
            Self::Anthropic(provider) => provider.answer(request).await,
        }
    }
}

/// Classifier that prompts an LLM provider.
pub struct LlmClassifier<P> {
    provider: P,
    temperature: f32,
    max_tokens: usize,
}

impl<P: LlmProvider> LlmClassifier<P> {
    /// Wraps `provider` with the default sampling settings.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Overrides the completion budget.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl<P: LlmProvider> Classifier for LlmClassifier<P> {
    async fn classify(
        &self,
        profile: &ResourceProfile,
    ) -> Result<ClassificationResult, ClassifyError> {
        let prompt = build_prompt(profile);
        let request = ProviderRequest {
            system: SYSTEM_PROMPT,
            prompt: &prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        info!(site = %profile.site_url, provider = self.provider.name(), "classifying resources");
        let reply = self.provider.answer(&request).await?;
        debug!(site = %profile.site_url, reply = %reply, "classification reply");
        let fingerprints = parse_reply(&reply)?;
        info!(
            site = %profile.site_url,
            fingerprints = fingerprints.len(),
            "classification complete"
        );
        Ok(ClassificationResult {
            favicon_hash: profile.favicon_hash.clone(),
            fingerprints,
        })
    }
}

/// Renders the classification prompt for `profile`.
pub fn build_prompt(profile: &ResourceProfile) -> String {
    let favicon = profile.favicon_hash.as_deref().unwrap_or("not found");
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Analyze the resources of the site below, exclude generic components, and return only \
         features usable for FOFA searches.\n"
    );
    let _ = writeln!(prompt, "**Target site:** {}\n", profile.site_url);
    let _ = writeln!(prompt, "**Favicon hash (mmh3):** {favicon}\n");
    let _ = writeln!(prompt, "**All src resources ({} total):**", profile.srcs.len());
    let _ = writeln!(prompt, "{}\n", format_list(&profile.srcs));
    let _ = writeln!(prompt, "**All href resources ({} total):**", profile.hrefs.len());
    let _ = writeln!(prompt, "{}\n", format_list(&profile.hrefs));
    let _ = writeln!(prompt, "---\n");
    let _ = writeln!(prompt, "**Task: exclude every generic component.** These include:");
    for family in GENERIC_FAMILIES {
        let _ = writeln!(prompt, "- {family}");
    }
    let _ = writeln!(
        prompt,
        "\n**Output:** reply with exactly this JSON shape and nothing else:\n"
    );
    let _ = writeln!(prompt, "```json");
    let _ = writeln!(prompt, "{{");
    let _ = writeln!(
        prompt,
        "  \"favicon_hash\": \"{}\",",
        profile.favicon_hash.as_deref().unwrap_or_default()
    );
    let _ = writeln!(
        prompt,
        "  \"fingerprints\": [\"/path/to/custom/file.js\", \"/unique/api/endpoint\"]"
    );
    let _ = writeln!(prompt, "}}");
    let _ = writeln!(prompt, "```\n");
    let _ = writeln!(prompt, "Rules:");
    let _ = writeln!(prompt, "1. Output JSON only, without explanations.");
    let _ = writeln!(
        prompt,
        "2. `fingerprints` holds only non-generic URL paths or full URLs."
    );
    let _ = writeln!(
        prompt,
        "3. If everything is generic, `fingerprints` is an empty array."
    );
    let _ = write!(prompt, "4. Keep the original favicon_hash value.");
    prompt
}

fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        return "  (none)".to_string();
    }
    let mut lines: Vec<String> = items
        .iter()
        .take(PROMPT_LIST_LIMIT)
        .enumerate()
        .map(|(idx, item)| format!("  {}. {item}", idx + 1))
        .collect();
    if items.len() > PROMPT_LIST_LIMIT {
        lines.push(format!("  ... {} more", items.len() - PROMPT_LIST_LIMIT));
    }
    lines.join("\n")
}

#[derive(Debug, Deserialize)]
struct FingerprintReply {
    #[serde(default)]
    fingerprints: Vec<String>,
}

/// Extracts the fingerprint list from a reply, preferring a fenced
/// ```` ```json ```` block over the raw text.
pub fn parse_reply(reply: &str) -> Result<Vec<String>, ClassifyError> {
    let payload = fenced_json(reply).unwrap_or(reply).trim();
    let parsed: FingerprintReply =
        serde_json::from_str(payload).map_err(ClassifyError::Malformed)?;
    let mut fingerprints: Vec<String> = Vec::with_capacity(parsed.fingerprints.len());
    for value in parsed.fingerprints {
        let value = value.trim();
        if !value.is_empty() && !fingerprints.iter().any(|seen| seen == value) {
            fingerprints.push(value.to_string());
        }
    }
    Ok(fingerprints)
}

fn fenced_json(reply: &str) -> Option<&str> {
    let start = reply.find("```json")? + "```json".len();
    let rest = &reply[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}
