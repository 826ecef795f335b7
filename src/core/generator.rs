use crate::config::{LlmConfig, StyleConfig};
use crate::core::factcheck::{Claim, VerifiedFact};
use crate::error::{Error, Result};
use async_openai::{
    self,
    config::OpenAIConfig,
    types::responses::{
        CreateResponseArgs, EasyInputMessageArgs, InputItem, InputParam, OutputItem,
        OutputMessageContent, ReasoningArgs, ReasoningEffort, Role,
    },
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

const SERVICE: &str = "language model";

const MAX_CLAIMS: usize = 20;
const MIN_CLAIM_CONFIDENCE: f64 = 0.5;
const CLAIMS_INPUT_CHARS: usize = 15_000;
const STRUCTURE_INPUT_CHARS: usize = 20_000;
const STYLE_EXAMPLES_CHARS: usize = 3_000;

const SYSTEM_PROMPT: &str = "You are a meticulous analyst of DeFi and crypto YouTube content. \
You answer with a single JSON value and nothing else.";

const CLAIMS_PROMPT: &str = r#"Extract every factual statement from the transcript below that can be checked against public data.

For each statement return an object with:
- "claim": the statement, self-contained, in English
- "category": one of "price", "tvl", "percentage", "date", "protocol_info", "other"
- "entities": protocols, tokens or chains mentioned, as the names DefiLlama or CoinGecko would use
- "original_text": the fragment of the transcript it came from
- "confidence": 0 to 1, how sure you are that the statement is verifiable

Focus on numbers (TVL, prices, APY/APR), protocol facts, launch dates and usage statistics.
Ignore opinions, forecasts and promotional phrases without specifics.

Return a JSON array. If there is nothing to verify, return [].

<TRANSCRIPT>
{transcript}
</TRANSCRIPT>"#;

const STRUCTURE_PROMPT: &str = r#"Analyse how the following DeFi/crypto video is built.

Return a JSON object with:
- "hook": the attention-grabbing opening (quote or paraphrase)
- "intro": how the topic is introduced
- "main_points": 3 to 7 key points, in order
- "examples": examples, case studies and protocols used
- "cta": the call to action
- "outro": how the video closes
- "tone": the delivery tone
- "target_audience": who the video is for
- "estimated_duration_minutes": an integer

<TRANSCRIPT>
{transcript}
</TRANSCRIPT>"#;

const SCRIPT_PROMPT: &str = r#"Write an ORIGINAL YouTube script on the topic "{topic}".

Structure of the successful reference video:
{structure}

Verified facts (use only these, never invent numbers):
{facts}

Author style:
Author: {author}
Tone: {tone}
Language: {language}

Examples of the author's writing:
{examples}

Rules:
1. Do not copy the reference video; keep only its structure (hook, intro, main points, call to action, outro).
2. Write in the author's voice, in the language above.
3. Aim for about {minutes} minutes of speech.

Return a JSON object:
{"topic": "...", "hook": "...", "intro": "...", "sections": [{"title": "...", "content": "..."}], "cta": "...", "outro": "..."}"#;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VideoStructure {
    pub hook: String,
    pub intro: String,
    pub main_points: Vec<String>,
    pub examples: Vec<String>,
    pub cta: String,
    pub outro: String,
    pub tone: String,
    pub target_audience: String,
    #[serde(default = "default_duration")]
    pub estimated_duration_minutes: u32,
}

fn default_duration() -> u32 {
    10
}

impl VideoStructure {
    fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Hook: {}\n", self.hook));
        out.push_str(&format!("Intro: {}\n", self.intro));
        out.push_str("Main points:\n");
        for (i, point) in self.main_points.iter().enumerate() {
            out.push_str(&format!("  {}. {point}\n", i + 1));
        }
        if !self.examples.is_empty() {
            out.push_str(&format!("Examples: {}\n", self.examples.join(", ")));
        }
        out.push_str(&format!("Call to action: {}\n", self.cta));
        out.push_str(&format!("Outro: {}\n", self.outro));
        out.push_str(&format!("Tone: {}", self.tone));
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScriptSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneratedScript {
    pub topic: String,
    pub hook: String,
    pub intro: String,
    pub sections: Vec<ScriptSection>,
    pub cta: String,
    pub outro: String,
}

impl GeneratedScript {
    pub fn full_text(&self) -> String {
        let mut parts = vec![format!("# {}", self.topic)];
        if !self.hook.is_empty() {
            parts.push(format!("## Hook\n{}", self.hook));
        }
        if !self.intro.is_empty() {
            parts.push(format!("## Intro\n{}", self.intro));
        }
        for section in &self.sections {
            parts.push(format!("## {}\n{}", section.title, section.content));
        }
        if !self.cta.is_empty() {
            parts.push(format!("## Call to action\n{}", self.cta));
        }
        if !self.outro.is_empty() {
            parts.push(format!("## Outro\n{}", self.outro));
        }
        parts.join("\n\n")
    }

    pub fn word_count(&self) -> usize {
        self.full_text().split_whitespace().count()
    }
}

/// Everything the model needs to write a new script.
pub struct ScriptBrief<'a> {
    pub topic: &'a str,
    pub structure: &'a VideoStructure,
    pub facts: &'a [VerifiedFact],
    pub style: &'a StyleConfig,
    pub style_examples: &'a str,
}

#[async_trait]
pub trait ScriptModel: Send + Sync {
    async fn extract_claims(&self, transcript: &str) -> Result<Vec<Claim>>;

    async fn analyze_structure(&self, transcript: &str) -> Result<VideoStructure>;

    async fn write_script(&self, brief: &ScriptBrief<'_>) -> Result<GeneratedScript>;
}

#[derive(Clone)]
pub struct OpenAiModel {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    max_output_tokens: u32,
}

impl OpenAiModel {
    pub fn new(config: &LlmConfig, api_key: Option<&str>) -> Self {
        let client = match api_key {
            Some(key) => async_openai::Client::with_config(OpenAIConfig::new().with_api_key(key)),
            None => async_openai::Client::new(),
        };
        Self {
            client,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        self.request(prompt).await.map_err(|e| match e {
            Error::OpenAI(e) => Error::upstream(SERVICE, e),
            other => other,
        })
    }

    async fn request(&self, prompt: String) -> Result<String> {
        let request = CreateResponseArgs::default()
            .max_output_tokens(self.max_output_tokens)
            .model(self.model.as_str())
            .reasoning(
                ReasoningArgs::default()
                    .effort(ReasoningEffort::Medium)
                    .build()?,
            )
            .input(InputParam::Items(vec![
                InputItem::EasyMessage(
                    EasyInputMessageArgs::default()
                        .role(Role::System)
                        .content(SYSTEM_PROMPT)
                        .build()?,
                ),
                InputItem::EasyMessage(
                    EasyInputMessageArgs::default()
                        .role(Role::User)
                        .content(prompt)
                        .build()?,
                ),
            ]))
            .build()?;

        let response = self.client.responses().create(request).await?;

        let mut content = String::new();
        for output in response.output {
            if let OutputItem::Message(out) = output {
                for c in out.content {
                    match c {
                        OutputMessageContent::OutputText(text) => content.push_str(&text.text),
                        _ => {
                            tracing::warn!(content = ?c, "unexpected content type");
                            continue;
                        }
                    }
                }
            }
        }

        if content.trim().is_empty() {
            return Err(Error::upstream(SERVICE, "empty response"));
        }
        Ok(content)
    }

    async fn complete_json<T: DeserializeOwned>(&self, prompt: String) -> Result<T> {
        let raw = self.complete(prompt).await?;
        parse_json_reply(&raw)
    }
}

#[async_trait]
impl ScriptModel for OpenAiModel {
    #[tracing::instrument(name = "llm.extract_claims", skip_all)]
    async fn extract_claims(&self, transcript: &str) -> Result<Vec<Claim>> {
        let prompt = CLAIMS_PROMPT.replace("{transcript}", truncate_chars(transcript, CLAIMS_INPUT_CHARS));
        let claims: Vec<Claim> = self.complete_json(prompt).await?;
        let kept = keep_checkable(claims);
        tracing::info!(claims = kept.len(), "claims extracted");
        Ok(kept)
    }

    #[tracing::instrument(name = "llm.analyze_structure", skip_all)]
    async fn analyze_structure(&self, transcript: &str) -> Result<VideoStructure> {
        let prompt = STRUCTURE_PROMPT.replace(
            "{transcript}",
            truncate_chars(transcript, STRUCTURE_INPUT_CHARS),
        );
        let structure: VideoStructure = self.complete_json(prompt).await?;
        tracing::info!(
            main_points = structure.main_points.len(),
            examples = structure.examples.len(),
            "structure analyzed"
        );
        Ok(structure)
    }

    #[tracing::instrument(name = "llm.write_script", skip_all, fields(topic = brief.topic))]
    async fn write_script(&self, brief: &ScriptBrief<'_>) -> Result<GeneratedScript> {
        let mut script: GeneratedScript = self.complete_json(script_prompt(brief)).await?;
        if script.topic.trim().is_empty() {
            script.topic = brief.topic.to_string();
        }
        tracing::info!(words = script.word_count(), "script written");
        Ok(script)
    }
}

fn script_prompt(brief: &ScriptBrief<'_>) -> String {
    let facts = if brief.facts.is_empty() {
        "(none were verified; avoid specific figures)".to_string()
    } else {
        brief
            .facts
            .iter()
            .map(|fact| format!("- {}", fact.for_prompt()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let author = if brief.style.author_name.is_empty() {
        "the channel host"
    } else {
        brief.style.author_name.as_str()
    };

    SCRIPT_PROMPT
        .replace("{topic}", brief.topic)
        .replace("{structure}", &brief.structure.summary())
        .replace("{facts}", &facts)
        .replace("{author}", author)
        .replace("{tone}", &brief.style.tone)
        .replace("{language}", &brief.style.language)
        .replace(
            "{examples}",
            truncate_chars(brief.style_examples, STYLE_EXAMPLES_CHARS),
        )
        .replace(
            "{minutes}",
            &brief.structure.estimated_duration_minutes.to_string(),
        )
}

fn keep_checkable(claims: Vec<Claim>) -> Vec<Claim> {
    claims
        .into_iter()
        .filter(|c| !c.text.trim().is_empty() && c.confidence >= MIN_CLAIM_CONFIDENCE)
        .take(MAX_CLAIMS)
        .collect()
}

/// Cuts `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parses the JSON value in a model reply, tolerating code fences and prose around it.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let candidate = json_slice(reply);
    serde_json::from_str(candidate).map_err(|e| {
        let preview = truncate_chars(candidate, 200);
        Error::upstream(SERVICE, format!("unparseable reply ({e}): {preview}"))
    })
}

fn json_slice(reply: &str) -> &str {
    let mut text = reply.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        text = match after.find("```") {
            Some(end) => after[..end].trim(),
            None => after.trim(),
        };
    }

    let open = text.find(['[', '{']);
    let close = text.rfind([']', '}']);
    match (open, close) {
        (Some(open), Some(close)) if close > open => &text[open..=close],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::factcheck::ClaimCategory;

    #[test]
    fn parses_fenced_json() {
        let reply = "Here you go:\n```json\n[{\"claim\": \"Aave TVL is $10 billion\", \"category\": \"tvl\", \"entities\": [\"aave\"], \"confidence\": 0.9}]\n```\nDone.";
        let claims: Vec<Claim> = parse_json_reply(reply).unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].category, ClaimCategory::Tvl);
        assert_eq!(claims[0].entities, vec!["aave".to_string()]);
    }

    #[test]
    fn parses_object_with_surrounding_prose() {
        let reply = "Sure! {\"hook\": \"What if?\", \"main_points\": [\"a\", \"b\"]} Hope this helps.";
        let structure: VideoStructure = parse_json_reply(reply).unwrap();
        assert_eq!(structure.hook, "What if?");
        assert_eq!(structure.main_points.len(), 2);
        assert_eq!(structure.estimated_duration_minutes, 10);
    }

    #[test]
    fn garbage_reply_is_upstream_error() {
        let result: Result<VideoStructure> = parse_json_reply("I cannot help with that.");
        assert!(matches!(
            result,
            Err(Error::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn unknown_category_falls_back_to_other() {
        let claims: Vec<Claim> =
            parse_json_reply(r#"[{"claim": "x", "category": "vibes"}]"#).unwrap();
        assert_eq!(claims[0].category, ClaimCategory::Other);
        assert_eq!(claims[0].confidence, 0.5);
    }

    #[test]
    fn low_confidence_and_empty_claims_are_dropped() {
        let claims: Vec<Claim> = parse_json_reply(
            r#"[
                {"claim": "kept", "confidence": 0.8},
                {"claim": "dropped", "confidence": 0.2},
                {"claim": "   ", "confidence": 0.9}
            ]"#,
        )
        .unwrap();
        let kept = keep_checkable(claims);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "kept");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn script_text_lists_sections_in_order() {
        let script = GeneratedScript {
            topic: "Restaking risks".to_string(),
            hook: "Your yield has a catch.".to_string(),
            intro: String::new(),
            sections: vec![
                ScriptSection {
                    title: "What restaking is".to_string(),
                    content: "...".to_string(),
                },
                ScriptSection {
                    title: "Where it breaks".to_string(),
                    content: "...".to_string(),
                },
            ],
            cta: "Subscribe.".to_string(),
            outro: String::new(),
        };
        let text = script.full_text();
        assert!(text.starts_with("# Restaking risks"));
        assert!(!text.contains("## Intro"));
        let first = text.find("What restaking is").unwrap();
        let second = text.find("Where it breaks").unwrap();
        assert!(first < second);
        assert!(text.ends_with("## Call to action\nSubscribe."));
    }
}
