use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "telegram";

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers an HTML-formatted message to the configured recipient.
    async fn deliver(&self, html: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    #[tracing::instrument(name = "telegram.send_message", skip_all, fields(chat_id = %self.chat_id, chars = text.chars().count()))]
    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        // The URL carries the bot token, so errors are reported without it.
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(SERVICE, e.without_url()))?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, e.without_url()))?;

        if !status.is_success() || !body.ok {
            return Err(Error::upstream(
                SERVICE,
                format!(
                    "sendMessage returned {status}: {}",
                    body.description.unwrap_or_default()
                ),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, html: &str) -> Result<()> {
        for chunk in split_message(html, MAX_MESSAGE_CHARS) {
            self.send_message(&chunk).await?;
        }
        Ok(())
    }
}

/// Longest escape the HTML renderer emits is well under this (`&quot;`).
const MAX_ENTITY_CHARS: usize = 10;

/// Length of `piece` without a trailing, unterminated `&...` entity.
fn entity_safe_len(piece: &[char]) -> usize {
    match piece.iter().rposition(|c| *c == '&') {
        Some(amp)
            if amp > 0
                && piece.len() - amp <= MAX_ENTITY_CHARS
                && !piece[amp..].contains(&';') =>
        {
            amp
        }
        _ => piece.len(),
    }
}

/// Splits text into chunks of at most `max_chars`, preferring line breaks.
/// Lines longer than the limit are cut on character boundaries, never inside
/// an HTML entity.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            let mut start = 0;
            while chars.len() - start > max_chars {
                let end = start + entity_safe_len(&chars[start..start + max_chars]);
                chunks.push(chars[start..end].iter().collect());
                start = end;
            }
            current = chars[start..].iter().collect();
            current_len = chars.len() - start;
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
