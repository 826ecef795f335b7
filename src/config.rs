use crate::core::virality::ViralityThresholds;
use crate::error::{Error, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "vidwatch.toml";

const DEFAULT_STYLE_NOTE: &str =
    "No style examples were provided. Write in a natural, conversational voice.";

/// TOML-backed configuration, loaded once at start and never mutated.
/// Secrets (API keys, bot token) stay in the environment, see [`Secrets`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub channels: Vec<ChannelConfig>,
    pub thresholds: ViralityThresholds,
    pub monitoring: MonitoringConfig,
    pub schedule: ScheduleConfig,
    pub llm: LlmConfig,
    pub style: StyleConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
    /// Last known subscriber count, used when the live lookup fails.
    #[serde(default)]
    pub subscribers: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitoringConfig {
    pub max_video_age_days: i64,
    pub max_videos_per_channel: u32,
    pub min_transcript_chars: usize,
    pub transcript_languages: Vec<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_video_age_days: 7,
            max_videos_per_channel: 50,
            min_transcript_chars: 100,
            transcript_languages: vec!["en".to_string(), "ru".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// UTC wall-clock time of the daily run, `HH:MM`.
    pub daily_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: "08:00".to_string(),
        }
    }
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M").map_err(|e| {
            Error::Config(format!(
                "schedule.daily_at must be HH:MM, got {:?}: {e}",
                self.daily_at
            ))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub model: String,
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-5.2".to_string(),
            max_output_tokens: 16_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    pub author_name: String,
    pub tone: String,
    pub language: String,
    pub examples_file: PathBuf,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            author_name: String::new(),
            tone: "conversational but expert".to_string(),
            language: "en".to_string(),
            examples_file: PathBuf::from("prompts/style_examples.md"),
        }
    }
}

impl StyleConfig {
    /// Reads the style examples file, falling back to a neutral note.
    pub fn load_examples(&self) -> String {
        match std::fs::read_to_string(&self.examples_file) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => DEFAULT_STYLE_NOTE.to_string(),
            Err(e) => {
                tracing::warn!(
                    path = %self.examples_file.display(),
                    error = %e,
                    "could not load style examples"
                );
                DEFAULT_STYLE_NOTE.to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/vidwatch.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub youtube_base_url: String,
    pub defillama_base_url: String,
    pub defillama_yields_url: String,
    pub coingecko_base_url: String,
    pub telegram_base_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            youtube_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            defillama_base_url: "https://api.llama.fi".to_string(),
            defillama_yields_url: "https://yields.llama.fi".to_string(),
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            telegram_base_url: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub send_summary: bool,
    /// List the new viral videos of a run before their scripts are written.
    pub send_viral_list: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            send_summary: true,
            send_viral_list: true,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.schedule.daily_time()?;
        if self.monitoring.max_video_age_days <= 0 {
            return Err(Error::invalid("monitoring.max_video_age_days must be positive"));
        }
        for channel in &self.channels {
            if channel.id.trim().is_empty() {
                return Err(Error::invalid(format!(
                    "channel {:?} has an empty id",
                    channel.name
                )));
            }
            if let Some(subs) = channel.subscribers
                && subs < 0
            {
                return Err(Error::invalid(format!(
                    "channel {} has a negative subscriber count",
                    channel.id
                )));
            }
        }
        Ok(())
    }
}

/// Credentials read from the environment (and `.env`).
#[derive(Clone)]
pub struct Secrets {
    pub youtube_api_key: String,
    pub openai_api_key: Option<String>,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            youtube_api_key: required_env("YOUTUBE_API_KEY")?,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|v| !v.is_empty()),
            telegram_bot_token: required_env("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: required_env("TELEGRAM_CHAT_ID")?,
        })
    }
}

fn required_env(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::Config(format!("environment variable {name} is not set"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::parse("").expect("defaults are valid");
        assert!(config.channels.is_empty());
        assert_eq!(config.thresholds, ViralityThresholds::default());
        assert_eq!(config.monitoring.max_video_age_days, 7);
        assert_eq!(config.schedule.daily_at, "08:00");
        assert!(config.notify.send_summary);
    }

    #[test]
    fn parses_channels_and_overrides() {
        let config = AppConfig::parse(
            r#"
[[channels]]
id = "UCabc"
name = "DeFi Daily"
subscribers = 12000

[[channels]]
id = "UCdef"
name = "Yield Hunters"

[thresholds]
large_ratio = 0.25

[schedule]
daily_at = "06:30"
"#,
        )
        .expect("valid config");

        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].subscribers, Some(12_000));
        assert_eq!(config.channels[1].subscribers, None);
        assert_eq!(config.thresholds.large_ratio, 0.25);
        assert_eq!(config.thresholds.small_ratio, 1.5);
        assert_eq!(
            config.schedule.daily_time().unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
    }

    #[test]
    fn example_config_is_valid() {
        let config = AppConfig::parse(include_str!("../vidwatch.example.toml"))
            .expect("example config parses");
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.http.telegram_base_url, "https://api.telegram.org");
    }

    #[test]
    fn rejects_bad_thresholds() {
        let result = AppConfig::parse(
            r#"
[thresholds]
small_max_subscribers = 50000
medium_max_subscribers = 5000
"#,
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_bad_schedule() {
        let result = AppConfig::parse(
            r#"
[schedule]
daily_at = "8 o'clock"
"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(AppConfig::parse("[monitoring]\ncheck_every = 3\n").is_err());
    }

    #[test]
    fn missing_style_file_falls_back() {
        let style = StyleConfig {
            examples_file: PathBuf::from("definitely/not/here.md"),
            ..StyleConfig::default()
        };
        assert_eq!(style.load_examples(), DEFAULT_STYLE_NOTE);
    }
}
