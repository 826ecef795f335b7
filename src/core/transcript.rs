use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use yt_transcript_rs::{FetchedTranscript, api::YouTubeTranscriptApi};

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,!?])").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub video_id: String,
    pub segments: Vec<Segment>,
}

impl Transcript {
    /// Segments joined into prose, with `[Music]`-style cues dropped.
    pub fn text(&self) -> String {
        let joined = self
            .segments
            .iter()
            .map(|segment| BRACKETED.replace_all(&segment.text, " "))
            .flat_map(|text| {
                text.split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .join(" ");

        SPACE_BEFORE_PUNCT.replace_all(&joined, "$1").trim().to_string()
    }

    /// One `[start - end] text` line per segment.
    pub fn timed_lines(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|segment| {
                let start = format_timestamp(segment.start);
                let end = format_timestamp(segment.start + segment.duration);
                format!("[{start} - {end}] {}", segment.text.trim())
            })
            .collect()
    }
}

impl From<FetchedTranscript> for Transcript {
    fn from(fetched: FetchedTranscript) -> Self {
        Self {
            video_id: fetched.video_id,
            segments: fetched
                .snippets
                .into_iter()
                .map(|snippet| Segment {
                    text: snippet.text,
                    start: snippet.start,
                    duration: snippet.duration,
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// `Ok(None)` when the video has no usable transcript.
    async fn fetch(&self, video_id: &str) -> Result<Option<Transcript>>;
}

#[derive(Clone)]
pub struct TranscriptService {
    api: YouTubeTranscriptApi,
    languages: Vec<String>,
}

impl TranscriptService {
    pub fn new(languages: Vec<String>) -> Result<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| Error::custom(format!("Failed to set up transcript client: {e}")))?;
        Ok(Self { api, languages })
    }

    pub async fn fetch_transcript(&self, video_id: &str) -> Result<FetchedTranscript> {
        let video_id = sanitize_video_id(video_id)?;
        let languages: Vec<&str> = self.languages.iter().map(String::as_str).collect();

        self.api
            .fetch_transcript(&video_id, &languages, false)
            .await
            .map_err(|e| Error::upstream("transcript", format!("Failed to fetch transcript: {e}")))
    }
}

#[async_trait]
impl TranscriptSource for TranscriptService {
    #[tracing::instrument(name = "transcript.fetch", skip(self))]
    async fn fetch(&self, video_id: &str) -> Result<Option<Transcript>> {
        let transcript = Transcript::from(self.fetch_transcript(video_id).await?);
        if transcript.segments.is_empty() {
            return Ok(None);
        }
        tracing::info!(video_id, segments = transcript.segments.len(), "transcript fetched");
        Ok(Some(transcript))
    }
}

fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1_000;
    let millis = total_millis % 1_000;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
    } else {
        format!("{minutes:02}:{secs:02}.{millis:03}")
    }
}

pub fn extract_video_id(url: &str) -> Option<String> {
    // Extract video ID from various YouTube URL formats
    let raw_id = if let Some(v_param) = url.split("v=").nth(1) {
        v_param.split('&').next().unwrap_or(v_param)
    } else if let Some(youtu_be) = url.split("youtu.be/").nth(1) {
        youtu_be.split('?').next().unwrap_or(youtu_be)
    } else {
        url
    };

    sanitize_video_id(raw_id).ok()
}

const MAX_VIDEO_ID_LEN: usize = 128;

/// Ensure a video identifier is safe for downstream use (API calls, storage keys).
/// Only ASCII alphanumeric characters plus `_` and `-` are allowed.
pub fn sanitize_video_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(Error::invalid("Video ID cannot be empty"));
    }

    if trimmed.len() > MAX_VIDEO_ID_LEN {
        return Err(Error::invalid("Video ID is unexpectedly long"));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(Error::invalid(
            "Video ID contains unsupported characters; expected only letters, numbers, '-' or '_'",
        ));
    }

    Ok(trimmed.to_string())
}
