//! YouTube Data API v3 client.
//!
//! Quota-friendly: reads the channel's uploads playlist (1 unit) and then the
//! statistics of those videos in one batched `videos.list` call (1 unit),
//! instead of `search.list` (100 units).

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

const SERVICE: &str = "youtube";
const MAX_PAGE_SIZE: u32 = 50;

/// A recently published video seen during one polling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCandidate {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub view_count: i64,
    pub published_at: DateTime<Utc>,
}

impl VideoCandidate {
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

#[async_trait]
pub trait VideoSource: Send + Sync {
    /// `None` when the channel is unknown or hides its subscriber count.
    async fn subscriber_count(&self, channel_id: &str) -> Result<Option<i64>>;

    async fn recent_videos(
        &self,
        channel_id: &str,
        published_after: DateTime<Utc>,
    ) -> Result<Vec<VideoCandidate>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
    video_published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    published_at: DateTime<Utc>,
    channel_id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

impl VideoItem {
    fn into_candidate(self) -> Option<VideoCandidate> {
        let snippet = self.snippet?;
        // Live premieres and private videos come back without a view count.
        let view_count = self
            .statistics
            .and_then(|s| s.view_count)
            .and_then(|v| v.parse::<i64>().ok())?;

        Some(VideoCandidate {
            video_id: self.id,
            channel_id: snippet.channel_id,
            title: snippet.title,
            view_count,
            published_at: snippet.published_at,
        })
    }
}

/// Every channel's uploads live in a playlist whose id swaps the `UC` prefix for `UU`.
pub fn uploads_playlist_id(channel_id: &str) -> Option<String> {
    channel_id
        .strip_prefix("UC")
        .filter(|rest| !rest.is_empty())
        .map(|rest| format!("UU{rest}"))
}

#[derive(Clone)]
pub struct YouTubeClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_results: u32,
}

impl YouTubeClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            max_results: MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, MAX_PAGE_SIZE);
        self
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .json::<T>()
                    .await
                    .map_err(|e| transport_error(endpoint, e))?;
                Ok(Some(body))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::upstream(
                    SERVICE,
                    format!("{endpoint} returned {status}: {text}"),
                ))
            }
        }
    }
}

/// The request URL carries the API key, so it is dropped from the error.
fn transport_error(endpoint: &str, e: reqwest::Error) -> Error {
    Error::upstream(SERVICE, format!("{endpoint}: {}", e.without_url()))
}

#[async_trait]
impl VideoSource for YouTubeClient {
    #[tracing::instrument(name = "youtube.subscriber_count", skip(self))]
    async fn subscriber_count(&self, channel_id: &str) -> Result<Option<i64>> {
        let response: Option<ListResponse<ChannelItem>> = self
            .get("channels", &[("part", "statistics"), ("id", channel_id)])
            .await?;

        let Some(stats) = response
            .and_then(|r| r.items.into_iter().next())
            .and_then(|item| item.statistics)
        else {
            return Ok(None);
        };

        if stats.hidden_subscriber_count {
            return Ok(None);
        }
        Ok(stats.subscriber_count.and_then(|s| s.parse().ok()))
    }

    #[tracing::instrument(name = "youtube.recent_videos", skip(self))]
    async fn recent_videos(
        &self,
        channel_id: &str,
        published_after: DateTime<Utc>,
    ) -> Result<Vec<VideoCandidate>> {
        let playlist_id = uploads_playlist_id(channel_id).ok_or_else(|| {
            Error::invalid(format!("{channel_id} is not a UC... channel id"))
        })?;
        let max_results = self.max_results.to_string();

        let playlist: Option<ListResponse<PlaylistItem>> = self
            .get(
                "playlistItems",
                &[
                    ("part", "contentDetails"),
                    ("playlistId", playlist_id.as_str()),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        let video_ids: Vec<String> = playlist
            .map(|p| p.items)
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.content_details)
            .filter(|details| {
                details
                    .video_published_at
                    .is_none_or(|published| published >= published_after)
            })
            .map(|details| details.video_id)
            .collect();

        if video_ids.is_empty() {
            debug!(channel_id, "no recent uploads");
            return Ok(Vec::new());
        }

        let ids = video_ids.join(",");
        let videos: Option<ListResponse<VideoItem>> = self
            .get("videos", &[("part", "snippet,statistics"), ("id", ids.as_str())])
            .await?;

        let candidates: Vec<VideoCandidate> = videos
            .map(|v| v.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(VideoItem::into_candidate)
            .filter(|c| c.published_at >= published_after)
            .collect();

        info!(channel_id, count = candidates.len(), "fetched recent videos");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_playlist_swaps_prefix() {
        assert_eq!(
            uploads_playlist_id("UCabc123").as_deref(),
            Some("UUabc123")
        );
        assert_eq!(uploads_playlist_id("UC"), None);
        assert_eq!(uploads_playlist_id("@handle"), None);
    }

    #[tokio::test]
    async fn transport_errors_do_not_carry_the_api_key() {
        // Nothing listens on port 1, so the request fails before any response.
        let client = YouTubeClient::new(Client::new(), "http://127.0.0.1:1", "SECRET-KEY-123");
        let err = client
            .recent_videos("UCabc", Utc::now())
            .await
            .expect_err("request cannot succeed");

        let message = err.to_string();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
        assert!(!message.contains("SECRET-KEY-123"), "{message}");
        assert!(message.contains("playlistItems"), "{message}");
    }

    #[test]
    fn video_items_become_candidates() {
        let body = r#"{
            "items": [
                {
                    "id": "vid1",
                    "snippet": {
                        "publishedAt": "2026-10-15T12:00:00Z",
                        "channelId": "UCabc",
                        "title": "Aave v4 explained"
                    },
                    "statistics": { "viewCount": "15230", "likeCount": "800" }
                },
                {
                    "id": "live1",
                    "snippet": {
                        "publishedAt": "2026-10-16T12:00:00Z",
                        "channelId": "UCabc",
                        "title": "Upcoming stream"
                    },
                    "statistics": {}
                }
            ]
        }"#;

        let response: ListResponse<VideoItem> = serde_json::from_str(body).unwrap();
        let candidates: Vec<_> = response
            .items
            .into_iter()
            .filter_map(VideoItem::into_candidate)
            .collect();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].video_id, "vid1");
        assert_eq!(candidates[0].view_count, 15_230);
        assert_eq!(candidates[0].url(), "https://www.youtube.com/watch?v=vid1");
    }

    #[test]
    fn channel_statistics_parse() {
        let body = r#"{
            "items": [{ "statistics": { "subscriberCount": "48000", "hiddenSubscriberCount": false } }]
        }"#;
        let response: ListResponse<ChannelItem> = serde_json::from_str(body).unwrap();
        let stats = response.items[0].statistics.as_ref().unwrap();
        assert_eq!(stats.subscriber_count.as_deref(), Some("48000"));
        assert!(!stats.hidden_subscriber_count);

        let empty: ListResponse<ChannelItem> = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }
}
