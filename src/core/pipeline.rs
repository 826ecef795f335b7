use crate::config::{AppConfig, MonitoringConfig, StyleConfig};
use crate::core::channel::{Channel, ChannelRegistry};
use crate::core::factcheck::{FactVerifier, FinancialData, only_verified};
use crate::core::generator::{ScriptBrief, ScriptModel};
use crate::core::notify::Notifier;
use crate::core::report;
use crate::core::storage::{Outcome, ProcessedVideoRecord, Store};
use crate::core::transcript::TranscriptSource;
use crate::core::virality::{ViralityClassifier, ViralityVerdict};
use crate::core::youtube::{VideoCandidate, VideoSource};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// External services the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub videos: Arc<dyn VideoSource>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub model: Arc<dyn ScriptModel>,
    pub market: Arc<dyn FinancialData>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn Store>,
}

/// Counts for one run. Only counts; error text stays in the store and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub channels_checked: usize,
    pub channels_failed: usize,
    pub candidates: usize,
    pub viral: usize,
    pub already_processed: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// A viral video that has not been processed before.
struct Found {
    channel: Channel,
    video: VideoCandidate,
    verdict: ViralityVerdict,
}

enum Produced {
    Delivered,
    TooShort(usize),
}

pub struct Pipeline {
    registry: ChannelRegistry,
    classifier: ViralityClassifier,
    monitoring: MonitoringConfig,
    style: StyleConfig,
    style_examples: String,
    send_summary: bool,
    send_viral_list: bool,
    videos: Arc<dyn VideoSource>,
    transcripts: Arc<dyn TranscriptSource>,
    model: Arc<dyn ScriptModel>,
    verifier: FactVerifier,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn Store>,
}

impl Pipeline {
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Self {
        Self {
            registry: ChannelRegistry::from_config(&config.channels),
            classifier: ViralityClassifier::new(config.thresholds.clone()),
            monitoring: config.monitoring.clone(),
            style: config.style.clone(),
            style_examples: config.style.load_examples(),
            send_summary: config.notify.send_summary,
            send_viral_list: config.notify.send_viral_list,
            videos: collaborators.videos,
            transcripts: collaborators.transcripts,
            model: collaborators.model,
            verifier: FactVerifier::new(collaborators.market),
            notifier: collaborators.notifier,
            store: collaborators.store,
        }
    }

    pub async fn run_once(&self) -> RunSummary {
        self.run_at(Utc::now()).await
    }

    #[tracing::instrument(name = "pipeline.run", skip(self), fields(channels = self.registry.len()))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();
        let published_after = now - Duration::days(self.monitoring.max_video_age_days);
        if self.registry.is_empty() {
            tracing::warn!("channel registry is empty, nothing to check");
        }

        let mut found = Vec::new();
        for channel in self.registry.channels() {
            match self.check_channel(channel, published_after, &mut summary).await {
                Ok(new) => {
                    summary.channels_checked += 1;
                    found.extend(new);
                }
                Err(e) => {
                    summary.channels_failed += 1;
                    tracing::error!(channel_id = %channel.id, error = %e, "channel check failed");
                }
            }
        }

        if self.send_viral_list && !found.is_empty() {
            let listed: Vec<_> = found.iter().map(|f| (&f.video, &f.verdict)).collect();
            if let Err(e) = self.notifier.deliver(&report::viral_list(&listed)).await {
                tracing::warn!(error = %e, "could not deliver viral list");
            }
        }

        for f in &found {
            let outcome = self.process_video(&f.channel, &f.video, &f.verdict).await;
            summary.count(outcome);
        }

        tracing::info!(?summary, "run finished");

        if self.send_summary
            && let Err(e) = self.notifier.deliver(&report::run_summary(&summary)).await
        {
            tracing::warn!(error = %e, "could not deliver run summary");
        }
        summary
    }

    /// Live count first, then the cached count, then the configured one.
    async fn refresh_subscribers(&self, channel: &Channel) -> Result<Channel> {
        let live = match self.videos.subscriber_count(&channel.id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(channel_id = %channel.id, error = %e, "subscriber lookup failed");
                None
            }
        };

        let subscribers = match live {
            Some(count) => Some(count),
            None => self
                .store
                .cached_subscribers(&channel.id)
                .await?
                .or(channel.subscribers),
        };

        let refreshed = Channel {
            subscribers,
            ..channel.clone()
        };
        if live.is_some() {
            self.store.save_channel(&refreshed).await?;
        }
        Ok(refreshed)
    }

    async fn check_channel(
        &self,
        channel: &Channel,
        published_after: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<Vec<Found>> {
        let channel = self.refresh_subscribers(channel).await?;
        let Some(subscribers) = channel.subscribers else {
            tracing::warn!(channel_id = %channel.id, "no subscriber count known, skipping channel");
            return Ok(Vec::new());
        };

        let videos: Vec<VideoCandidate> = self
            .videos
            .recent_videos(&channel.id, published_after)
            .await?
            .into_iter()
            .filter(|v| v.published_at >= published_after)
            .collect();
        summary.candidates += videos.len();
        tracing::info!(
            channel_id = %channel.id,
            subscribers,
            tier = ?channel.tier(self.classifier.thresholds()),
            videos = videos.len(),
            "channel checked"
        );

        let mut found = Vec::new();
        for video in videos {
            let verdict = match self.classifier.classify(video.view_count, subscribers) {
                Ok(verdict) => verdict,
                Err(e) => {
                    tracing::warn!(video_id = %video.video_id, error = %e, "cannot classify video");
                    continue;
                }
            };
            if !verdict.is_viral {
                continue;
            }
            summary.viral += 1;

            if self.store.is_processed(&video.video_id).await? {
                summary.already_processed += 1;
                tracing::debug!(video_id = %video.video_id, "already processed");
                continue;
            }

            tracing::info!(video_id = %video.video_id, title = %video.title, verdict = %verdict.summary(), "viral video");
            found.push(Found {
                channel: channel.clone(),
                video,
                verdict,
            });
        }
        Ok(found)
    }

    #[tracing::instrument(name = "pipeline.video", skip_all, fields(video_id = %video.video_id))]
    async fn process_video(
        &self,
        channel: &Channel,
        video: &VideoCandidate,
        verdict: &ViralityVerdict,
    ) -> Outcome {
        let (outcome, detail) = match self.produce_script(channel, video, verdict).await {
            Ok(Produced::Delivered) => (Outcome::Completed, None),
            Ok(Produced::TooShort(chars)) => (
                Outcome::Skipped,
                Some(format!("transcript too short ({chars} characters)")),
            ),
            Err(e) => {
                tracing::error!(error = %e, "video processing failed");
                (Outcome::Failed, Some(e.to_string()))
            }
        };

        let record = ProcessedVideoRecord::new(video, outcome, detail);
        match self.store.record(&record).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("video was recorded concurrently"),
            Err(e) => tracing::error!(error = %e, "could not record outcome"),
        }
        tracing::info!(%outcome, "video done");
        outcome
    }

    async fn produce_script(
        &self,
        channel: &Channel,
        video: &VideoCandidate,
        verdict: &ViralityVerdict,
    ) -> Result<Produced> {
        let transcript = self
            .transcripts
            .fetch(&video.video_id)
            .await?
            .ok_or_else(|| Error::upstream("transcript", "no transcript available"))?;

        let text = transcript.text();
        let chars = text.chars().count();
        if chars < self.monitoring.min_transcript_chars {
            return Ok(Produced::TooShort(chars));
        }

        let claims = self.model.extract_claims(&text).await?;
        let facts = self.verifier.verify_all(&claims).await?;
        self.store.save_facts(&video.video_id, &facts).await?;
        let structure = self.model.analyze_structure(&text).await?;

        let verified = only_verified(&facts);
        let brief = ScriptBrief {
            topic: &video.title,
            structure: &structure,
            facts: &verified,
            style: &self.style,
            style_examples: &self.style_examples,
        };
        let script = self.model.write_script(&brief).await?;

        self.store
            .save_script(&video.video_id, &script.topic, &script.full_text())
            .await?;

        let message = report::script_report(video, channel, verdict, &facts, &script);
        self.notifier.deliver(&message).await?;
        Ok(Produced::Delivered)
    }
}
