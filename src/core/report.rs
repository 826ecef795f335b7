use crate::core::channel::Channel;
use crate::core::factcheck::{FactStatus, VerifiedFact};
use crate::core::generator::GeneratedScript;
use crate::core::pipeline::RunSummary;
use crate::core::virality::ViralityVerdict;
use crate::core::youtube::VideoCandidate;
use html_escape::encode_text;

fn status_marker(status: FactStatus) -> &'static str {
    match status {
        FactStatus::Verified => "✅",
        FactStatus::Outdated => "⚠️",
        FactStatus::Unverified => "❓",
    }
}

/// ` (claimed $1, now $2) [source]; note`, with only the parts that are known.
fn fact_details(fact: &VerifiedFact) -> String {
    let mut details = match (&fact.claimed_value, &fact.verified_value) {
        (Some(claimed), Some(actual)) => format!(" (claimed {claimed}, now {actual})"),
        (None, Some(actual)) => format!(" → {actual}"),
        _ => String::new(),
    };
    if let Some(source) = fact.source {
        details.push_str(&format!(" [{source}]"));
    }
    if let Some(note) = &fact.note {
        details.push_str(&format!("; {note}"));
    }
    details
}

/// Telegram HTML message for a finished script.
pub fn script_report(
    video: &VideoCandidate,
    channel: &Channel,
    verdict: &ViralityVerdict,
    facts: &[VerifiedFact],
    script: &GeneratedScript,
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "<b>New script: {}</b>\n",
        encode_text(&script.topic)
    ));
    out.push_str(&format!(
        "Source: <a href=\"{}\">{}</a> (<a href=\"{}\">{}</a>)\n",
        video.url(),
        encode_text(&video.title),
        channel.url(),
        encode_text(&channel.name)
    ));
    out.push_str(&format!("{}\n", encode_text(&verdict.summary())));

    if !facts.is_empty() {
        out.push_str("\n<b>Fact check</b>\n");
        for fact in facts {
            out.push_str(&format!(
                "{} {}{}\n",
                status_marker(fact.status),
                encode_text(&fact.claim.text),
                encode_text(&fact_details(fact))
            ));
        }
    }

    out.push_str(&format!(
        "\n<b>Script</b> ({} words)\n\n",
        script.word_count()
    ));
    out.push_str(&encode_text(&script.full_text()));
    out
}

const VIRAL_LIST_LIMIT: usize = 10;
const VIRAL_TITLE_CHARS: usize = 50;

/// The new viral videos of a run, at most ten of them listed.
pub fn viral_list(found: &[(&VideoCandidate, &ViralityVerdict)]) -> String {
    let mut out = format!("<b>Found {} viral videos</b>\n", found.len());

    for (i, (video, verdict)) in found.iter().take(VIRAL_LIST_LIMIT).enumerate() {
        let mut title: String = video.title.chars().take(VIRAL_TITLE_CHARS).collect();
        if video.title.chars().count() > VIRAL_TITLE_CHARS {
            title.push('…');
        }
        let ratio = verdict
            .ratio
            .map(|r| format!("{r:.1}x"))
            .unwrap_or_else(|| "no subscribers".to_string());
        out.push_str(&format!(
            "\n{}. <a href=\"{}\">{}</a>\n   {} views | {}\n",
            i + 1,
            video.url(),
            encode_text(&title),
            video.view_count,
            ratio
        ));
    }

    if found.len() > VIRAL_LIST_LIMIT {
        out.push_str(&format!("\n…and {} more", found.len() - VIRAL_LIST_LIMIT));
    }
    out
}

/// Counts only; failures are in the logs, not in notifications.
pub fn run_summary(summary: &RunSummary) -> String {
    format!(
        "<b>Daily run finished</b>\n\
         Channels checked: {}\n\
         Videos seen: {}\n\
         Viral: {}\n\
         Already processed: {}\n\
         Scripts delivered: {}\n\
         Skipped: {}\n\
         Failed: {}",
        summary.channels_checked,
        summary.candidates,
        summary.viral,
        summary.already_processed,
        summary.completed,
        summary.skipped,
        summary.failed,
    )
}
