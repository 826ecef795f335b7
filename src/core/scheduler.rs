use crate::core::pipeline::Pipeline;
use chrono::{DateTime, Days, NaiveTime, Utc};

/// The next `time` (UTC) strictly after `now`: today if it is still ahead,
/// otherwise tomorrow.
pub fn next_run_after(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        today + Days::new(1)
    }
}

/// Runs the pipeline every day at `time` until Ctrl-C. Runs never overlap;
/// a signal during a run takes effect once that run has finished.
pub async fn watch(pipeline: &Pipeline, time: NaiveTime, run_now: bool) {
    if run_now {
        pipeline.run_once().await;
    }

    loop {
        let now = Utc::now();
        let next = next_run_after(now, time);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next, wait_secs = wait.as_secs(), "waiting for next run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping");
                return;
            }
        }

        pipeline.run_once().await;
    }
}
