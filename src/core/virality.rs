use crate::error::{Error, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};

const MAX_RATIO: f64 = 1_000_000.0;
const MAX_RATIO_DECIMALS: usize = 9;

/// The decimal a ratio was written as, as `numerator / denominator`.
/// Uses the shortest representation that round-trips, so `0.3` is exactly 3/10.
fn exact_fraction(ratio: f64) -> Option<(i128, i128)> {
    if !ratio.is_finite() || ratio <= 0.0 || ratio > MAX_RATIO {
        return None;
    }
    let text = ratio.to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    if fraction.len() > MAX_RATIO_DECIMALS {
        return None;
    }
    let denominator = 10_i128.pow(fraction.len() as u32);
    let whole: i128 = whole.parse().ok()?;
    let fraction: i128 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };
    Some((whole * denominator + fraction, denominator))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[display("small")]
    Small,
    #[display("medium")]
    Medium,
    #[display("large")]
    Large,
}

/// Tier bounds and the views/subscribers ratio each tier must reach.
///
/// `small_max_subscribers` and `medium_max_subscribers` are exclusive upper
/// bounds: a channel with exactly `small_max_subscribers` subscribers is
/// already medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViralityThresholds {
    pub small_max_subscribers: i64,
    pub medium_max_subscribers: i64,
    pub small_ratio: f64,
    pub medium_ratio: f64,
    pub large_ratio: f64,
    /// Ratio is undefined without subscribers; this many views make a video viral instead.
    pub zero_subscriber_min_views: i64,
}

impl Default for ViralityThresholds {
    fn default() -> Self {
        Self {
            small_max_subscribers: 5_000,
            medium_max_subscribers: 50_000,
            small_ratio: 1.5,
            medium_ratio: 1.0,
            large_ratio: 0.3,
            zero_subscriber_min_views: 1,
        }
    }
}

impl ViralityThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.small_max_subscribers <= 0 {
            return Err(Error::invalid("small_max_subscribers must be positive"));
        }
        if self.small_max_subscribers >= self.medium_max_subscribers {
            return Err(Error::invalid(
                "small_max_subscribers must be below medium_max_subscribers",
            ));
        }
        for (name, ratio) in [
            ("small_ratio", self.small_ratio),
            ("medium_ratio", self.medium_ratio),
            ("large_ratio", self.large_ratio),
        ] {
            if exact_fraction(ratio).is_none() {
                return Err(Error::invalid(format!(
                    "{name} must be a positive number up to {MAX_RATIO} \
                     with at most {MAX_RATIO_DECIMALS} decimals, got {ratio}"
                )));
            }
        }
        if self.zero_subscriber_min_views < 0 {
            return Err(Error::invalid("zero_subscriber_min_views cannot be negative"));
        }
        Ok(())
    }

    pub fn tier_for(&self, subscriber_count: i64) -> Tier {
        if subscriber_count < self.small_max_subscribers {
            Tier::Small
        } else if subscriber_count < self.medium_max_subscribers {
            Tier::Medium
        } else {
            Tier::Large
        }
    }

    pub fn ratio_for(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Small => self.small_ratio,
            Tier::Medium => self.medium_ratio,
            Tier::Large => self.large_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViralityVerdict {
    pub is_viral: bool,
    pub tier: Tier,
    /// Views per subscriber. `None` when the channel has no subscribers.
    pub ratio: Option<f64>,
    pub required_ratio: f64,
    pub view_count: i64,
    pub subscriber_count: i64,
}

impl ViralityVerdict {
    pub fn summary(&self) -> String {
        let status = if self.is_viral { "VIRAL" } else { "normal" };
        match self.ratio {
            Some(ratio) => format!(
                "{status} | {ratio:.2}x (needs {:.2}x, {} tier, {} subs, {} views)",
                self.required_ratio, self.tier, self.subscriber_count, self.view_count
            ),
            None => format!(
                "{status} | no subscribers ({} tier, {} views)",
                self.tier, self.view_count
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViralityClassifier {
    thresholds: ViralityThresholds,
}

impl Default for ViralityClassifier {
    fn default() -> Self {
        Self::new(ViralityThresholds::default())
    }
}

impl ViralityClassifier {
    pub fn new(thresholds: ViralityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ViralityThresholds {
        &self.thresholds
    }

    pub fn classify(&self, view_count: i64, subscriber_count: i64) -> Result<ViralityVerdict> {
        if view_count < 0 {
            return Err(Error::invalid(format!(
                "view_count cannot be negative (got {view_count})"
            )));
        }
        if subscriber_count < 0 {
            return Err(Error::invalid(format!(
                "subscriber_count cannot be negative (got {subscriber_count})"
            )));
        }

        let tier = self.thresholds.tier_for(subscriber_count);
        let required_ratio = self.thresholds.ratio_for(tier);

        if subscriber_count == 0 {
            return Ok(ViralityVerdict {
                is_viral: view_count >= self.thresholds.zero_subscriber_min_views,
                tier,
                ratio: None,
                required_ratio,
                view_count,
                subscriber_count,
            });
        }

        let (numerator, denominator) = exact_fraction(required_ratio).ok_or_else(|| {
            Error::invalid(format!("{tier} ratio {required_ratio} is not usable"))
        })?;
        let is_viral =
            view_count as i128 * denominator >= subscriber_count as i128 * numerator;

        Ok(ViralityVerdict {
            is_viral,
            tier,
            ratio: Some(view_count as f64 / subscriber_count as f64),
            required_ratio,
            view_count,
            subscriber_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viral(views: i64, subs: i64) -> bool {
        ViralityClassifier::default()
            .classify(views, subs)
            .expect("valid input")
            .is_viral
    }

    #[test]
    fn small_tier_minimum_is_ceil_of_one_and_a_half() {
        for subs in 1..5_000_i64 {
            let min_views = (3 * subs + 1) / 2;
            assert!(viral(min_views, subs), "subs={subs} views={min_views}");
            assert!(!viral(min_views - 1, subs), "subs={subs} views={}", min_views - 1);
        }
    }

    #[test]
    fn scenarios() {
        assert!(viral(1_500, 1_000));
        assert!(!viral(1_499, 1_000));
        assert!(viral(10_000, 10_000));
        assert!(!viral(9_999, 10_000));
        assert!(viral(30_000, 100_000));
        assert!(!viral(29_999, 100_000));
    }

    #[test]
    fn tier_boundaries_are_inclusive_below() {
        let classifier = ViralityClassifier::default();
        let at_medium = classifier.classify(5_000, 5_000).unwrap();
        assert_eq!(at_medium.tier, Tier::Medium);
        assert!(at_medium.is_viral);

        let below_medium = classifier.classify(5_000, 4_999).unwrap();
        assert_eq!(below_medium.tier, Tier::Small);
        assert!(!below_medium.is_viral);

        let at_large = classifier.classify(15_000, 50_000).unwrap();
        assert_eq!(at_large.tier, Tier::Large);
        assert!(at_large.is_viral);

        let below_large = classifier.classify(15_000, 49_999).unwrap();
        assert_eq!(below_large.tier, Tier::Medium);
        assert!(!below_large.is_viral);
    }

    #[test]
    fn zero_subscribers_uses_view_floor() {
        let classifier = ViralityClassifier::default();
        let none = classifier.classify(0, 0).unwrap();
        assert!(!none.is_viral);
        assert_eq!(none.ratio, None);
        assert_eq!(none.tier, Tier::Small);

        assert!(classifier.classify(1, 0).unwrap().is_viral);
    }

    #[test]
    fn negative_counts_are_rejected() {
        let classifier = ViralityClassifier::default();
        assert!(matches!(
            classifier.classify(-1, 10),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            classifier.classify(10, -1),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = ViralityClassifier::default();
        let first = classifier.classify(12_345, 40_000).unwrap();
        let second = classifier.classify(12_345, 40_000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn overridden_thresholds_apply() {
        let classifier = ViralityClassifier::new(ViralityThresholds {
            large_ratio: 0.5,
            ..ViralityThresholds::default()
        });
        assert!(!classifier.classify(30_000, 100_000).unwrap().is_viral);
        assert!(classifier.classify(50_000, 100_000).unwrap().is_viral);
    }

    #[test]
    fn invalid_thresholds_fail_validation() {
        let swapped = ViralityThresholds {
            small_max_subscribers: 60_000,
            ..ViralityThresholds::default()
        };
        assert!(swapped.validate().is_err());

        let zero_ratio = ViralityThresholds {
            medium_ratio: 0.0,
            ..ViralityThresholds::default()
        };
        assert!(zero_ratio.validate().is_err());

        let too_precise = ViralityThresholds {
            small_ratio: 0.0000000001,
            ..ViralityThresholds::default()
        };
        assert!(too_precise.validate().is_err());

        assert!(ViralityThresholds::default().validate().is_ok());
    }

    #[test]
    fn tiny_ratio_still_needs_views() {
        let thresholds = ViralityThresholds {
            large_ratio: 0.0004,
            ..ViralityThresholds::default()
        };
        assert!(thresholds.validate().is_ok());

        let classifier = ViralityClassifier::new(thresholds);
        assert!(!classifier.classify(0, 1_000_000).unwrap().is_viral);
        assert!(!classifier.classify(399, 1_000_000).unwrap().is_viral);
        assert!(classifier.classify(400, 1_000_000).unwrap().is_viral);
    }

    #[test]
    fn ratio_with_extra_decimals_is_exact_at_threshold() {
        let classifier = ViralityClassifier::new(ViralityThresholds {
            large_ratio: 0.3335,
            ..ViralityThresholds::default()
        });
        assert!(classifier.classify(333_500, 1_000_000).unwrap().is_viral);
        assert!(!classifier.classify(333_499, 1_000_000).unwrap().is_viral);
    }

    #[test]
    fn fractions_follow_the_written_decimal() {
        assert_eq!(exact_fraction(0.3), Some((3, 10)));
        assert_eq!(exact_fraction(1.5), Some((15, 10)));
        assert_eq!(exact_fraction(2.0), Some((2, 1)));
        assert_eq!(exact_fraction(-1.0), None);
        assert_eq!(exact_fraction(f64::NAN), None);
    }
}
