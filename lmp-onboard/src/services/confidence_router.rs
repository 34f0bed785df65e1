//! Confidence router
//!
//! Pure function of overall confidence against the threshold table. No side
//! effects, no clock: the auto-approve deadline is expressed as a duration
//! and resolved by the caller.

use chrono::Duration;

use crate::config::ConfidenceThresholds;

/// Where a parsed email goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Commit immediately, no queue entry
    AutoProcess,
    /// Queue with an auto-approve timer
    TimedReview,
    /// Queue, human required
    ManualReview,
    /// Queue, flagged low-confidence
    LowConfidence,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::AutoProcess => "auto_process",
            RoutingDecision::TimedReview => "timed_review",
            RoutingDecision::ManualReview => "manual_review",
            RoutingDecision::LowConfidence => "low_confidence",
        }
    }

    /// Review-queue reason string; None for auto-process.
    pub fn queue_reason(&self) -> Option<&'static str> {
        match self {
            RoutingDecision::AutoProcess => None,
            RoutingDecision::TimedReview => Some("medium_confidence"),
            RoutingDecision::ManualReview => Some("low_confidence"),
            RoutingDecision::LowConfidence => Some("very_low_confidence"),
        }
    }

    pub fn queue_priority(&self) -> &'static str {
        match self {
            RoutingDecision::LowConfidence => "low",
            _ => "normal",
        }
    }
}

/// Route by confidence. Out-of-range inputs are clamped: garbage from the
/// extractor must still land somewhere reviewable, not panic the pipeline.
pub fn route(overall_confidence: f64, thresholds: &ConfidenceThresholds) -> RoutingDecision {
    let confidence = overall_confidence.clamp(0.0, 1.0);

    if confidence >= thresholds.auto_process {
        RoutingDecision::AutoProcess
    } else if confidence >= thresholds.timed_review {
        RoutingDecision::TimedReview
    } else if confidence >= thresholds.manual_review {
        RoutingDecision::ManualReview
    } else {
        RoutingDecision::LowConfidence
    }
}

/// How long a timed-review entry waits before it may auto-approve.
pub fn auto_approve_delay(
    decision: RoutingDecision,
    thresholds: &ConfidenceThresholds,
) -> Option<Duration> {
    match decision {
        RoutingDecision::TimedReview => Some(Duration::hours(thresholds.auto_approve_hours)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ConfidenceThresholds {
        ConfidenceThresholds::default()
    }

    #[test]
    fn bands_route_correctly() {
        assert_eq!(route(0.91, &thresholds()), RoutingDecision::AutoProcess);
        assert_eq!(route(0.80, &thresholds()), RoutingDecision::TimedReview);
        assert_eq!(route(0.60, &thresholds()), RoutingDecision::ManualReview);
        assert_eq!(route(0.30, &thresholds()), RoutingDecision::LowConfidence);
    }

    #[test]
    fn boundaries_are_inclusive_below() {
        // Each threshold belongs to the band above it
        assert_eq!(route(0.85, &thresholds()), RoutingDecision::AutoProcess);
        assert_eq!(route(0.70, &thresholds()), RoutingDecision::TimedReview);
        assert_eq!(route(0.50, &thresholds()), RoutingDecision::ManualReview);
        assert_eq!(route(0.4999, &thresholds()), RoutingDecision::LowConfidence);
    }

    #[test]
    fn same_input_same_decision() {
        let t = thresholds();
        for _ in 0..10 {
            assert_eq!(route(0.72, &t), RoutingDecision::TimedReview);
        }
    }

    #[test]
    fn out_of_range_clamps() {
        assert_eq!(route(1.7, &thresholds()), RoutingDecision::AutoProcess);
        assert_eq!(route(-0.3, &thresholds()), RoutingDecision::LowConfidence);
        assert_eq!(route(f64::NAN, &thresholds()), RoutingDecision::LowConfidence);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let t = ConfidenceThresholds {
            auto_process: 0.95,
            timed_review: 0.80,
            manual_review: 0.60,
            ..Default::default()
        };
        assert_eq!(route(0.90, &t), RoutingDecision::TimedReview);
    }

    #[test]
    fn only_timed_review_gets_a_timer() {
        let t = thresholds();
        assert!(auto_approve_delay(RoutingDecision::TimedReview, &t).is_some());
        assert!(auto_approve_delay(RoutingDecision::AutoProcess, &t).is_none());
        assert!(auto_approve_delay(RoutingDecision::ManualReview, &t).is_none());
        assert!(auto_approve_delay(RoutingDecision::LowConfidence, &t).is_none());
    }
}
