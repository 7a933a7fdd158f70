//! Version-triggered re-fetch
//!
//! Broadcast messages embed a (frame type, version) table the controller
//! bumps whenever underlying data changes. The tracker keeps the last
//! observed and last requested version per type; divergence enqueues one
//! re-request. The first observation of a type only records a baseline,
//! since the initial pull happens explicitly on entering Ready.

use std::collections::HashMap;

use econet_wire::FrameType;

/// Types the tracker watches, in resolution order. The schema precedes
/// schema-dependent payloads.
pub(crate) const RESOLUTION_ORDER: &[FrameType] = &[
    FrameType::Uid,
    FrameType::RegulatorDataSchema,
    FrameType::EcomaxParameters,
    FrameType::MixerParameters,
    FrameType::ThermostatParameters,
    FrameType::Schedules,
    FrameType::Alerts,
];

#[derive(Debug, Default)]
pub(crate) struct VersionTracker {
    /// Last version seen in a broadcast, per request type
    seen: HashMap<FrameType, u16>,
    /// Last version a request was issued for
    requested: HashMap<FrameType, u16>,
    /// Requests issued but not yet answered
    in_flight: HashMap<FrameType, u16>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest an embedded version table and return the request types
    /// that diverged, in resolution order.
    pub fn diff(&mut self, versions: &[(u16, u16)]) -> Vec<FrameType> {
        let mut outdated = Vec::new();
        for request_type in RESOLUTION_ORDER {
            let Some((_, version)) = versions
                .iter()
                .find(|(code, _)| u16::from(request_type.as_byte()) == *code)
            else {
                continue;
            };

            match self.seen.insert(*request_type, *version) {
                None => {
                    // Baseline; the Ready-entry pull covers the fetch
                    self.requested.insert(*request_type, *version);
                },
                Some(previous) if previous != *version => {
                    if self.requested.get(request_type) != Some(version)
                        && self.in_flight.get(request_type) != Some(version)
                    {
                        self.requested.insert(*request_type, *version);
                        self.in_flight.insert(*request_type, *version);
                        outdated.push(*request_type);
                    }
                },
                Some(_) => {},
            }
        }
        outdated
    }

    /// Record that a response for this request type arrived
    pub fn mark_answered(&mut self, request_type: FrameType) {
        self.in_flight.remove(&request_type);
    }

    /// Forget everything; used when a connection is torn down
    pub fn reset(&mut self) {
        self.seen.clear();
        self.requested.clear();
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_baseline() {
        let mut tracker = VersionTracker::new();
        let outdated = tracker.diff(&[(49, 37), (50, 37)]);
        assert!(outdated.is_empty());
    }

    #[test]
    fn test_version_bump_triggers_once() {
        let mut tracker = VersionTracker::new();
        tracker.diff(&[(49, 37), (50, 37)]);

        // Type 49 bumped, type 50 unchanged
        let outdated = tracker.diff(&[(49, 38), (50, 37)]);
        assert_eq!(outdated, vec![FrameType::EcomaxParameters]);

        // Same table again: request already in flight, nothing new
        let outdated = tracker.diff(&[(49, 38), (50, 37)]);
        assert!(outdated.is_empty());
    }

    #[test]
    fn test_answered_then_bumped_again() {
        let mut tracker = VersionTracker::new();
        tracker.diff(&[(49, 1)]);
        assert_eq!(tracker.diff(&[(49, 2)]), vec![FrameType::EcomaxParameters]);
        tracker.mark_answered(FrameType::EcomaxParameters);
        assert_eq!(tracker.diff(&[(49, 3)]), vec![FrameType::EcomaxParameters]);
    }

    #[test]
    fn test_resolution_order() {
        let mut tracker = VersionTracker::new();
        tracker.diff(&[(61, 1), (49, 1), (85, 1), (57, 1)]);

        // Bump everything; requests come out in resolution order, with
        // the schema ahead of schema-dependent payloads
        let outdated = tracker.diff(&[(61, 2), (49, 2), (85, 2), (57, 2)]);
        assert_eq!(
            outdated,
            vec![
                FrameType::Uid,
                FrameType::RegulatorDataSchema,
                FrameType::EcomaxParameters,
                FrameType::Alerts,
            ]
        );
    }

    #[test]
    fn test_unknown_types_ignored() {
        let mut tracker = VersionTracker::new();
        tracker.diff(&[(999, 1)]);
        assert!(tracker.diff(&[(999, 2)]).is_empty());
    }

    #[test]
    fn test_reset() {
        let mut tracker = VersionTracker::new();
        tracker.diff(&[(49, 1)]);
        tracker.reset();
        // Post-reset observation is a baseline again
        assert!(tracker.diff(&[(49, 9)]).is_empty());
    }
}
