use crate::model::{AdConfig, CuePoint};

/// No mid-roll is scheduled inside the final minute of an episode.
pub const GUARD_SECONDS: u64 = 60;

/// Mid-roll insertion points for an episode of `duration_seconds`.
///
/// One cue point at every multiple of the configured interval, starting at the
/// interval itself and stopping strictly before `duration - GUARD_SECONDS`.
/// Empty when ads are disabled, the duration is unknown, the interval is
/// missing or non-positive, or the episode is no longer than the guard band.
/// Pre/post-roll counts are scalar fields on the episode and are not modeled
/// here.
pub fn plan(duration_seconds: Option<u64>, ads: &AdConfig) -> Vec<CuePoint> {
    if !ads.enabled {
        return Vec::new();
    }
    let (Some(duration), Some(interval)) = (duration_seconds, ads.mid_roll_interval_seconds)
    else {
        return Vec::new();
    };
    if interval <= 0 || duration <= GUARD_SECONDS {
        return Vec::new();
    }

    let interval = interval as u64;
    let limit = duration - GUARD_SECONDS;
    (1..)
        .map(|n| n * interval)
        .take_while(|&at| at < limit)
        .map(|at| CuePoint::midroll(at, ads.mid_roll_ad_count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CueKind;

    fn ads(interval: Option<i64>) -> AdConfig {
        AdConfig {
            enabled: true,
            pre_roll_count: 1,
            post_roll_count: 1,
            mid_roll_interval_seconds: interval,
            mid_roll_ad_count: 2,
        }
    }

    fn starts(points: &[CuePoint]) -> Vec<u64> {
        points.iter().map(|p| p.start_time_seconds).collect()
    }

    #[test]
    fn hour_long_episode_with_quarter_hour_interval() {
        let points = plan(Some(3600), &ads(Some(900)));
        assert_eq!(starts(&points), vec![900, 1800, 2700]);
        assert!(points
            .iter()
            .all(|p| p.kind == CueKind::Midroll && p.ad_count == 2 && p.is_active));
    }

    #[test]
    fn episode_shorter_than_interval_has_no_midrolls() {
        assert!(plan(Some(100), &ads(Some(900))).is_empty());
    }

    #[test]
    fn disabled_ads_always_yield_nothing() {
        let mut cfg = ads(Some(10));
        cfg.enabled = false;
        for duration in [None, Some(0), Some(61), Some(3600), Some(86_400)] {
            assert!(plan(duration, &cfg).is_empty());
        }
    }

    #[test]
    fn unknown_duration_or_interval_yields_nothing() {
        assert!(plan(None, &ads(Some(900))).is_empty());
        assert!(plan(Some(3600), &ads(None)).is_empty());
    }

    #[test]
    fn non_positive_interval_yields_nothing() {
        assert!(plan(Some(3600), &ads(Some(0))).is_empty());
        assert!(plan(Some(3600), &ads(Some(-300))).is_empty());
    }

    #[test]
    fn guard_band_edges() {
        assert!(plan(Some(60), &ads(Some(1))).is_empty());
        // 61 - 60 = 1, nothing is strictly before second 1
        assert!(plan(Some(61), &ads(Some(1))).is_empty());
        assert_eq!(starts(&plan(Some(63), &ads(Some(1)))), vec![1, 2]);
        // a point landing exactly on the guard boundary is dropped
        assert_eq!(starts(&plan(Some(960), &ads(Some(300)))), vec![300, 600]);
        assert_eq!(starts(&plan(Some(961), &ads(Some(300)))), vec![300, 600, 900]);
    }

    #[test]
    fn output_is_deterministic() {
        let cfg = ads(Some(420));
        assert_eq!(plan(Some(5000), &cfg), plan(Some(5000), &cfg));
    }
}
