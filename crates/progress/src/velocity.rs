//! Velocity aggregation and trend classification.
//!
//! Samples are calendar-aligned buckets ending with the bucket that contains
//! `now`. Once a bucket has closed its sample never changes, so the
//! coordinator carries closed samples forward from the previous snapshot and
//! only the open bucket is recomputed each cycle.

use std::collections::HashMap;

use roadmap_core::{
    Activity, ActivityKind, Bucketing, Coverage, Task, Time, Trend, VelocityConfig, VelocitySample,
};
use tracing::debug;

/// Bucket activities and completed tasks into `window_size` samples.
pub fn aggregate(
    activities: &[Activity],
    tasks: &[Task],
    window_size: usize,
    bucketing: Bucketing,
    now: Time,
) -> Vec<VelocitySample> {
    let current = bucketing.bucket_start(now);
    let window = window_size.min(VelocityConfig::MAX_WINDOW_SIZE) as i32;
    let mut samples: Vec<VelocitySample> = (0..window)
        .rev()
        .map(|back| VelocitySample::empty(bucketing, current - bucketing.period() * back, now))
        .collect();
    let slots: HashMap<Time, usize> =
        samples.iter().enumerate().map(|(i, s)| (s.period_start, i)).collect();

    for activity in activities {
        let Some(&slot) = slots.get(&bucketing.bucket_start(activity.timestamp)) else {
            continue;
        };
        match activity.kind {
            ActivityKind::Commit => samples[slot].commits += 1,
            ActivityKind::PrMerged => samples[slot].prs_merged += 1,
            ActivityKind::PrOpened | ActivityKind::PrClosed => {}
        }
    }

    for task in tasks.iter().filter(|t| t.status.is_done()) {
        let Some(points) = task.story_points else {
            continue;
        };
        if let Some(&slot) = slots.get(&bucketing.bucket_start(task.last_updated)) {
            samples[slot].story_points_completed += points;
        }
    }

    samples
}

/// Replace freshly computed closed samples with the previous cycle's.
///
/// A previous sample is reused only if it was closed and covers exactly the
/// same period, so a bucketing change starts the history over. Counts are
/// reused per half: commit and PR counts only if the previous cycle had every
/// GitHub adapter, story points only if it had every PM adapter. Anything
/// else is recomputed and tagged with this cycle's `coverage`.
pub fn carry_forward(
    samples: Vec<VelocitySample>,
    previous: &[VelocitySample],
    coverage: Coverage,
) -> Vec<VelocitySample> {
    let kept: HashMap<(Time, Time), &VelocitySample> = previous
        .iter()
        .filter(|s| s.closed)
        .map(|s| ((s.period_start, s.period_end), s))
        .collect();

    let mut carried = 0;
    let samples: Vec<VelocitySample> = samples
        .into_iter()
        .map(|sample| {
            let mut sample = sample.with_coverage(coverage);
            if !sample.closed {
                return sample;
            }
            let Some(old) = kept.get(&(sample.period_start, sample.period_end)) else {
                return sample;
            };
            if old.activity_complete {
                sample.commits = old.commits;
                sample.prs_merged = old.prs_merged;
                sample.activity_complete = true;
            }
            if old.points_complete {
                sample.story_points_completed = old.story_points_completed;
                sample.points_complete = true;
            }
            if old.activity_complete && old.points_complete {
                carried += 1;
            }
            sample
        })
        .collect();
    debug!("Carried {} closed velocity samples forward", carried);
    samples
}

/// Classify the slope of the most recent `sample_count` closed samples (at least two).
///
/// The metric is story points when any of those samples has points,
/// merged pull requests otherwise.
pub fn classify_trend(samples: &[VelocitySample], sample_count: usize, threshold_slope: f64) -> Trend {
    let closed: Vec<&VelocitySample> = samples.iter().filter(|s| s.closed).collect();
    // A slope needs two points even when one sample is asked for.
    let count = sample_count.max(2);
    if closed.len() < count {
        return Trend::InsufficientData;
    }
    let recent = &closed[closed.len() - count..];

    let use_points = recent.iter().any(|s| s.story_points_completed > 0.0);
    let values: Vec<f64> = recent
        .iter()
        .map(|s| if use_points { s.story_points_completed } else { s.prs_merged as f64 })
        .collect();

    let slope = least_squares_slope(&values);
    if slope > threshold_slope {
        Trend::Rising
    } else if slope < -threshold_slope {
        Trend::Falling
    } else {
        Trend::Flat
    }
}

fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use roadmap_core::{ActivityId, SourceSystem, TaskStatus};

    fn now() -> Time {
        // Thursday
        Utc.with_ymd_and_hms(2024, 3, 14, 15, 0, 0).unwrap()
    }

    fn activity(kind: ActivityKind, ts: Time) -> Activity {
        Activity {
            id: ActivityId(format!("{}@{}", kind, ts.timestamp())),
            kind,
            repo: "acme/shop".into(),
            timestamp: ts,
            pr_number: (kind != ActivityKind::Commit).then_some(1),
            title: String::new(),
            branch_ref: None,
            linked_task_id: None,
        }
    }

    fn sample(prs: u32, points: f64) -> VelocitySample {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        VelocitySample {
            period_start: start,
            period_end: start + Duration::days(1),
            commits: 0,
            prs_merged: prs,
            story_points_completed: points,
            closed: true,
            activity_complete: true,
            points_complete: true,
        }
    }

    #[test]
    fn test_window_ends_with_open_bucket() {
        let samples = aggregate(&[], &[], 3, Bucketing::Day, now());
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].period_start, Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap());
        assert_eq!(samples[2].period_start, Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
        assert!(samples[0].closed && samples[1].closed);
        assert!(!samples[2].closed);
    }

    #[test]
    fn test_counts_per_bucket() {
        let d = |day, hour| Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap();
        let activities = vec![
            activity(ActivityKind::Commit, d(13, 9)),
            activity(ActivityKind::Commit, d(13, 23)),
            activity(ActivityKind::PrMerged, d(14, 1)),
            activity(ActivityKind::PrOpened, d(14, 2)),
            activity(ActivityKind::Commit, d(1, 2)),
        ];
        let mut done = Task::new(SourceSystem::Jira, "PAY-1", "x", TaskStatus::Done, d(13, 12));
        done.story_points = Some(3.0);
        let mut open = Task::new(SourceSystem::Jira, "PAY-2", "y", TaskStatus::Review, d(13, 12));
        open.story_points = Some(8.0);

        let samples = aggregate(&activities, &[done, open], 2, Bucketing::Day, now());

        assert_eq!(samples[0].commits, 2);
        assert_eq!(samples[0].story_points_completed, 3.0);
        assert_eq!(samples[1].prs_merged, 1);
        assert_eq!(samples[1].commits, 0);
    }

    #[test]
    fn test_oversized_window_is_capped() {
        let samples = aggregate(&[], &[], usize::MAX, Bucketing::Week, now());
        assert_eq!(samples.len(), VelocityConfig::MAX_WINDOW_SIZE);
        assert!(!samples[samples.len() - 1].closed);
    }

    #[test]
    fn test_week_buckets() {
        let samples = aggregate(&[], &[], 2, Bucketing::Week, now());
        assert_eq!(samples[1].period_start, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
        assert_eq!(samples[0].period_start, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_closed_buckets_are_idempotent() {
        let first = aggregate(&[], &[], 3, Bucketing::Day, now());
        // Activity for a closed day arriving late does not rewrite history.
        let late = vec![activity(ActivityKind::Commit, Utc.with_ymd_and_hms(2024, 3, 12, 8, 0, 0).unwrap())];
        let later = now() + Duration::hours(2);
        let second = carry_forward(aggregate(&late, &[], 3, Bucketing::Day, later), &first, Coverage::FULL);

        assert_eq!(second[0], first[0]);
        assert_eq!(second[1], first[1]);
    }

    #[test]
    fn test_open_bucket_is_recomputed() {
        let first = aggregate(&[], &[], 2, Bucketing::Day, now());
        let commit = vec![activity(ActivityKind::Commit, now())];
        let second = carry_forward(aggregate(&commit, &[], 2, Bucketing::Day, now()), &first, Coverage::FULL);
        assert_eq!(second[1].commits, 1);
    }

    #[test]
    fn test_closed_bucket_without_github_is_recomputed() {
        let no_github = Coverage { activity: false, story_points: true };
        let first = carry_forward(aggregate(&[], &[], 3, Bucketing::Day, now()), &[], no_github);
        assert!(!first[0].activity_complete);
        assert!(first[0].points_complete);

        let commit = vec![activity(ActivityKind::Commit, Utc.with_ymd_and_hms(2024, 3, 12, 8, 0, 0).unwrap())];
        let later = now() + Duration::hours(1);
        let second = carry_forward(aggregate(&commit, &[], 3, Bucketing::Day, later), &first, Coverage::FULL);

        assert_eq!(second[0].commits, 1);
        assert!(second[0].activity_complete);

        // Once complete, the bucket is frozen again.
        let third = carry_forward(aggregate(&[], &[], 3, Bucketing::Day, later), &second, Coverage::FULL);
        assert_eq!(third[0].commits, 1);
    }

    #[test]
    fn test_points_reused_only_when_pm_data_was_complete() {
        let d = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap();
        let mut done = Task::new(SourceSystem::Jira, "PAY-1", "x", TaskStatus::Done, d);
        done.story_points = Some(5.0);
        let jira_down = Coverage { activity: true, story_points: false };

        let first = carry_forward(aggregate(&[], &[], 2, Bucketing::Day, now()), &[], jira_down);
        let second = carry_forward(aggregate(&[], &[done], 2, Bucketing::Day, now()), &first, Coverage::FULL);

        assert_eq!(first[0].story_points_completed, 0.0);
        assert_eq!(second[0].story_points_completed, 5.0);
        assert!(second[0].points_complete);
    }

    #[test]
    fn test_trend_needs_enough_closed_samples() {
        let samples = vec![sample(1, 0.0), sample(2, 0.0), sample(3, 0.0)];
        assert_eq!(classify_trend(&samples, 4, 0.1), Trend::InsufficientData);
        assert_eq!(classify_trend(&samples[..1], 1, 0.1), Trend::InsufficientData);

        let mut open = sample(9, 0.0);
        open.closed = false;
        let with_open = vec![sample(1, 0.0), sample(2, 0.0), sample(3, 0.0), open];
        assert_eq!(classify_trend(&with_open, 4, 0.1), Trend::InsufficientData);
    }

    #[test]
    fn test_trend_direction_on_prs() {
        let rising = vec![sample(1, 0.0), sample(2, 0.0), sample(3, 0.0), sample(4, 0.0)];
        assert_eq!(classify_trend(&rising, 4, 0.1), Trend::Rising);

        let falling: Vec<_> = rising.iter().rev().cloned().collect();
        assert_eq!(classify_trend(&falling, 4, 0.1), Trend::Falling);

        let flat = vec![sample(2, 0.0), sample(2, 0.0), sample(2, 0.0), sample(2, 0.0)];
        assert_eq!(classify_trend(&flat, 4, 0.1), Trend::Flat);
    }

    #[test]
    fn test_trend_prefers_story_points() {
        // PRs rise, points fall.
        let samples = vec![sample(1, 8.0), sample(2, 5.0), sample(3, 3.0), sample(4, 0.0)];
        assert_eq!(classify_trend(&samples, 4, 0.1), Trend::Falling);
    }

    #[test]
    fn test_single_sample_count_still_fits_two_points() {
        let samples = vec![sample(1, 0.0), sample(3, 0.0)];
        assert_eq!(classify_trend(&samples, 1, 0.1), Trend::Rising);
    }

    #[test]
    fn test_trend_uses_most_recent_samples() {
        let samples = vec![sample(9, 0.0), sample(1, 0.0), sample(1, 0.0), sample(1, 0.0)];
        assert_eq!(classify_trend(&samples, 3, 0.1), Trend::Flat);
    }
}
