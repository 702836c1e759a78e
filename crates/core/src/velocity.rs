//! Velocity samples and calendar bucketing.

use chrono::{Datelike, Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use crate::Time;

/// Throughput for one calendar bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocitySample {
    /// Inclusive start of the bucket
    pub period_start: Time,

    /// Exclusive end of the bucket
    pub period_end: Time,

    /// Commits landed in the bucket
    pub commits: u32,

    /// Pull requests merged in the bucket
    pub prs_merged: u32,

    /// Story points of tasks completed in the bucket
    pub story_points_completed: f64,

    /// Whether the bucket had already ended when the sample was taken
    pub closed: bool,

    /// Commit and PR counts came from a cycle where no GitHub adapter failed
    #[serde(default)]
    pub activity_complete: bool,

    /// Story points came from a cycle where no PM adapter failed
    #[serde(default)]
    pub points_complete: bool,
}

impl VelocitySample {
    /// Empty sample for the bucket starting at `period_start`.
    pub fn empty(bucketing: Bucketing, period_start: Time, now: Time) -> Self {
        let period_end = bucketing.period_end(period_start);
        Self {
            period_start,
            period_end,
            commits: 0,
            prs_merged: 0,
            story_points_completed: 0.0,
            closed: period_end <= now,
            activity_complete: true,
            points_complete: true,
        }
    }

    /// Record which halves of the sample had all their backends present.
    pub fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.activity_complete = coverage.activity;
        self.points_complete = coverage.story_points;
        self
    }

    /// Whether `ts` falls inside this bucket.
    pub fn contains(&self, ts: Time) -> bool {
        ts >= self.period_start && ts < self.period_end
    }
}

/// Which backends a cycle's samples were computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    /// Every GitHub adapter delivered
    pub activity: bool,
    /// Every PM adapter delivered
    pub story_points: bool,
}

impl Coverage {
    /// All backends delivered.
    pub const FULL: Coverage = Coverage { activity: true, story_points: true };
}

/// Bucket size for velocity aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucketing {
    /// UTC calendar days
    #[default]
    Day,
    /// ISO weeks starting Monday 00:00 UTC
    Week,
}

impl Bucketing {
    /// Length of one bucket.
    pub fn period(&self) -> Duration {
        match self {
            Bucketing::Day => Duration::days(1),
            Bucketing::Week => Duration::days(7),
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn bucket_start(&self, ts: Time) -> Time {
        let date = ts.date_naive();
        let start = match self {
            Bucketing::Day => date,
            Bucketing::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
        };
        start.and_time(NaiveTime::MIN).and_utc()
    }

    /// End of the bucket starting at `start`.
    pub fn period_end(&self, start: Time) -> Time {
        start + self.period()
    }
}

/// Direction of recent velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Throughput increasing
    Rising,
    /// Throughput decreasing
    Falling,
    /// No significant change
    Flat,
    /// Too few closed samples to tell
    #[default]
    InsufficientData,
}

impl Trend {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Flat => "flat",
            Trend::InsufficientData => "insufficient_data",
        }
    }
}
