//! Aggregate statistics over completed work sessions.

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::Serialize;

use crate::types::SessionRecord;

/// A gap longer than this between sessions ends a streak.
pub const STREAK_GAP_MINUTES: i64 = 30;

/// Number of days covered by the daily histogram.
pub const DAILY_WINDOW_DAYS: usize = 7;

/// Summary of a user's work sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: usize,
    /// Total credited work time, rounded to minutes
    pub total_minutes: u64,
    /// Average session length in minutes, rounded
    pub average_minutes: u64,
    /// Mean rating over rated sessions
    pub average_rating: Option<f64>,
    pub rated_sessions: usize,
    pub longest_streak: usize,
    /// Sessions started on each of the last seven days, oldest first
    pub last_week: [u32; DAILY_WINDOW_DAYS],
}

impl SessionStats {
    /// Computes statistics as of `now`, bucketing days in `now`'s time zone.
    pub fn compute<Tz: TimeZone>(records: &[SessionRecord], now: &DateTime<Tz>) -> Self {
        let total_sessions = records.len();
        let total_seconds: u64 = records.iter().map(|r| u64::from(r.duration_seconds)).sum();
        let total_minutes = round_div(total_seconds, 60);
        let average_minutes = if total_sessions == 0 {
            0
        } else {
            round_div(total_minutes, total_sessions as u64)
        };

        let ratings: Vec<u8> = records.iter().filter_map(|r| r.feedback).collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            let sum: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
            Some(f64::from(sum) / ratings.len() as f64)
        };

        Self {
            total_sessions,
            total_minutes,
            average_minutes,
            average_rating,
            rated_sessions: ratings.len(),
            longest_streak: longest_streak(records),
            last_week: last_week(records, now),
        }
    }
}

fn round_div(numerator: u64, denominator: u64) -> u64 {
    (numerator + denominator / 2) / denominator
}

fn started_at<Tz: TimeZone>(record: &SessionRecord, tz: &Tz) -> DateTime<Tz> {
    (record.completed_at - Duration::seconds(i64::from(record.duration_seconds)))
        .with_timezone(tz)
}

fn longest_streak(records: &[SessionRecord]) -> usize {
    let mut spans: Vec<_> = records
        .iter()
        .map(|r| (started_at(r, &chrono::Utc), r.completed_at))
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    let max_gap = Duration::minutes(STREAK_GAP_MINUTES);
    let mut longest = 0;
    let mut current = 0;
    for (i, (_, end)) in spans.iter().enumerate() {
        current += 1;
        let streak_ends = spans
            .get(i + 1)
            .is_none_or(|(next_start, _)| *next_start - *end > max_gap);
        if streak_ends {
            longest = longest.max(current);
            current = 0;
        }
    }
    longest
}

fn last_week<Tz: TimeZone>(records: &[SessionRecord], now: &DateTime<Tz>) -> [u32; DAILY_WINDOW_DAYS] {
    let tz = now.timezone();
    let today: NaiveDate = now.date_naive();
    let mut counts = [0u32; DAILY_WINDOW_DAYS];

    for record in records {
        let day = started_at(record, &tz).date_naive();
        let days_ago = (today - day).num_days();
        if (0..DAILY_WINDOW_DAYS as i64).contains(&days_ago) {
            counts[DAILY_WINDOW_DAYS - 1 - days_ago as usize] += 1;
        }
    }
    counts
}
