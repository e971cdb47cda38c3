//! ISO week bucketing for the assignments and assessments views. Weeks are
//! labeled `{isoYear}-W{week}` (no zero padding), run Monday through Sunday,
//! and are ordered in two tiers: weeks whose items are all completed sink
//! below every other week, each tier chronologically ascending.

use chrono::{Datelike, NaiveDate, Weekday};

/// ISO-8601 week label for a date, e.g. 2024-01-01 -> "2024-W1".
pub fn week_label(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{}", week.year(), week.week())
}

/// Monday and Sunday of the week a label denotes. Inverse of `week_label`
/// for display purposes: the returned range always contains every date that
/// maps to the label.
pub fn week_bounds(label: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (year, week) = label.split_once("-W")?;
    let year: i32 = year.parse().ok()?;
    let week: u32 = week.parse().ok()?;
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    let sunday = monday + chrono::Duration::days(6);
    Some((monday, sunday))
}

/// Human-readable header for a week label, e.g. "Jan 1 - Jan 7, 2024".
pub fn week_range_header(label: &str) -> Option<String> {
    let (monday, sunday) = week_bounds(label)?;
    Some(format!(
        "{} - {}, {}",
        monday.format("%b %-d"),
        sunday.format("%b %-d"),
        sunday.year()
    ))
}

#[derive(Debug, Clone)]
pub struct WeekBucket<T> {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub all_completed: bool,
    pub items: Vec<T>,
}

/// Group date-bearing items into ordered week buckets.
///
/// Items within a bucket sort by date ascending. Buckets sort chronologically
/// by week start, except that fully-completed weeks are demoted below all
/// others regardless of chronology.
pub fn bucket_into_weeks<T>(
    items: Vec<T>,
    date_of: impl Fn(&T) -> NaiveDate,
    is_completed: impl Fn(&T) -> bool,
) -> Vec<WeekBucket<T>> {
    let mut buckets: Vec<WeekBucket<T>> = Vec::new();

    for item in items {
        let date = date_of(&item);
        let label = week_label(date);
        match buckets.iter_mut().find(|b| b.label == label) {
            Some(bucket) => bucket.items.push(item),
            None => {
                // The label comes from the date, so bounds always resolve.
                let (start, end) = week_bounds(&label).unwrap_or((date, date));
                buckets.push(WeekBucket {
                    label,
                    start,
                    end,
                    all_completed: false,
                    items: vec![item],
                });
            }
        }
    }

    for bucket in &mut buckets {
        bucket
            .items
            .sort_by_key(|item| date_of(item));
        bucket.all_completed = bucket.items.iter().all(|item| is_completed(item));
    }

    buckets.sort_by_key(|b| (b.all_completed, b.start));
    buckets
}
