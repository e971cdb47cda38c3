//! Class lifecycle migration. Pure planner: callers hand in "today" and the
//! future/current snapshots, and get back the ids to move. Applying the plan
//! is the handler's job (independent upserts per record, no cross-collection
//! transaction).

use chrono::NaiveDate;

/// The date fields that drive a class's lifecycle. Missing dates never
/// trigger a transition.
#[derive(Debug, Clone)]
pub struct ClassDates {
    pub id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
    /// Future classes whose start date has arrived (today >= start).
    pub to_current: Vec<String>,
    /// Current classes whose end date has passed (today > end, strictly).
    pub to_past: Vec<String>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_current.is_empty() && self.to_past.is_empty()
    }
}

/// Each record is evaluated independently; running the plan a second time on
/// the same day selects nothing, because migrated records have left the
/// collection that feeds their rule.
pub fn plan_migrations(
    today: NaiveDate,
    future: &[ClassDates],
    current: &[ClassDates],
) -> MigrationPlan {
    let mut plan = MigrationPlan::default();

    for class in future {
        if let Some(start) = class.start_date {
            if today >= start {
                plan.to_current.push(class.id.clone());
            }
        }
    }

    for class in current {
        if let Some(end) = class.end_date {
            if today > end {
                plan.to_past.push(class.id.clone());
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn class(id: &str, start: Option<&str>, end: Option<&str>) -> ClassDates {
        ClassDates {
            id: id.to_string(),
            start_date: start.map(d),
            end_date: end.map(d),
        }
    }

    #[test]
    fn start_date_equal_to_today_migrates() {
        let plan = plan_migrations(
            d("2025-09-01"),
            &[class("f1", Some("2025-09-01"), None)],
            &[],
        );
        assert_eq!(plan.to_current, vec!["f1".to_string()]);
    }

    #[test]
    fn future_start_date_stays_put() {
        let plan = plan_migrations(
            d("2025-08-31"),
            &[class("f1", Some("2025-09-01"), None)],
            &[],
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn end_date_equal_to_today_does_not_migrate() {
        // Strict comparison: the class is still current on its last day.
        let plan = plan_migrations(
            d("2025-12-15"),
            &[],
            &[class("c1", Some("2025-09-01"), Some("2025-12-15"))],
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn end_date_before_today_migrates() {
        let plan = plan_migrations(
            d("2025-12-16"),
            &[],
            &[class("c1", Some("2025-09-01"), Some("2025-12-15"))],
        );
        assert_eq!(plan.to_past, vec!["c1".to_string()]);
    }

    #[test]
    fn missing_dates_never_transition() {
        let plan = plan_migrations(
            d("2025-12-16"),
            &[class("f1", None, None)],
            &[class("c1", Some("2025-09-01"), None)],
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn records_are_planned_independently() {
        let plan = plan_migrations(
            d("2025-09-01"),
            &[
                class("f1", Some("2025-09-01"), None),
                class("f2", Some("2026-01-05"), None),
            ],
            &[
                class("c1", None, Some("2025-06-30")),
                class("c2", None, Some("2025-12-15")),
            ],
        );
        assert_eq!(plan.to_current, vec!["f1".to_string()]);
        assert_eq!(plan.to_past, vec!["c1".to_string()]);
    }

    #[test]
    fn replanning_after_apply_is_a_noop() {
        let today = d("2025-09-01");
        let future = [class("f1", Some("2025-08-25"), None)];
        let current = [class("c1", None, Some("2025-08-30"))];
        let first = plan_migrations(today, &future, &current);
        assert_eq!(first.to_current, vec!["f1".to_string()]);
        assert_eq!(first.to_past, vec!["c1".to_string()]);

        // After applying, f1 lives in current (end date still ahead) and c1
        // is past; neither collection feeds its old rule any more.
        let second = plan_migrations(today, &[], &[class("f1", Some("2025-08-25"), None)]);
        assert!(second.is_empty());
    }
}
