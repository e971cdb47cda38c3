//! Grade aggregation. One code path serves both the final-grade display on
//! past classes and the running average on the grades page, so the two can
//! never drift in rounding or threshold behavior.

/// Earned/total points plus an optional percentage weight for one graded task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradePoints {
    pub earned: f64,
    pub total: f64,
    pub weight: Option<f64>,
}

/// Per-task percentage; 0 when the task is not yet graded (total <= 0).
pub fn grade_percent(earned: f64, total: f64) -> f64 {
    if total > 0.0 {
        100.0 * earned / total
    } else {
        0.0
    }
}

/// Aggregate a class's grades into a single percentage.
///
/// A grade counts only when `total > 0` (total 0 means "not yet graded").
/// This filter runs before the weight test: an ungraded task with a weight is
/// excluded from everything, including the decision of which branch to take.
///
/// If any counted grade carries a positive weight, the result is the
/// weight-weighted mean of per-grade percentages with absent weights defaulted
/// to 0. Otherwise it is the plain arithmetic mean. `None` means "ungraded":
/// no counted grades, or a degenerate weighted set whose weights sum to 0.
pub fn class_average(grades: &[GradePoints]) -> Option<f64> {
    let counted: Vec<&GradePoints> = grades.iter().filter(|g| g.total > 0.0).collect();
    if counted.is_empty() {
        return None;
    }

    let has_weights = counted
        .iter()
        .any(|g| g.weight.map(|w| w > 0.0).unwrap_or(false));

    if has_weights {
        let mut weighted_sum = 0.0_f64;
        let mut total_weight = 0.0_f64;
        for g in &counted {
            let weight = g.weight.unwrap_or(0.0);
            weighted_sum += grade_percent(g.earned, g.total) * weight;
            total_weight += weight;
        }
        if total_weight > 0.0 {
            Some(weighted_sum / total_weight)
        } else {
            None
        }
    } else {
        let sum: f64 = counted
            .iter()
            .map(|g| grade_percent(g.earned, g.total))
            .sum();
        Some(sum / counted.len() as f64)
    }
}

/// Clamp earned points down to the total when the task is graded. The edit is
/// persisted clamped, never dropped.
pub fn clamp_earned(earned: f64, total: f64) -> f64 {
    if total > 0.0 && earned > total {
        total
    } else {
        earned
    }
}
