//! Per-owner aggregates computed on read. Nothing here is persisted.
//!
//! `avg_rating` is `None` (JSON `null`) until at least one record is rated;
//! it must not be read as a score of zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::repo_types::{Category, Feedback, Priority, Status};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub closed: i64,
    pub avg_rating: Option<f64>,
    pub high_priority: i64,
    pub medium_priority: i64,
    pub low_priority: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: Category,
    pub count: i64,
    pub avg_rating: Option<f64>,
    pub open_count: i64,
    pub completed_count: i64,
}

/// Dashboard roll-up derived from [`UserStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_feedback: i64,
    pub active_issues: i64,
    pub completion_rate: i64,
    pub average_rating: Option<f64>,
}

impl From<&UserStats> for Summary {
    fn from(s: &UserStats) -> Self {
        let completion_rate = if s.total > 0 {
            ((s.completed + s.closed) as f64 * 100.0 / s.total as f64).round() as i64
        } else {
            0
        };
        Self {
            total_feedback: s.total,
            active_issues: s.open + s.in_progress,
            completion_rate,
            average_rating: s.avg_rating,
        }
    }
}

pub fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Default)]
struct RatingAcc {
    sum: i64,
    n: i64,
}

impl RatingAcc {
    fn add(&mut self, rating: Option<i16>) {
        if let Some(r) = rating {
            self.sum += r as i64;
            self.n += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum as f64 / self.n as f64)
    }
}

/// Single pass over one owner's records.
pub fn user_stats<'a>(items: impl IntoIterator<Item = &'a Feedback>) -> UserStats {
    let mut s = UserStats::default();
    let mut ratings = RatingAcc::default();
    for f in items {
        s.total += 1;
        match f.status {
            Status::Open => s.open += 1,
            Status::InProgress => s.in_progress += 1,
            Status::Completed => s.completed += 1,
            Status::Closed => s.closed += 1,
        }
        match f.priority {
            Priority::High => s.high_priority += 1,
            Priority::Medium => s.medium_priority += 1,
            Priority::Low => s.low_priority += 1,
        }
        ratings.add(f.rating);
    }
    s.avg_rating = ratings.mean();
    s
}

/// One entry per category present in `items`, in category order.
pub fn category_stats<'a>(items: impl IntoIterator<Item = &'a Feedback>) -> Vec<CategoryStats> {
    let mut groups: BTreeMap<Category, (CategoryStats, RatingAcc)> = BTreeMap::new();
    for f in items {
        let (entry, ratings) = groups.entry(f.category).or_insert_with(|| {
            (
                CategoryStats {
                    category: f.category,
                    count: 0,
                    avg_rating: None,
                    open_count: 0,
                    completed_count: 0,
                },
                RatingAcc::default(),
            )
        });
        entry.count += 1;
        match f.status {
            Status::Open => entry.open_count += 1,
            Status::Completed => entry.completed_count += 1,
            _ => {}
        }
        ratings.add(f.rating);
    }
    groups
        .into_values()
        .map(|(mut entry, ratings)| {
            entry.avg_rating = ratings.mean().map(round_one_decimal);
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn item(category: Category, priority: Priority, status: Status, rating: Option<i16>) -> Feedback {
        let now = OffsetDateTime::now_utc();
        Feedback {
            feedback_id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_name: "A".into(),
            user_email: "a@x.com".into(),
            title: "Title".into(),
            feedback_text: "Some feedback text".into(),
            category,
            priority,
            status,
            rating,
            rating_comment: None,
            admin_response: None,
            admin_id: None,
            completed_at: None,
            closed_at: None,
            tags: vec![],
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_set_has_no_average() {
        let none: Vec<Feedback> = Vec::new();
        let s = user_stats(&none);
        assert_eq!(s, UserStats::default());
        assert_eq!(s.avg_rating, None);
        assert!(category_stats(&none).is_empty());
    }

    #[test]
    fn status_counts_add_up_to_total() {
        let items = vec![
            item(Category::General, Priority::High, Status::Open, None),
            item(Category::General, Priority::Low, Status::InProgress, None),
            item(Category::BugReport, Priority::Medium, Status::Completed, None),
            item(Category::BugReport, Priority::Medium, Status::Closed, Some(4)),
            item(Category::Compliment, Priority::High, Status::Closed, Some(5)),
        ];
        let s = user_stats(&items);
        assert_eq!(s.total, 5);
        assert_eq!(s.open + s.in_progress + s.completed + s.closed, s.total);
        assert_eq!(s.high_priority + s.medium_priority + s.low_priority, s.total);
        assert_eq!(s.avg_rating, Some(4.5));
    }

    #[test]
    fn categories_only_include_present_values() {
        let items = vec![
            item(Category::BugReport, Priority::High, Status::Open, None),
            item(Category::BugReport, Priority::High, Status::Completed, None),
            item(Category::BugReport, Priority::High, Status::Closed, Some(2)),
            item(Category::BugReport, Priority::High, Status::Closed, Some(3)),
            item(Category::BugReport, Priority::High, Status::Closed, Some(3)),
            item(Category::Suggestion, Priority::Low, Status::Open, None),
        ];
        let cats = category_stats(&items);
        assert_eq!(cats.len(), 2);
        let bugs = cats.iter().find(|c| c.category == Category::BugReport).unwrap();
        assert_eq!(bugs.count, 5);
        assert_eq!(bugs.open_count, 1);
        assert_eq!(bugs.completed_count, 1);
        assert_eq!(bugs.avg_rating, Some(2.7));
        let ideas = cats.iter().find(|c| c.category == Category::Suggestion).unwrap();
        assert_eq!(ideas.avg_rating, None);
    }

    #[test]
    fn summary_completion_rate() {
        let stats = UserStats {
            total: 3,
            open: 1,
            in_progress: 0,
            completed: 1,
            closed: 1,
            avg_rating: None,
            ..UserStats::default()
        };
        let summary = Summary::from(&stats);
        assert_eq!(summary.completion_rate, 67);
        assert_eq!(summary.active_issues, 1);
        assert_eq!(Summary::from(&UserStats::default()).completion_rate, 0);
    }
}
