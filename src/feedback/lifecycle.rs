//! Status rules for feedback items.
//!
//! ```text
//! open -> in-progress -> completed -> closed   (last edge: owner rating)
//! open -> closed                               (direct administrative close)
//! ```
//!
//! The owner may edit or delete only while `open`. `closed` is terminal.
//! `completed_at` and `closed_at` are stamped once, on first entry to the
//! respective status.

use time::OffsetDateTime;

use super::repo_types::{Feedback, FeedbackPatch, Status};

impl Status {
    pub fn is_owner_editable(self) -> bool {
        self == Status::Open
    }

    /// Statuses from which an administrator may move a record to `self`.
    pub fn admin_sources(self) -> &'static [Status] {
        match self {
            Status::Open => &[],
            Status::InProgress => &[Status::Open],
            Status::Completed => &[Status::InProgress],
            Status::Closed => &[Status::Open],
        }
    }
}

pub fn can_advance(from: Status, to: Status) -> bool {
    to.admin_sources().contains(&from)
}

/// Why a rating was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingBlock {
    AlreadyRated,
    NotCompleted(Status),
}

/// An existing rating wins over the status check, so a repeated rating of a
/// now-closed record reports `AlreadyRated`.
pub fn rating_block(f: &Feedback) -> Option<RatingBlock> {
    if f.rating.is_some() {
        Some(RatingBlock::AlreadyRated)
    } else if f.status != Status::Completed {
        Some(RatingBlock::NotCompleted(f.status))
    } else {
        None
    }
}

pub fn set_status(f: &mut Feedback, to: Status, now: OffsetDateTime) {
    f.status = to;
    match to {
        Status::Completed => {
            f.completed_at.get_or_insert(now);
        }
        Status::Closed => {
            f.closed_at.get_or_insert(now);
        }
        _ => {}
    }
    f.updated_at = now;
}

/// Caller must have checked [`rating_block`].
pub fn apply_rating(f: &mut Feedback, rating: i16, comment: Option<String>, now: OffsetDateTime) {
    f.rating = Some(rating);
    f.rating_comment = comment;
    f.completed_at.get_or_insert(now);
    set_status(f, Status::Closed, now);
}

pub fn apply_patch(f: &mut Feedback, patch: &FeedbackPatch, now: OffsetDateTime) {
    if let Some(title) = &patch.title {
        f.title = title.clone();
    }
    if let Some(text) = &patch.feedback_text {
        f.feedback_text = text.clone();
    }
    if let Some(category) = patch.category {
        f.category = category;
    }
    if let Some(priority) = patch.priority {
        f.priority = priority;
    }
    f.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::repo_types::{Category, Priority};
    use time::Duration;
    use uuid::Uuid;

    fn open_item() -> Feedback {
        let now = OffsetDateTime::now_utc() - Duration::hours(1);
        Feedback {
            feedback_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "A".into(),
            user_email: "a@x.com".into(),
            title: "Old".into(),
            feedback_text: "Original feedback text".into(),
            category: Category::General,
            priority: Priority::Medium,
            status: Status::Open,
            rating: None,
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
    fn administrative_edges() {
        assert!(can_advance(Status::Open, Status::InProgress));
        assert!(can_advance(Status::InProgress, Status::Completed));
        assert!(can_advance(Status::Open, Status::Closed));

        assert!(!can_advance(Status::Completed, Status::Closed));
        assert!(!can_advance(Status::Closed, Status::Open));
        assert!(!can_advance(Status::Open, Status::Completed));
        assert!(!can_advance(Status::InProgress, Status::Open));
        for s in Status::ALL {
            assert!(!can_advance(*s, Status::Open));
        }
    }

    #[test]
    fn only_open_is_owner_editable() {
        for s in Status::ALL {
            assert_eq!(s.is_owner_editable(), *s == Status::Open);
        }
    }

    #[test]
    fn completion_is_stamped_once() {
        let mut f = open_item();
        let first = OffsetDateTime::now_utc();
        set_status(&mut f, Status::Completed, first);
        set_status(&mut f, Status::Completed, first + Duration::minutes(5));
        assert_eq!(f.completed_at, Some(first));
        assert_eq!(f.closed_at, None);
    }

    #[test]
    fn rating_closes_and_keeps_completion_time() {
        let mut f = open_item();
        let completed = OffsetDateTime::now_utc() - Duration::minutes(10);
        set_status(&mut f, Status::InProgress, completed);
        set_status(&mut f, Status::Completed, completed);
        assert_eq!(rating_block(&f), None);

        let now = OffsetDateTime::now_utc();
        apply_rating(&mut f, 5, Some("great".into()), now);
        assert_eq!(f.status, Status::Closed);
        assert_eq!(f.rating, Some(5));
        assert_eq!(f.completed_at, Some(completed));
        assert_eq!(f.closed_at, Some(now));
        assert_eq!(rating_block(&f), Some(RatingBlock::AlreadyRated));
    }

    #[test]
    fn rating_requires_completed() {
        let f = open_item();
        assert_eq!(rating_block(&f), Some(RatingBlock::NotCompleted(Status::Open)));
    }

    #[test]
    fn patch_leaves_unset_fields() {
        let mut f = open_item();
        let patch = FeedbackPatch {
            title: Some("New".into()),
            ..FeedbackPatch::default()
        };
        apply_patch(&mut f, &patch, OffsetDateTime::now_utc());
        assert_eq!(f.title, "New");
        assert_eq!(f.feedback_text, "Original feedback text");
        assert_eq!(f.status, Status::Open);
    }
}
