//! Process-local store used by tests and by `STORE_BACKEND=memory`.
//!
//! A single mutex guards both collections, so every guarded write checks
//! and mutates under the same lock.

use std::{
    cmp::Ordering,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::StoreError,
    feedback::{
        lifecycle::{self, rating_block},
        repo_types::{
            Feedback, FeedbackPatch, FeedbackQuery, FeedbackStore, NewFeedback, SortField,
            SortOrder, Status, StatusAdvance,
        },
        stats::{self, CategoryStats, UserStats},
    },
    users::repo_types::{NewUser, ProfileChanges, User, UserStore},
};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    // insertion order; later entries are newer
    feedback: Vec<Feedback>,
}

impl Inner {
    fn user_mut(&mut self, user_id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.user_id == user_id)
    }

    fn owned_mut(&mut self, owner: Uuid, feedback_id: Uuid) -> Option<&mut Feedback> {
        self.feedback
            .iter_mut()
            .find(|f| f.feedback_id == feedback_id && f.user_id == owner)
    }

    fn owned_by(&self, owner: Uuid) -> impl Iterator<Item = &Feedback> {
        self.feedback.iter().filter(move |f| f.user_id == owner)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Grants the administrator role. Returns whether the user exists.
    pub fn promote_admin(&self, user_id: Uuid) -> bool {
        match self.lock().user_mut(user_id) {
            Some(user) => {
                user.is_admin = true;
                true
            }
            None => false,
        }
    }
}

fn matches(f: &Feedback, q: &FeedbackQuery, needle: Option<&str>) -> bool {
    q.owner.map_or(true, |o| f.user_id == o)
        && q.status.map_or(true, |s| f.status == s)
        && q.category.map_or(true, |c| f.category == c)
        && q.priority.map_or(true, |p| f.priority == p)
        && needle.map_or(true, |n| {
            f.title.to_lowercase().contains(n) || f.feedback_text.to_lowercase().contains(n)
        })
}

fn compare(a: &Feedback, b: &Feedback, sort: SortField) -> Ordering {
    match sort {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Title => a.title.cmp(&b.title),
        SortField::Priority => a.priority.cmp(&b.priority),
        SortField::Status => a.status.cmp(&b.status),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            user_id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            is_active: true,
            is_admin: new.is_admin,
            login_count: 0,
            feedback_count: 0,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn record_login(&self, user_id: Uuid) -> Result<(), StoreError> {
        if let Some(user) = self.lock().user_mut(user_id) {
            let now = OffsetDateTime::now_utc();
            user.login_count += 1;
            user.last_login = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock();
        if let Some(email) = &changes.email {
            if inner
                .users
                .iter()
                .any(|u| &u.email == email && u.user_id != user_id)
            {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let Some(user) = inner.user_mut(user_id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn deactivate(&self, user_id: Uuid) -> Result<bool, StoreError> {
        match self.lock().user_mut(user_id) {
            Some(user) => {
                user.is_active = false;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn insert(&self, new: NewFeedback) -> Result<Feedback, StoreError> {
        let mut inner = self.lock();
        let now = OffsetDateTime::now_utc();
        let item = Feedback {
            feedback_id: Uuid::new_v4(),
            user_id: new.owner_id,
            user_name: new.owner_name,
            user_email: new.owner_email,
            title: new.title,
            feedback_text: new.feedback_text,
            category: new.category,
            priority: new.priority,
            status: Status::Open,
            rating: None,
            rating_comment: None,
            admin_response: None,
            admin_id: None,
            completed_at: None,
            closed_at: None,
            tags: new.tags,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        inner.feedback.push(item.clone());
        if let Some(owner) = inner.user_mut(item.user_id) {
            owner.feedback_count += 1;
            owner.updated_at = now;
        }
        Ok(item)
    }

    async fn list(&self, query: &FeedbackQuery) -> Result<(Vec<Feedback>, i64), StoreError> {
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let inner = self.lock();
        // newest first so the stable sort breaks ties the same way
        let mut hits: Vec<&Feedback> = inner
            .feedback
            .iter()
            .rev()
            .filter(|f| matches(f, query, needle.as_deref()))
            .collect();
        hits.sort_by(|a, b| {
            let primary = compare(a, b, query.sort);
            let primary = match query.order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = hits.len() as i64;
        let page = hits
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_owned(&self, owner: Uuid, feedback_id: Uuid) -> Result<Option<Feedback>, StoreError> {
        Ok(self
            .lock()
            .feedback
            .iter()
            .find(|f| f.feedback_id == feedback_id && f.user_id == owner)
            .cloned())
    }

    async fn find(&self, feedback_id: Uuid) -> Result<Option<Feedback>, StoreError> {
        Ok(self
            .lock()
            .feedback
            .iter()
            .find(|f| f.feedback_id == feedback_id)
            .cloned())
    }

    async fn update_if_open(
        &self,
        owner: Uuid,
        feedback_id: Uuid,
        patch: &FeedbackPatch,
    ) -> Result<Option<Feedback>, StoreError> {
        let mut inner = self.lock();
        match inner.owned_mut(owner, feedback_id) {
            Some(f) if f.status.is_owner_editable() => {
                lifecycle::apply_patch(f, patch, OffsetDateTime::now_utc());
                Ok(Some(f.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_if_open(&self, owner: Uuid, feedback_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(idx) = inner.feedback.iter().position(|f| {
            f.feedback_id == feedback_id && f.user_id == owner && f.status.is_owner_editable()
        }) else {
            return Ok(false);
        };
        inner.feedback.remove(idx);
        if let Some(user) = inner.user_mut(owner) {
            user.feedback_count = (user.feedback_count - 1).max(0);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(true)
    }

    async fn rate_if_completed(
        &self,
        owner: Uuid,
        feedback_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<Option<Feedback>, StoreError> {
        let mut inner = self.lock();
        match inner.owned_mut(owner, feedback_id) {
            Some(f) if rating_block(f).is_none() => {
                lifecycle::apply_rating(f, rating, comment, OffsetDateTime::now_utc());
                Ok(Some(f.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn advance_status(
        &self,
        feedback_id: Uuid,
        from: &[Status],
        advance: &StatusAdvance,
    ) -> Result<Option<Feedback>, StoreError> {
        let mut inner = self.lock();
        let Some(f) = inner
            .feedback
            .iter_mut()
            .find(|f| f.feedback_id == feedback_id && from.contains(&f.status))
        else {
            return Ok(None);
        };
        lifecycle::set_status(f, advance.to, OffsetDateTime::now_utc());
        f.admin_id = Some(advance.admin_id);
        if let Some(response) = &advance.admin_response {
            f.admin_response = Some(response.clone());
        }
        Ok(Some(f.clone()))
    }

    async fn user_stats(&self, owner: Uuid) -> Result<UserStats, StoreError> {
        Ok(stats::user_stats(self.lock().owned_by(owner)))
    }

    async fn category_stats(&self, owner: Uuid) -> Result<Vec<CategoryStats>, StoreError> {
        Ok(stats::category_stats(self.lock().owned_by(owner)))
    }

    async fn pending_ratings(&self, owner: Uuid) -> Result<Vec<Feedback>, StoreError> {
        let inner = self.lock();
        let mut pending: Vec<Feedback> = inner
            .owned_by(owner)
            .filter(|f| f.status == Status::Completed && f.rating.is_none())
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(pending)
    }
}
