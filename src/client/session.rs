use std::sync::{PoisonError, RwLock};

use crate::users::dto::UserProfile;

/// Where a client keeps its bearer token and the profile it was issued for.
/// Injected into [`super::ApiClient`] so callers decide the storage.
pub trait SessionProvider: Send + Sync {
    fn token(&self) -> Option<String>;
    fn profile(&self) -> Option<UserProfile>;
    fn store(&self, token: String, profile: UserProfile);
    fn clear(&self);
}

#[derive(Default)]
struct Session {
    token: Option<String>,
    profile: Option<UserProfile>,
}

/// Session held for the lifetime of the process only.
#[derive(Default)]
pub struct MemorySession {
    inner: RwLock<Session>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionProvider for MemorySession {
    fn token(&self) -> Option<String> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).token.clone()
    }

    fn profile(&self) -> Option<UserProfile> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).profile.clone()
    }

    fn store(&self, token: String, profile: UserProfile) {
        let mut s = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        s.token = Some(token);
        s.profile = Some(profile);
    }

    fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Session::default();
    }
}
