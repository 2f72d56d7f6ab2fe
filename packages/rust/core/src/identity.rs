//! Who is making a request, as reported by the upstream auth provider.

use codestep_shared::{CodestepError, Result};

/// The requesting user. `user_id` is `None` for anonymous requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    /// From the user's profile metadata.
    pub is_admin: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_admin: true,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The user id, or [`CodestepError::Unauthorized`] for private operations.
    pub fn require_user(&self) -> Result<&str> {
        self.user_id()
            .ok_or_else(|| CodestepError::Unauthorized("sign in required".into()))
    }
}
