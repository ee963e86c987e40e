//! Authentication context types.

use crate::db::{User, UserRole};

/// The identity a request is acting as. Resolved fresh from the database
/// on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    pub is_active: bool,
}

impl Principal {
    pub fn is_elevated(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

/// Outcome of the auth gate for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoCredentials,
    ValidAccess,
    Refreshed,
    ExpiredNoRefresh,
    RefreshFailed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NoCredentials => "no_credentials",
            SessionState::ValidAccess => "valid_access",
            SessionState::Refreshed => "refreshed",
            SessionState::ExpiredNoRefresh => "expired_no_refresh",
            SessionState::RefreshFailed => "refresh_failed",
        }
    }

    /// States that end in a forced logout on page routes.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            SessionState::ExpiredNoRefresh | SessionState::RefreshFailed
        )
    }
}

/// Per-request context placed in the request extensions by the auth gate.
/// Absent on exempt paths.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Option<Principal>,
    pub state: SessionState,
}
