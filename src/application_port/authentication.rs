use crate::domain_model::UserIdentity;

/// Per-request authentication outcome. `Authenticated` is terminal for the
/// request; there is no path back to `Unauthenticated` and no reissue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(UserIdentity),
}

impl AuthState {
    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            AuthState::Authenticated(identity) => Some(identity),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn into_identity(self) -> Option<UserIdentity> {
        match self {
            AuthState::Authenticated(identity) => Some(identity),
            AuthState::Unauthenticated => None,
        }
    }
}
