use crate::application_port::*;
use crate::domain_model::fingerprint;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves the caller's identity from the access credential alone. Never
/// touches the refresh store and never fails the request: whether an
/// unauthenticated caller is acceptable is decided by the route.
pub struct Authenticator {
    token_issuer: Arc<dyn TokenIssuer>,
}

impl Authenticator {
    pub fn new(token_issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { token_issuer }
    }

    pub fn resolve(&self, access_token: Option<&str>) -> AuthState {
        let token = match access_token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return AuthState::Unauthenticated,
        };

        match self.token_issuer.validate(token) {
            Ok(verified) => {
                debug!(user_id = %verified.identity.user_id, "access credential accepted");
                AuthState::Authenticated(verified.identity)
            }
            Err(e @ TokenError::ExpiredCredential) => {
                debug!(kind = e.kind(), "access credential rejected");
                AuthState::Unauthenticated
            }
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    credential = %fingerprint(token),
                    "access credential rejected"
                );
                AuthState::Unauthenticated
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::JwtHs256Issuer;
    use crate::domain_model::{UserId, UserIdentity};
    use crate::domain_port::ManualClock;
    use std::time::Duration;

    fn setup() -> (Authenticator, Arc<dyn TokenIssuer>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let issuer: Arc<dyn TokenIssuer> = Arc::new(JwtHs256Issuer::new(
            b"authenticator-test-key-0123456789abcdef",
            clock.clone(),
        ));
        (Authenticator::new(issuer.clone()), issuer, clock)
    }

    #[test]
    fn missing_or_blank_cookie_stays_unauthenticated() {
        let (auth, _, _) = setup();
        assert_eq!(auth.resolve(None), AuthState::Unauthenticated);
        assert_eq!(auth.resolve(Some("")), AuthState::Unauthenticated);
        assert_eq!(auth.resolve(Some("   ")), AuthState::Unauthenticated);
    }

    #[test]
    fn valid_credential_authenticates() {
        let (auth, issuer, _) = setup();
        let identity = UserIdentity::new(UserId(1), "test@test.com", "user");
        let issued = issuer.issue(&identity, Duration::from_secs(900)).unwrap();

        let state = auth.resolve(Some(&issued.token));
        assert_eq!(state.identity(), Some(&identity));
    }

    #[test]
    fn invalid_credential_stays_unauthenticated() {
        let (auth, _, _) = setup();
        assert_eq!(
            auth.resolve(Some("invalid.token")),
            AuthState::Unauthenticated
        );
    }

    #[test]
    fn expired_credential_is_not_reissued() {
        let (auth, issuer, clock) = setup();
        let identity = UserIdentity::new(UserId(1), "test@test.com", "user");
        let issued = issuer.issue(&identity, Duration::from_secs(1)).unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(auth.resolve(Some(&issued.token)), AuthState::Unauthenticated);
    }
}
