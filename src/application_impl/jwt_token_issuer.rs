use crate::application_port::*;
use crate::domain_model::{UserId, UserIdentity};
use crate::domain_port::Clock;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String, // user id as string
    email: String,
    nickname: String,
    iat: i64,
    exp: i64,
}

pub struct JwtHs256Issuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl JwtHs256Issuer {
    pub fn new(signing_key: &[u8], clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is compared against the injected clock in `validate`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        JwtHs256Issuer {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            validation,
            clock,
        }
    }

    #[inline]
    fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
        DateTime::from_timestamp(secs, 0).ok_or(TokenError::MalformedCredential)
    }
}

impl TokenIssuer for JwtHs256Issuer {
    fn issue(&self, identity: &UserIdentity, ttl: Duration) -> Result<IssuedAccess, TokenError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| TokenError::Signing(e.to_string()))?;
        let iat_dt = self.clock.now();
        let exp_dt = iat_dt
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))?;

        let claims = AccessClaims {
            sub: identity.user_id.to_string(),
            email: identity.email.clone(),
            nickname: identity.display_name.clone(),
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedAccess {
            token,
            expires_at: Self::timestamp(claims.exp)?,
        })
    }

    fn validate(&self, token: &str) -> Result<VerifiedAccess, TokenError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::ExpiredCredential,
                _ => TokenError::MalformedCredential,
            },
        )?;
        let claims = data.claims;

        let expires_at = Self::timestamp(claims.exp)?;
        if self.clock.now() > expires_at {
            return Err(TokenError::ExpiredCredential);
        }

        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::MalformedCredential)?;

        Ok(VerifiedAccess {
            identity: UserIdentity::new(user_id, claims.email, claims.nickname),
            issued_at: Self::timestamp(claims.iat)?,
            expires_at,
        })
    }
}
