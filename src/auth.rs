use std::fmt;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

/// Access token claims. `sub` is the user id the directory is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Ulid,
    pub role: Role,
    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken(String),
    Issue(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => f.write_str("missing bearer token"),
            AuthError::InvalidToken(e) => write!(f, "invalid token: {e}"),
            AuthError::Issue(e) => write!(f, "token issue failed: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// HS256 access tokens with a shared secret.
#[derive(Clone)]
pub struct JwtIdentity {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentity")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtIdentity {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, user_id: Ulid, role: Role, ttl: Duration) -> Result<String, AuthError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id,
            role,
            exp: chrono::Utc::now().timestamp().saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Verify the token carried by an `Authorization: Bearer ...` header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn issued_token_verifies() {
        let id = JwtIdentity::new("test-secret");
        let user = Ulid::new();
        let token = id.issue(user, Role::Admin, HOUR).unwrap();
        let claims = id.verify(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = JwtIdentity::new("a").issue(Ulid::new(), Role::Client, HOUR).unwrap();
        assert!(matches!(
            JwtIdentity::new("b").verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_rejected() {
        let id = JwtIdentity::new("s");
        let claims = Claims {
            sub: Ulid::new(),
            role: Role::Client,
            exp: chrono::Utc::now().timestamp() - 3600,
        };
        let token = encode(&Header::default(), &claims, &id.encoding).unwrap();
        assert!(id.verify(&token).is_err());
    }

    #[test]
    fn header_parsing() {
        let id = JwtIdentity::new("s");
        let token = id.issue(Ulid::new(), Role::Client, HOUR).unwrap();
        assert!(id.verify_header(Some(&format!("Bearer {token}"))).is_ok());
        assert!(matches!(id.verify_header(None), Err(AuthError::MissingToken)));
        assert!(matches!(
            id.verify_header(Some(&token)),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            id.verify_header(Some("Bearer ")),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
