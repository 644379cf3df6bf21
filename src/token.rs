//! Manage JSON Web Tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Bytes of `jti` entropy; hex encoding doubles the printed length.
const JTI_LENGTH: usize = 8;

/// The two token families issued by [`TokenManager`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Pieces of information asserted on a token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Identifies the expiration time on or after which the JWT must not
    /// be accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies principal that issued the JWT.
    pub iss: String,
    /// Unique identifier of this precise token.
    pub jti: String,
    /// User ID.
    pub sub: String,
    /// Either `access` or `refresh`; a refresh token is never accepted
    /// where an access token is expected, and vice versa.
    pub token_type: String,
}

/// Access and refresh tokens issued together.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and checks signed tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    issuer: String,
    access_ttl: u64,
    refresh_ttl: u64,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(
        issuer: &str,
        secret: &str,
        access_ttl: u64,
        refresh_ttl: u64,
    ) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_owned(),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue the access and refresh pair for one user.
    pub fn issue_pair(&self, user_id: &str) -> Result<CredentialPair> {
        Ok(CredentialPair {
            access: self.create(TokenKind::Access, user_id)?,
            refresh: self.create(TokenKind::Refresh, user_id)?,
        })
    }

    /// Create a token of the given kind.
    pub fn create(&self, kind: TokenKind, user_id: &str) -> Result<String> {
        let now = unix_now()?;
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let mut jti = [0u8; JTI_LENGTH];
        OsRng.fill_bytes(&mut jti);

        let claims = Claims {
            exp: now + ttl,
            iat: now,
            iss: self.issuer.clone(),
            jti: hex::encode(jti),
            sub: user_id.to_owned(),
            token_type: kind.as_str().to_owned(),
        };

        Ok(encode(
            &Header::new(self.algorithm),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Decode a token, checking signature, expiry, issuer and kind.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);

        let claims =
            decode::<Claims>(token, &self.decoding_key, &validation)?.claims;

        if claims.token_type != kind.as_str() {
            return Err(ServerError::Unauthorized);
        }

        Ok(claims)
    }
}

/// Current unix timestamp, in seconds.
pub(crate) fn unix_now() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn manager() -> TokenManager {
        TokenManager::new("https://localhost:8000/", SECRET, 900, 86_400)
    }

    #[test]
    fn test_create_and_decode() {
        let manager = manager();
        let token = manager.create(TokenKind::Access, "user-1").unwrap();
        let claims = manager.decode(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.iss, "https://localhost:8000/");
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.exp, claims.iat + 900);
        assert_eq!(claims.jti.len(), JTI_LENGTH * 2);
    }

    #[test]
    fn test_kind_is_enforced() {
        let manager = manager();
        let refresh = manager.create(TokenKind::Refresh, "user-1").unwrap();

        assert!(manager.decode(&refresh, TokenKind::Refresh).is_ok());
        assert!(manager.decode(&refresh, TokenKind::Access).is_err());
    }

    #[test]
    fn test_issuer_is_enforced() {
        let token = manager().create(TokenKind::Access, "user-1").unwrap();
        let other =
            TokenManager::new("https://elsewhere.test/", SECRET, 900, 86_400);

        assert!(other.decode(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_expired_token_is_refused() {
        let manager = manager();
        let now = unix_now().unwrap();

        // Craft an already-expired token, past the decoder's leeway.
        let claims = Claims {
            exp: now - 300,
            iat: now - 1_200,
            iss: "https://localhost:8000/".to_owned(),
            jti: "0".repeat(JTI_LENGTH * 2),
            sub: "user-1".to_owned(),
            token_type: "access".to_owned(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(manager.decode(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_tampered_token_is_refused() {
        let manager = manager();
        let token = manager.create(TokenKind::Access, "user-1").unwrap();
        let other = TokenManager::new(
            "https://localhost:8000/",
            "another-secret-another-secret-32b",
            900,
            86_400,
        );

        assert!(other.decode(&token, TokenKind::Access).is_err());
    }
}
