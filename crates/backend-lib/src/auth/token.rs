// ============================
// authority-backend/src/auth/token.rs
// ============================
//! Signed bearer tokens.
//!
//! A token is a compact JWS (`header.claims.signature`) whose claims are a
//! fixed-shape [`SessionClaims`] record. Tokens are authenticated with an
//! HMAC key supplied once at construction; expiry is checked against the
//! injected [`Clock`] with no leeway.
use std::{str::FromStr, sync::Arc};

use chrono::Duration;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::clock::Clock;

/// Why a token was not accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token could not be parsed: {0}")]
    Malformed(String),

    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token could not be signed: {0}")]
    Encoding(String),
}

/// Who the token speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Account id as a decimal string
    pub subject: String,
    pub is_admin: bool,
}

/// Claims carried inside every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionClaims {
    pub sub: String,
    pub is_admin: bool,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expires-at, unix seconds
    pub exp: i64,
}

impl SessionClaims {
    pub fn identity(&self) -> Identity {
        Identity {
            subject: self.sub.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// A freshly signed token together with the claims it carries
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// Signs and verifies [`SessionClaims`]
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

/// Parse an algorithm name, accepting only the HMAC family
pub fn parse_algorithm(name: &str) -> Result<Algorithm, TokenError> {
    let algorithm = Algorithm::from_str(name)
        .map_err(|_| TokenError::Malformed(format!("unknown algorithm {name}")))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(TokenError::Malformed(format!(
            "algorithm {other:?} needs an asymmetric key; only HS256, HS384 and HS512 are supported"
        ))),
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], algorithm: Algorithm, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(algorithm);
        // expiry is checked against `clock`
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign `identity` for `ttl` from now
    pub fn sign(&self, identity: &Identity, ttl: Duration) -> Result<SignedToken, TokenError> {
        let now = self.clock.now();
        let claims = SessionClaims {
            sub: identity.subject.clone(),
            is_admin: identity.is_admin,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(SignedToken { token, claims })
    }

    /// Check the signature and expiry of `token` and return its claims
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                },
                ErrorKind::ExpiredSignature => TokenError::Expired,
                other => TokenError::Malformed(format!("{other:?}")),
            },
        )?;

        let claims = data.claims;
        if self.clock.now().timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    const KEY: &[u8] = b"test-signing-key-0123456789abcdef";

    fn codec_with(key: &[u8], clock: Arc<ManualClock>) -> TokenCodec {
        TokenCodec::new(key, Algorithm::HS256, clock)
    }

    fn alice() -> Identity {
        Identity {
            subject: "1".to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(KEY, clock.clone());

        let signed = codec.sign(&alice(), Duration::minutes(30)).unwrap();
        assert_eq!(signed.token.split('.').count(), 3);
        assert_eq!(signed.claims.exp - signed.claims.iat, 30 * 60);

        let claims = codec.verify(&signed.token).unwrap();
        assert_eq!(claims, signed.claims);
        assert_eq!(claims.identity(), alice());
    }

    #[test]
    fn test_expires_after_ttl() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(KEY, clock.clone());
        let signed = codec.sign(&alice(), Duration::minutes(30)).unwrap();

        clock.advance(Duration::minutes(30));
        assert!(codec.verify(&signed.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(codec.verify(&signed.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_key_is_invalid_signature() {
        let clock = Arc::new(ManualClock::starting_now());
        let signer = codec_with(KEY, clock.clone());
        let other = codec_with(b"a-completely-different-key", clock);

        let signed = signer.sign(&alice(), Duration::minutes(5)).unwrap();
        assert_eq!(other.verify(&signed.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(KEY, clock);
        let user = codec.sign(&alice(), Duration::minutes(5)).unwrap();
        let admin = codec
            .sign(&Identity { subject: "1".into(), is_admin: true }, Duration::minutes(5))
            .unwrap();

        // splice the admin payload onto the user's signature
        let user_parts: Vec<&str> = user.token.split('.').collect();
        let admin_parts: Vec<&str> = admin.token.split('.').collect();
        let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);
        assert_eq!(codec.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(KEY, clock);
        for token in ["", "abc", "a.b.c", "not a token at all"] {
            assert!(matches!(codec.verify(token), Err(TokenError::Malformed(_))), "{token}");
        }
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let hs512 = TokenCodec::new(KEY, Algorithm::HS512, clock.clone());
        let hs256 = codec_with(KEY, clock);
        let signed = hs512.sign(&alice(), Duration::minutes(5)).unwrap();
        assert_eq!(hs256.verify(&signed.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_unexpected_claims_rejected() {
        #[derive(Serialize)]
        struct Padded<'a> {
            sub: &'a str,
            is_admin: bool,
            iat: i64,
            exp: i64,
            role: &'a str,
        }

        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(KEY, clock.clone());
        let now = clock.now().timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Padded { sub: "1", is_admin: false, iat: now, exp: now + 60, role: "admin" },
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();
        assert!(matches!(codec.verify(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("HS256").unwrap(), Algorithm::HS256);
        assert_eq!(parse_algorithm("HS512").unwrap(), Algorithm::HS512);
        assert!(parse_algorithm("RS256").is_err());
        assert!(parse_algorithm("none").is_err());
    }
}
