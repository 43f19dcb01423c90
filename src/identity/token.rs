//! Signed, purpose-tagged, time-limited tokens for email workflows.
//!
//! A token is `base64url(claims json) . base64url(hmac-sha256 tag)`, a single
//! opaque string safe for URL path segments. The MAC key is derived once from
//! the configured signing secret; rotating the secret invalidates every
//! outstanding token, which is acceptable at these TTLs.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;

/// The single use a token is minted for. Verification rejects a token
/// presented for any other purpose, even when it is otherwise well-formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Confirm,
    Reset,
    ChangeEmail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub purpose: TokenPurpose,
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token purpose")]
    WrongPurpose,
}

/// Issues and verifies purpose-tagged tokens with a process-wide secret.
pub struct TokenCodec {
    key: [u8; 32],
    default_ttl_seconds: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString, default_ttl_seconds: i64) -> Self {
        // Digesting the secret gives a fixed-size MAC key regardless of how
        // long the configured string is.
        let mut hasher = Sha256::new();
        hasher.update(secret.expose_secret().as_bytes());
        Self {
            key: hasher.finalize().into(),
            default_ttl_seconds,
        }
    }

    /// Mint a token for `purpose` bound to `sub`.
    ///
    /// `ttl_seconds` overrides the default TTL when present.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if the claims fail to serialize.
    pub fn issue(
        &self,
        purpose: TokenPurpose,
        sub: Uuid,
        extra: BTreeMap<String, String>,
        ttl_seconds: Option<i64>,
    ) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_seconds);
        let claims = TokenClaims {
            purpose,
            sub,
            extra,
            iat: now,
            exp: now.saturating_add(ttl),
        };

        let body = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let tag = self.mac().chain_update(&body).finalize().into_bytes();

        let body_b64 = Base64UrlUnpadded::encode_string(&body);
        let tag_b64 = Base64UrlUnpadded::encode_string(&tag);
        Ok(format!("{body_b64}.{tag_b64}"))
    }

    /// Verify a token against the current clock.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_at`].
    pub fn verify(
        &self,
        token: &str,
        expected_purpose: TokenPurpose,
    ) -> Result<TokenClaims, TokenError> {
        self.verify_at(
            token,
            expected_purpose,
            OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    /// Verify a token as of `now_unix_seconds`.
    ///
    /// A token stays valid through its `exp` second and is expired strictly
    /// after it.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`] when the structure, encoding, or claims
    ///   fail to parse,
    /// - [`TokenError::BadSignature`] when the MAC does not match,
    /// - [`TokenError::Expired`] when `now > exp`,
    /// - [`TokenError::WrongPurpose`] when the purpose tag differs from
    ///   `expected_purpose`.
    pub fn verify_at(
        &self,
        token: &str,
        expected_purpose: TokenPurpose,
        now_unix_seconds: i64,
    ) -> Result<TokenClaims, TokenError> {
        let (body_b64, tag_b64) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let body = Base64UrlUnpadded::decode_vec(body_b64).map_err(|_| TokenError::Malformed)?;
        let tag = Base64UrlUnpadded::decode_vec(tag_b64).map_err(|_| TokenError::Malformed)?;

        // Constant-time comparison; the MAC is recomputed over the claimed
        // payload bytes, never over anything the claims say about themselves.
        self.mac()
            .chain_update(&body)
            .verify_slice(&tag)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: TokenClaims =
            serde_json::from_slice(&body).map_err(|_| TokenError::Malformed)?;

        if now_unix_seconds > claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.purpose != expected_purpose {
            return Err(TokenError::WrongPurpose);
        }

        Ok(claims)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length")
    }
}
