//! JWT access token issuance/verification and opaque refresh token
//! generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use warden_core::models::user::User;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user ID (UUID string).
    pub sub: String,
    pub role: String,
    pub aud: String,
    /// Tenant ID (UUID string).
    pub tenant_id: String,
    /// Organization ID, when the user belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Session the access token was minted for.
    pub session_id: String,
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// Issue a signed EdDSA (Ed25519) JWT access token for `user` in
/// `session_id`.
pub fn issue_access_token(
    user: &User,
    session_id: Uuid,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let exp = i64::try_from(config.access_token_lifetime_secs)
        .ok()
        .and_then(|lifetime| now.checked_add(lifetime))
        .ok_or_else(|| AuthError::Config("access token lifetime out of range".into()))?;
    let claims = AccessTokenClaims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        aud: config.jwt_audience.clone(),
        tenant_id: user.tenant_id.to_string(),
        org_id: user.organization_id.map(|id| id.to_string()),
        session_id: session_id.to_string(),
        iss: config.jwt_issuer.clone(),
        iat: now,
        exp,
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_ed_pem(config.jwt_private_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad private key: {e}")))?;

    let header = Header::new(Algorithm::EdDSA);
    jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify an EdDSA JWT access token.
pub fn decode_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<AccessTokenClaims, AuthError> {
    let key = DecodingKey::from_ed_pem(config.jwt_public_key_pem.as_bytes())
        .map_err(|e| AuthError::Crypto(format!("bad public key: {e}")))?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_audience(&[&config.jwt_audience]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

    jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

/// Validated JWT claims: a newtype proving the token was verified.
#[derive(Debug, Clone)]
pub struct ValidatedClaims(pub AccessTokenClaims);

impl ValidatedClaims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        parse_claim("sub", &self.0.sub)
    }

    pub fn tenant_id(&self) -> Result<Uuid, AuthError> {
        parse_claim("tenant_id", &self.0.tenant_id)
    }

    pub fn session_id(&self) -> Result<Uuid, AuthError> {
        parse_claim("session_id", &self.0.session_id)
    }
}

fn parse_claim(name: &str, value: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(value).map_err(|e| AuthError::TokenInvalid(format!("bad {name} claim: {e}")))
}

/// Validate a JWT access token (signature, expiry, issuer, audience)
/// and return the verified claims. Purely stateless.
pub fn validate_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<ValidatedClaims, AuthError> {
    decode_access_token(token, config).map(ValidatedClaims)
}

/// Generate a cryptographically random opaque refresh token
/// (32 bytes → base64url-encoded, no padding).
pub fn generate_refresh_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a raw refresh token, base64url-encoded.
///
/// This is the value stored as `refresh_token.token` and `parent`; the
/// raw token only ever exists on the client.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
