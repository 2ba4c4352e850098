//! Webhook signing secrets in the Standard Webhooks format.
//!
//! Two secret shapes are accepted:
//!
//! - symmetric: `v1,whsec_<base64 key>` signs with HMAC-SHA256
//!   (`v1,<base64 mac>` signatures);
//! - asymmetric: `v1a,whpk_<base64 public key>:whsk_<base64 secret key>`
//!   signs with Ed25519 (`v1a,<base64 signature>` signatures).
//!
//! The signed content is `"{msg_id}.{timestamp}.{payload}"`.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

const SYMMETRIC_PREFIX: &str = "v1,whsec_";
const ASYMMETRIC_PREFIX: &str = "v1a,whpk_";
const SECRET_KEY_SEPARATOR: &str = ":whsk_";

/// Symmetric key material, base64: 24 to 64 byte keys.
const SYMMETRIC_MIN_LEN: usize = 32;
const SYMMETRIC_MAX_LEN: usize = 88;
/// One padded base64 Ed25519 key.
const ASYMMETRIC_MIN_LEN: usize = 44;

/// Replay window applied when the caller has no stricter policy.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Key material is decoded leniently: padding optional, trailing bits
/// ignored.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

fn check_key_part(part: &str, min: usize, max: Option<usize>, what: &str) -> Result<(), AuthError> {
    let len = part.chars().count();
    if len < min || max.is_some_and(|max| len > max) {
        return Err(AuthError::MalformedSecret(format!(
            "{what} has {len} characters"
        )));
    }
    if let Some(bad) = part.chars().find(|c| !is_base64_char(*c)) {
        return Err(AuthError::MalformedSecret(format!(
            "{what} contains {bad:?}"
        )));
    }
    Ok(())
}

/// Check the shape of a secret string without decoding it.
pub fn validate_secret(secret: &str) -> Result<(), AuthError> {
    if let Some(key) = secret.strip_prefix(SYMMETRIC_PREFIX) {
        return check_key_part(
            key,
            SYMMETRIC_MIN_LEN,
            Some(SYMMETRIC_MAX_LEN),
            "symmetric key",
        );
    }
    if let Some(rest) = secret.strip_prefix(ASYMMETRIC_PREFIX) {
        let (public, private) = rest.split_once(SECRET_KEY_SEPARATOR).ok_or_else(|| {
            AuthError::MalformedSecret("asymmetric secret lacks a whsk_ part".into())
        })?;
        check_key_part(public, ASYMMETRIC_MIN_LEN, None, "public key")?;
        check_key_part(private, ASYMMETRIC_MIN_LEN, None, "secret key")?;
        return Ok(());
    }
    Err(AuthError::MalformedSecret("unknown secret prefix".into()))
}

/// A parsed webhook secret.
#[derive(Clone)]
pub enum WebhookSecret {
    Symmetric(Vec<u8>),
    Asymmetric {
        signing: SigningKey,
        verifying: VerifyingKey,
    },
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric(_) => f.write_str("WebhookSecret::Symmetric(..)"),
            Self::Asymmetric { verifying, .. } => f
                .debug_struct("WebhookSecret::Asymmetric")
                .field("verifying", verifying)
                .finish_non_exhaustive(),
        }
    }
}

fn decode(part: &str, what: &str) -> Result<Vec<u8>, AuthError> {
    LENIENT
        .decode(part)
        .map_err(|e| AuthError::MalformedSecret(format!("{what} is not base64: {e}")))
}

impl WebhookSecret {
    /// Validate the shape and decode the key material.
    pub fn parse(secret: &str) -> Result<Self, AuthError> {
        validate_secret(secret)?;

        if let Some(key) = secret.strip_prefix(SYMMETRIC_PREFIX) {
            return Ok(Self::Symmetric(decode(key, "symmetric key")?));
        }

        // validate_secret guarantees the asymmetric shape from here on.
        let rest = &secret[ASYMMETRIC_PREFIX.len()..];
        let (public, private) = rest
            .split_once(SECRET_KEY_SEPARATOR)
            .ok_or_else(|| AuthError::MalformedSecret("missing whsk_ part".into()))?;

        let public = decode(public, "public key")?;
        let public: [u8; 32] = public.as_slice().try_into().map_err(|_| {
            AuthError::MalformedSecret(format!("public key is {} bytes", public.len()))
        })?;
        let verifying = VerifyingKey::from_bytes(&public)
            .map_err(|e| AuthError::MalformedSecret(format!("bad public key: {e}")))?;

        let private = decode(private, "secret key")?;
        let signing = match private.len() {
            32 => {
                let seed: [u8; 32] = private.as_slice().try_into().map_err(|_| {
                    AuthError::MalformedSecret("secret key is not 32 bytes".into())
                })?;
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let pair: [u8; 64] = private.as_slice().try_into().map_err(|_| {
                    AuthError::MalformedSecret("secret key is not 64 bytes".into())
                })?;
                SigningKey::from_keypair_bytes(&pair)
                    .map_err(|e| AuthError::MalformedSecret(format!("bad keypair: {e}")))?
            }
            n => {
                return Err(AuthError::MalformedSecret(format!(
                    "secret key is {n} bytes"
                )));
            }
        };

        if signing.verifying_key() != verifying {
            return Err(AuthError::MalformedSecret(
                "public key does not match secret key".into(),
            ));
        }

        Ok(Self::Asymmetric { signing, verifying })
    }

    /// Sign `payload` for delivery as message `msg_id` at `timestamp`
    /// (Unix seconds). Returns one `webhook-signature` entry.
    pub fn sign(&self, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<String, AuthError> {
        let content = signed_content(msg_id, timestamp, payload);
        match self {
            Self::Symmetric(key) => {
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| AuthError::Crypto(format!("HMAC key: {e}")))?;
                mac.update(&content);
                Ok(format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes())))
            }
            Self::Asymmetric { signing, .. } => {
                let signature = signing.sign(&content);
                Ok(format!("v1a,{}", STANDARD.encode(signature.to_bytes())))
            }
        }
    }

    /// Check a `webhook-signature` header against the payload.
    ///
    /// The header may carry several space-separated signatures; one match
    /// is enough. A timestamp further than `tolerance` from `now` fails
    /// before any signature is looked at.
    pub fn verify(
        &self,
        msg_id: &str,
        payload: &[u8],
        signature_header: &str,
        timestamp: i64,
        now: i64,
        tolerance: Duration,
    ) -> bool {
        if now.abs_diff(timestamp) > tolerance.as_secs() {
            return false;
        }

        let content = signed_content(msg_id, timestamp, payload);
        signature_header
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .any(|(version, encoded)| self.verify_one(version, encoded, &content))
    }

    fn verify_one(&self, version: &str, encoded: &str, content: &[u8]) -> bool {
        let Ok(raw) = STANDARD.decode(encoded) else {
            return false;
        };
        match (self, version) {
            (Self::Symmetric(key), "v1") => {
                let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
                    return false;
                };
                mac.update(content);
                mac.verify_slice(&raw).is_ok()
            }
            (Self::Asymmetric { verifying, .. }, "v1a") => Signature::from_slice(&raw)
                .map(|sig| verifying.verify_strict(content, &sig).is_ok())
                .unwrap_or(false),
            _ => false,
        }
    }
}

fn signed_content(msg_id: &str, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut content = format!("{msg_id}.{timestamp}.").into_bytes();
    content.extend_from_slice(payload);
    content
}
