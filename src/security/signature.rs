//! Webhook signature verification
//!
//! The platform signs each delivery with HMAC-SHA256 over the raw request
//! body, hex-encoded, in the `x-vapi-signature` header. Verification runs
//! before the body is parsed; a rejected request never touches session state.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of checking an inbound delivery's signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature present and correct
    Verified,
    /// No secret configured; verification disabled
    SkippedNoSecret,
    /// Secret configured but the request carried no signature header.
    /// Accepted unverified, pending a policy decision upstream.
    UnsignedAccepted,
    /// Signature present but wrong
    Rejected,
}

impl SignatureCheck {
    /// Whether the request may proceed to parsing and state mutation
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Compute the expected signature for a body under a secret
/// (lowercase hex HMAC-SHA256)
///
/// # Panics
///
/// Never panics: HMAC-SHA256 accepts keys of any length.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an inbound delivery against the configured secret.
///
/// Comparison is constant-time via [`Mac::verify_slice`]. A `sha256=` prefix
/// on the header value is tolerated.
#[must_use]
pub fn verify(secret: Option<&str>, header: Option<&str>, body: &[u8]) -> SignatureCheck {
    let Some(secret) = secret else {
        return SignatureCheck::SkippedNoSecret;
    };

    let Some(header) = header else {
        return SignatureCheck::UnsignedAccepted;
    };

    let provided = header.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided).trim();
    if provided.is_empty() {
        return SignatureCheck::Rejected;
    }

    let Ok(provided_bytes) = hex::decode(provided) else {
        return SignatureCheck::Rejected;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return SignatureCheck::Rejected;
    };
    mac.update(body);

    if mac.verify_slice(&provided_bytes).is_ok() {
        SignatureCheck::Verified
    } else {
        SignatureCheck::Rejected
    }
}
