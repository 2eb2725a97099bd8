//! Slack request signing (`v0` scheme).
//!
//! Slack signs `v0:{timestamp}:{raw body}` with the app's signing secret and
//! sends `X-Slack-Signature: v0=<hex hmac>` plus `X-Slack-Request-Timestamp`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

const VERSION: &str = "v0";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("request timestamp is not a unix time")]
    MalformedTimestamp,
    #[error("request timestamp is outside the allowed window")]
    Stale,
    #[error("signature does not match")]
    Mismatch,
    #[error("signing secret cannot key an hmac")]
    InvalidSecret,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    /// `v0=<hex>` for the given timestamp and body.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let mac = self.mac(timestamp, body)?;
        Ok(format!("{VERSION}={}", encode_hex(mac.finalize().into_bytes().as_slice())))
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now_unix: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let sent_at: i64 =
            timestamp.trim().parse().map_err(|_| SignatureError::MalformedTimestamp)?;
        if (now_unix - sent_at).abs() > MAX_CLOCK_SKEW_SECS {
            return Err(SignatureError::Stale);
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(decode_hex)
            .ok_or(SignatureError::Mismatch)?;
        self.mac(timestamp, body)?.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(text.get(index..index + 2)?, 16).ok())
        .collect()
}
