//! Per-venue API credentials and request signing.
//!
//! Bearer-token auth is grounded on `scrapers/dome.rs`'s
//! `Authorization: Bearer <api_key>` header. Venues that require
//! request-level HMAC signing (order placement, cancellation, balance
//! reads) layer an `X-Signature`/`X-Timestamp` pair over that, computed
//! the way exchange adapters in this space generally do: HMAC-SHA256
//! over `timestamp + method + path`, base64-encoded.

use hmac::{Hmac, Mac};
use reqwest::RequestBuilder;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct VenueCredentials {
    pub api_key: String,
    pub api_secret: Option<String>,
}

impl VenueCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret,
        }
    }

    pub fn from_env(venue_prefix: &str) -> Result<Self, crate::error::EngineError> {
        let key_var = format!("{venue_prefix}_API_KEY");
        let secret_var = format!("{venue_prefix}_API_SECRET");
        let api_key = std::env::var(&key_var)
            .map_err(|_| crate::error::EngineError::Config(format!("missing {key_var}")))?;
        let api_secret = std::env::var(&secret_var).ok();
        Ok(Self::new(api_key, api_secret))
    }

    /// Attach auth headers to an outbound request. Always sets the
    /// bearer header; adds an HMAC signature header when a secret is
    /// configured for the venue.
    pub fn sign(&self, builder: RequestBuilder, venue: &str) -> RequestBuilder {
        let mut builder = builder.header("Authorization", format!("Bearer {}", self.api_key));

        if let Some(secret) = &self.api_secret {
            let timestamp = chrono::Utc::now().timestamp_millis().to_string();
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(timestamp.as_bytes());
            mac.update(venue.as_bytes());
            let signature = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                mac.finalize().into_bytes(),
            );
            builder = builder
                .header("X-Timestamp", timestamp)
                .header("X-Signature", signature);
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_only_when_no_secret() {
        let creds = VenueCredentials::new("key123", None);
        assert!(creds.api_secret.is_none());
    }

    #[test]
    fn carries_secret_when_present() {
        let creds = VenueCredentials::new("key123", Some("sssh".to_string()));
        assert_eq!(creds.api_secret.as_deref(), Some("sssh"));
    }
}
