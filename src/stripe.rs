// src/stripe.rs

use std::time::Duration;

use anyhow::anyhow;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

/// Signed events older than this are refused.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: String,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("no matching signature")]
    Mismatch,
}

pub struct StripeClient {
    client: reqwest::Client,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    api_base: String,
}

impl StripeClient {
    pub fn new(cfg: &StripeConfig, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            secret_key: cfg.secret_key.clone(),
            webhook_secret: cfg.webhook_secret.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        booking_id: Uuid,
    ) -> ApiResult<PaymentIntent> {
        let secret = self
            .secret_key
            .as_deref()
            .ok_or_else(|| ApiError::Unexpected(anyhow!("stripe secret key is not configured")))?;
        let amount = amount_minor.to_string();
        let booking = booking_id.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("metadata[bookingId]", booking.as_str()),
            ("automatic_payment_methods[enabled]", "true"),
        ];
        let intent = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(secret)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::Unexpected(anyhow!("stripe request failed: {e}")))?
            .json::<PaymentIntent>()
            .await
            .map_err(|e| ApiError::Unexpected(anyhow!("stripe response unreadable: {e}")))?;
        Ok(intent)
    }

    pub fn verify_webhook(&self, payload: &[u8], header: &str, now: i64) -> ApiResult<()> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| ApiError::Unexpected(anyhow!("stripe webhook secret is not configured")))?;
        verify_signature(secret, payload, header, now, SIGNATURE_TOLERANCE_SECS)
            .map_err(|e| ApiError::Validation(format!("Webhook error: {e}")))
    }
}

/// Amount in the currency's minor unit.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = candidates
        .into_iter()
        .filter_map(decode_hex)
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, t: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{t}.").as_bytes());
        mac.update(payload);
        mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
    }

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"payment_intent.succeeded"}"#;

    #[test]
    fn accepts_valid_signature() {
        let t = 1_700_000_000;
        let header = format!("t={t},v1={}", sign(SECRET, t, BODY));
        assert_eq!(verify_signature(SECRET, BODY, &header, t + 10, 300), Ok(()));
    }

    #[test]
    fn accepts_any_matching_v1() {
        let t = 1_700_000_000;
        let header = format!("t={t},v1=00ff,v1={}", sign(SECRET, t, BODY));
        assert!(verify_signature(SECRET, BODY, &header, t, 300).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let t = 1_700_000_000;
        let header = format!("t={t},v1={}", sign(SECRET, t, BODY));
        assert_eq!(
            verify_signature(SECRET, b"{}", &header, t, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_and_malformed() {
        let t = 1_700_000_000;
        let header = format!("t={t},v1={}", sign(SECRET, t, BODY));
        assert_eq!(verify_signature(SECRET, BODY, &header, t + 301, 300), Err(SignatureError::Stale));
        assert_eq!(verify_signature(SECRET, BODY, "v1=abcd", t, 300), Err(SignatureError::Malformed));
        assert_eq!(verify_signature(SECRET, BODY, "t=1", 1, 300), Err(SignatureError::Malformed));
    }

    #[test]
    fn extreme_timestamps_are_stale() {
        let header = format!("t={},v1=00", i64::MIN);
        assert_eq!(verify_signature(SECRET, BODY, &header, 1_700_000_000, 300), Err(SignatureError::Stale));
        let header = format!("t={},v1=00", i64::MAX);
        assert_eq!(verify_signature(SECRET, BODY, &header, i64::MIN, 300), Err(SignatureError::Stale));
    }

    #[test]
    fn hex_decoding() {
        assert_eq!(decode_hex("00ff10"), Some(vec![0, 255, 16]));
        assert_eq!(decode_hex("abc"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn minor_units_round() {
        assert_eq!(to_minor_units(500.0), 50_000);
        assert_eq!(to_minor_units(19.99), 1_999);
    }

    #[test]
    fn parses_succeeded_event() {
        let raw = r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","metadata":{"bookingId":"b"}}}}"#;
        let ev: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(ev.kind, "payment_intent.succeeded");
        assert_eq!(ev.data.object.metadata.get("bookingId").map(String::as_str), Some("b"));
    }
}
