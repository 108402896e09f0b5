use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

const MAX_REQUEST_AGE_SECS: u64 = 60 * 5;

/// Check `X-Slack-Signature` against the signing secret.
pub fn verify_slack(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), &'static str> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64;
    verify_slack_at(secret, headers, body, now)
}

pub fn verify_slack_at(
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
    now: i64,
) -> Result<(), &'static str> {
    let signature = headers
        .get("x-slack-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_signature")?;
    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_timestamp")?;
    let timestamp_value: i64 = timestamp.parse().map_err(|_| "invalid_timestamp")?;

    if now.abs_diff(timestamp_value) > MAX_REQUEST_AGE_SECS {
        return Err("stale_timestamp");
    }

    if signature != sign_slack_request(secret, timestamp, body)? {
        return Err("invalid_signature");
    }
    Ok(())
}

/// `v0=` + hex HMAC-SHA256 of `v0:<timestamp>:<body>`.
pub fn sign_slack_request(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, &'static str> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "bad_secret")?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}
