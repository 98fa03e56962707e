use {
    crate::domain::error::PaymentError,
    chrono::{DateTime, Utc},
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// Webhooks older (or newer) than this are replays or clock trouble and
/// are rejected even when the MAC matches.
pub const REPLAY_WINDOW_SECS: i64 = 300;

/// Hex HMAC-SHA256 over `"{timestamp}.{body}"`. Shared by all provider
/// adapters and by tests building valid deliveries.
pub fn sign(secret: &str, timestamp: i64, body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify(
    secret: &str,
    body: &str,
    sig_header: &str,
    ts_header: &str,
    now: DateTime<Utc>,
) -> Result<(), PaymentError> {
    let timestamp: i64 = ts_header
        .trim()
        .parse()
        .map_err(|_| PaymentError::SignatureInvalid("timestamp header is not numeric".into()))?;

    let expected = sign(secret, timestamp, body);
    if !secure_eq(expected.as_bytes(), sig_header.trim().as_bytes()) {
        return Err(PaymentError::SignatureInvalid(
            "HMAC does not match payload".into(),
        ));
    }

    let skew = (now.timestamp() - timestamp).abs();
    if skew > REPLAY_WINDOW_SECS {
        return Err(PaymentError::StaleWebhook { skew_secs: skew });
    }

    Ok(())
}

/// Constant-time comparison so signature checks leak nothing through
/// timing.
fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn valid_signature_inside_window_passes() {
        let now = Utc::now();
        let ts = now.timestamp();
        let body = r#"{"orderId":"O1","status":"APPROVED"}"#;
        let sig = sign(SECRET, ts, body);
        assert!(verify(SECRET, body, &sig, &ts.to_string(), now).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let now = Utc::now();
        let ts = now.timestamp();
        let sig = sign(SECRET, ts, r#"{"amount":100000}"#);
        let err = verify(SECRET, r#"{"amount":999999}"#, &sig, &ts.to_string(), now).unwrap_err();
        assert!(matches!(err, PaymentError::SignatureInvalid(_)));
    }

    #[test]
    fn valid_signature_outside_window_is_stale() {
        let now = Utc::now();
        let ts = now.timestamp() - REPLAY_WINDOW_SECS - 1;
        let body = "{}";
        let sig = sign(SECRET, ts, body);
        let err = verify(SECRET, body, &sig, &ts.to_string(), now).unwrap_err();
        assert!(matches!(err, PaymentError::StaleWebhook { .. }));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let ts = now.timestamp();
        let sig = sign("whsec_other", ts, "{}");
        let err = verify(SECRET, "{}", &sig, &ts.to_string(), now).unwrap_err();
        assert!(matches!(err, PaymentError::SignatureInvalid(_)));
    }

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }
}
