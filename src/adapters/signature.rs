//! HMAC-SHA256 helpers shared by the webhook validators.

use {
    crate::domain::error::PipelineError,
    base64::{Engine, engine::general_purpose::STANDARD},
    hmac::{Hmac, Mac},
    sha2::Sha256,
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &[u8], payload: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| PipelineError::InvalidSignature(format!("unusable secret: {e}")))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Lower-case hex HMAC-SHA256 of `payload`.
pub fn hex_digest(secret: &[u8], payload: &[u8]) -> Result<String, PipelineError> {
    mac(secret, payload).map(hex::encode)
}

/// Standard base64 HMAC-SHA256 of `payload` (CloudPayments `Content-HMAC`).
pub fn base64_digest(secret: &[u8], payload: &[u8]) -> Result<String, PipelineError> {
    mac(secret, payload).map(|bytes| STANDARD.encode(bytes))
}

/// Constant-time comparison of two presented digests. Length mismatch is a
/// plain mismatch.
pub fn digests_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.trim().as_bytes()).into()
}

pub fn verify_hex(secret: &[u8], payload: &[u8], presented: &str) -> Result<(), PipelineError> {
    let expected = hex_digest(secret, payload)?;
    if digests_match(&expected, presented) {
        Ok(())
    } else {
        Err(PipelineError::InvalidSignature("hex digest mismatch".into()))
    }
}

pub fn verify_base64(secret: &[u8], payload: &[u8], presented: &str) -> Result<(), PipelineError> {
    let expected = base64_digest(secret, payload)?;
    if digests_match(&expected, presented) {
        Ok(())
    } else {
        Err(PipelineError::InvalidSignature("base64 digest mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4231, test case 2.
    const KEY: &[u8] = b"Jefe";
    const DATA: &[u8] = b"what do ya want for nothing?";
    const DIGEST: &str = "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843";

    #[test]
    fn hex_digest_matches_rfc_vector() {
        assert_eq!(hex_digest(KEY, DATA).unwrap(), DIGEST);
    }

    #[test]
    fn verify_hex_accepts_and_rejects() {
        assert!(verify_hex(KEY, DATA, DIGEST).is_ok());
        assert!(verify_hex(KEY, b"tampered", DIGEST).is_err());
        assert!(verify_hex(KEY, DATA, "invalid-signature").is_err());
        assert!(verify_hex(KEY, DATA, "").is_err());
    }

    #[test]
    fn base64_is_same_mac_differently_encoded() {
        let b64 = base64_digest(KEY, DATA).unwrap();
        let raw = STANDARD.decode(&b64).unwrap();
        assert_eq!(hex::encode(raw), DIGEST);
        assert!(verify_base64(KEY, DATA, &b64).is_ok());
        assert!(verify_base64(b"other", DATA, &b64).is_err());
    }
}
