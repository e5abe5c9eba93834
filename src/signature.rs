//! `X-Hub-Signature` (HMAC-SHA1) verification

use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha1::Sha1;
use std::io::{self, Read};

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";
const SIGNATURE_PREFIX: &str = "sha1=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
}

/// Digest claimed by the sender, decoded from `sha1=<hex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Parse a header value. A missing header is as malformed as a bad one.
    pub fn parse(header: Option<&str>) -> Result<Self, SignatureError> {
        let digest = header
            .and_then(|h| h.strip_prefix(SIGNATURE_PREFIX))
            .filter(|d| !d.is_empty())
            .ok_or(SignatureError::Malformed)?;
        hex::decode(digest)
            .map(Self)
            .map_err(|_| SignatureError::Malformed)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Compute the `sha1=<hex>` header value for `body`.
#[cfg(test)]
pub(crate) fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).unwrap();
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Reader adapter that feeds every byte it yields into an HMAC.
struct HashingReader<R> {
    inner: R,
    mac: Option<HmacSha1>,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(mac) = self.mac.as_mut() {
            mac.update(&buf[..n]);
        }
        Ok(n)
    }
}

/// Outcome of decoding a body through the hashing tee.
#[derive(Debug)]
pub enum Verified<T> {
    Ok(T),
    Rejected(SignatureError),
    Unparseable(serde_json::Error),
}

/// Decode `body` as JSON while computing its HMAC in the same pass.
///
/// With no secret the digest is never computed and any signature passes.
/// JSON errors take precedence over signature errors.
pub fn decode_verified<T, R>(body: R, secret: Option<&[u8]>, signature: &Signature) -> Verified<T>
where
    T: DeserializeOwned,
    R: Read,
{
    let mac = match secret.map(HmacSha1::new_from_slice) {
        None => None,
        Some(Ok(mac)) => Some(mac),
        Some(Err(_)) => return Verified::Rejected(SignatureError::Mismatch),
    };
    let mut reader = HashingReader { inner: body, mac };

    let value: T = match serde_json::from_reader(&mut reader) {
        Ok(v) => v,
        Err(e) => return Verified::Unparseable(e),
    };

    match reader.mac {
        None => Verified::Ok(value),
        // verify_slice compares in constant time
        Some(mac) => match mac.verify_slice(signature.as_bytes()) {
            Ok(()) => Verified::Ok(value),
            Err(_) => Verified::Rejected(SignatureError::Mismatch),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const BODY: &[u8] = br#"{"ref":"refs/heads/main","repository":{"name":"site"}}"#;
    const KEY: &[u8] = b"key";

    #[test]
    fn parse_accepts_hex_digest() {
        let sig = Signature::parse(Some("sha1=0a0b")).unwrap();
        assert_eq!(sig.as_bytes(), &[0x0a_u8, 0x0b][..]);
    }

    #[test]
    fn parse_rejects_bad_forms() {
        let headers = [
            None,
            Some(""),
            Some("sha1="),
            Some("sha256=00"),
            Some("sha1=zz"),
            Some("sha1=abc"),
            Some("00ff"),
        ];
        for header in headers {
            assert_eq!(
                Signature::parse(header),
                Err(SignatureError::Malformed),
                "{:?}",
                header
            );
        }
    }

    #[test]
    fn correct_signature_verifies() {
        let header = sign(KEY, BODY);
        let sig = Signature::parse(Some(&header)).unwrap();
        match decode_verified::<Value, _>(BODY, Some(KEY), &sig) {
            Verified::Ok(v) => assert_eq!(v["ref"], "refs/heads/main"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn any_flipped_bit_is_a_mismatch() {
        let header = sign(KEY, BODY);
        let good = Signature::parse(Some(&header)).unwrap();
        for byte in 0..good.as_bytes().len() {
            for bit in 0..8 {
                let mut bytes = good.as_bytes().to_vec();
                bytes[byte] ^= 1 << bit;
                let flipped = Signature(bytes);
                assert!(matches!(
                    decode_verified::<Value, _>(BODY, Some(KEY), &flipped),
                    Verified::Rejected(SignatureError::Mismatch)
                ));
            }
        }
    }

    #[test]
    fn wrong_key_is_a_mismatch() {
        let sig = Signature::parse(Some(&sign(b"other", BODY))).unwrap();
        assert!(matches!(
            decode_verified::<Value, _>(BODY, Some(KEY), &sig),
            Verified::Rejected(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn no_secret_skips_digest_check() {
        let sig = Signature::parse(Some("sha1=00")).unwrap();
        assert!(matches!(
            decode_verified::<Value, _>(BODY, None, &sig),
            Verified::Ok(_)
        ));
    }

    #[test]
    fn bad_json_is_reported_before_signature() {
        let sig = Signature::parse(Some("sha1=00")).unwrap();
        assert!(matches!(
            decode_verified::<Value, _>(&b"{not json"[..], Some(KEY), &sig),
            Verified::Unparseable(_)
        ));
    }

    #[test]
    fn trailing_bytes_are_covered_by_digest() {
        let padded = [BODY, &b"\n\n"[..]].concat();
        let sig = Signature::parse(Some(&sign(KEY, BODY))).unwrap();
        assert!(matches!(
            decode_verified::<Value, _>(&padded[..], Some(KEY), &sig),
            Verified::Rejected(SignatureError::Mismatch)
        ));
    }
}
