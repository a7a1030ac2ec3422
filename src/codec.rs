//! Unpadded base64url helpers used for credential IDs, user handles and
//! challenges.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("base64url decode: {0}")]
    Decode(String),
    #[error("secure random source unavailable: {0}")]
    RandomSource(String),
}

/// Standard base64 with `+`→`-`, `/`→`_` and trailing `=` stripped.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .trim_end_matches('=')
        .replace('+', "-")
        .replace('/', "_")
}

/// Reverse of [`encode`]: swap the URL-safe characters back, re-pad to a
/// multiple of four and run the standard decoder.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    if text.contains(['+', '/']) {
        return Err(CodecError::Decode("non-url-safe character".into()));
    }
    let mut standard = text.replace('-', "+").replace('_', "/");
    // A single leftover character can never encode a whole byte.
    if standard.len() % 4 == 1 {
        return Err(CodecError::Decode(format!("impossible length {}", text.len())));
    }
    while standard.len() % 4 != 0 {
        standard.push('=');
    }
    STANDARD
        .decode(standard.as_bytes())
        .map_err(|e| CodecError::Decode(e.to_string()))
}

/// Fill `len` bytes from the OS secure random source.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CodecError::RandomSource(e.to_string()))?;
    Ok(buf)
}

/// `len` random bytes, base64url-encoded.
pub fn random_token(len: usize) -> Result<String, CodecError> {
    let mut bytes = random_bytes(len)?;
    let token = encode(&bytes);
    zeroize::Zeroize::zeroize(&mut bytes);
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"hello"), "aGVsbG8");
        assert_eq!(encode(b"hi"), "aGk");
        assert_eq!(encode(&[0xfb, 0xff]), "-_8");
    }

    #[test]
    fn roundtrip_every_length_up_to_64() {
        for len in 0..64usize {
            let data: Vec<u8> = (0..len).map(|i| (i * 37 % 256) as u8).collect();
            let text = encode(&data);
            assert!(!text.contains(['+', '/', '=']), "len {len}: {text}");
            assert_eq!(decode(&text).unwrap(), data, "len {len}");
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("aGVsbG8@").is_err());
        assert!(decode("!!!").is_err());
        assert!(decode("a").is_err());
        assert!(decode("ab+/").is_err());
    }

    #[test]
    fn random_token_length() {
        let t = random_token(16).unwrap();
        assert_eq!(t.len(), 22);
        assert_ne!(t, random_token(16).unwrap());
        assert_eq!(decode(&t).unwrap().len(), 16);
    }
}
