//! `v2.local` token sealing and opening.
//!
//! Layout: `v2.local.` + base64url(nonce || ciphertext || tag), optionally
//! followed by `.` + base64url(footer). The header, nonce, footer and an
//! implicit assertion are bound to the ciphertext through pre-authentication
//! encoding, so none of them can be swapped without failing decryption.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use super::{TokenError, TokenPayload};

/// Required symmetric key length in bytes.
pub const KEY_SIZE: usize = 32;

const HEADER: &str = "v2.local.";
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

/// Seals and opens token payloads with a fixed symmetric key.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: XChaCha20Poly1305,
}

impl TokenCodec {
    /// Create a codec for the given key. The key must be exactly
    /// [`KEY_SIZE`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, TokenError> {
        if key.len() != KEY_SIZE {
            return Err(TokenError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: key.len(),
            });
        }
        let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| {
            TokenError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: key.len(),
            }
        })?;
        Ok(Self { cipher })
    }

    /// Seal a payload with no footer or implicit assertion.
    pub fn encode(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        self.seal(payload, &[], &[])
    }

    /// Open a token produced by [`TokenCodec::encode`].
    pub fn decode(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.open(token, &[], &[])
    }

    /// Seal a payload. The footer travels in clear text after the body;
    /// the implicit assertion is authenticated but never transmitted.
    pub fn seal(
        &self,
        payload: &TokenPayload,
        footer: &[u8],
        implicit: &[u8],
    ) -> Result<String, TokenError> {
        let message =
            serde_json::to_vec(payload).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);

        let aad = pae(&[HEADER.as_bytes(), &nonce, footer, implicit]);
        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &message,
                    aad: &aad,
                },
            )
            .map_err(|_| TokenError::Encoding("encryption failed".into()))?;

        let mut body = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&ciphertext);

        let mut token = format!("{}{}", HEADER, URL_SAFE_NO_PAD.encode(body));
        if !footer.is_empty() {
            token.push('.');
            token.push_str(&URL_SAFE_NO_PAD.encode(footer));
        }
        Ok(token)
    }

    /// Open a token, checking that its footer matches `footer` and that it
    /// was sealed with the same implicit assertion.
    pub fn open(
        &self,
        token: &str,
        footer: &[u8],
        implicit: &[u8],
    ) -> Result<TokenPayload, TokenError> {
        let rest = token
            .strip_prefix(HEADER)
            .ok_or(TokenError::Malformed("unsupported header"))?;

        let (encoded_body, encoded_footer) = match rest.split_once('.') {
            Some((body, footer)) => (body, Some(footer)),
            None => (rest, None),
        };

        let token_footer = match encoded_footer {
            Some(value) => URL_SAFE_NO_PAD
                .decode(value)
                .map_err(|_| TokenError::Malformed("invalid footer encoding"))?,
            None => Vec::new(),
        };
        if token_footer != footer {
            return Err(TokenError::Malformed("footer mismatch"));
        }

        let body = URL_SAFE_NO_PAD
            .decode(encoded_body)
            .map_err(|_| TokenError::Malformed("invalid body encoding"))?;
        if body.len() < NONCE_SIZE + TAG_SIZE {
            return Err(TokenError::Malformed("token too short"));
        }

        let (nonce, ciphertext) = body.split_at(NONCE_SIZE);
        let aad = pae(&[HEADER.as_bytes(), nonce, footer, implicit]);
        let message = self
            .cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| TokenError::DecryptionFailed)?;

        serde_json::from_slice(&message).map_err(|_| TokenError::Malformed("invalid payload"))
    }
}

/// Pre-authentication encoding: the piece count followed by each piece
/// prefixed with its length, all lengths as little-endian u64 with the top
/// bit cleared.
fn pae(pieces: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&le64(pieces.len()));
    for piece in pieces {
        out.extend_from_slice(&le64(piece.len()));
        out.extend_from_slice(piece);
    }
    out
}

fn le64(n: usize) -> [u8; 8] {
    ((n as u64) & (u64::MAX >> 1)).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const KEY: &[u8] = b"01234567890123456789012345678901";

    fn codec() -> TokenCodec {
        TokenCodec::new(KEY).unwrap()
    }

    #[test]
    fn test_encode_and_decode() {
        let payload = TokenPayload::new("alice", Duration::minutes(5)).unwrap();
        let token = codec().encode(&payload).unwrap();

        assert!(token.starts_with("v2.local."));
        assert_eq!(codec().decode(&token).unwrap(), payload);
    }

    #[test]
    fn test_token_does_not_leak_claims() {
        let payload = TokenPayload::new("alice", Duration::minutes(5)).unwrap();
        let token = codec().encode(&payload).unwrap();
        assert!(!token.contains("alice"));
        assert!(!token.contains(&payload.id.to_string()));
    }

    #[test]
    fn test_nonce_differs_per_token() {
        let payload = TokenPayload::new("alice", Duration::minutes(5)).unwrap();
        let a = codec().encode(&payload).unwrap();
        let b = codec().encode(&payload).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_key_size() {
        for key in [&b""[..], &b"short"[..], &[0u8; 33][..]] {
            match TokenCodec::new(key) {
                Err(TokenError::InvalidKeySize { expected, actual }) => {
                    assert_eq!(expected, KEY_SIZE);
                    assert_eq!(actual, key.len());
                }
                _ => panic!("expected InvalidKeySize for {} byte key", key.len()),
            }
        }
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let other = TokenCodec::new(b"abcdefghijabcdefghijabcdefghijab").unwrap();
        let token = codec()
            .encode(&TokenPayload::new("alice", Duration::minutes(5)).unwrap())
            .unwrap();
        assert_eq!(other.decode(&token), Err(TokenError::DecryptionFailed));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec();
        for token in [
            "",
            "invalid-token",
            "v1.local.AAAA",
            "v2.public.AAAA",
            "v2.local.",
            "v2.local.!!!!",
            "v2.local.AAAA",
        ] {
            assert!(
                matches!(codec.decode(token), Err(TokenError::Malformed(_))),
                "expected Malformed for {:?}",
                token
            );
        }
    }

    #[test]
    fn test_single_bit_flip_never_verifies() {
        let codec = codec();
        let token = codec
            .encode(&TokenPayload::new("alice", Duration::minutes(5)).unwrap())
            .unwrap();

        for index in 0..token.len() {
            for bit in 0..7 {
                let mut bytes = token.clone().into_bytes();
                bytes[index] ^= 1 << bit;
                let tampered = String::from_utf8(bytes).unwrap();

                match codec.decode(&tampered) {
                    Err(TokenError::Malformed(_)) | Err(TokenError::DecryptionFailed) => {}
                    other => panic!(
                        "flipping bit {} at {} produced {:?}",
                        bit, index, other
                    ),
                }
            }
        }
    }

    #[test]
    fn test_footer_round_trip_and_binding() {
        let codec = codec();
        let payload = TokenPayload::new("alice", Duration::minutes(5)).unwrap();
        let token = codec.seal(&payload, b"kid-1", &[]).unwrap();

        assert_eq!(codec.open(&token, b"kid-1", &[]).unwrap(), payload);
        assert!(matches!(
            codec.open(&token, b"kid-2", &[]),
            Err(TokenError::Malformed(_))
        ));

        // Footer swapped in transit but caller expects the swapped value
        let (body, _) = token.rsplit_once('.').unwrap();
        let forged = format!("{}.{}", body, URL_SAFE_NO_PAD.encode(b"kid-2"));
        assert_eq!(
            codec.open(&forged, b"kid-2", &[]),
            Err(TokenError::DecryptionFailed)
        );
    }

    #[test]
    fn test_implicit_assertion_is_bound() {
        let codec = codec();
        let payload = TokenPayload::new("alice", Duration::minutes(5)).unwrap();
        let token = codec.seal(&payload, &[], b"device-a").unwrap();

        assert_eq!(codec.open(&token, &[], b"device-a").unwrap(), payload);
        assert_eq!(
            codec.open(&token, &[], b"device-b"),
            Err(TokenError::DecryptionFailed)
        );
        assert_eq!(codec.decode(&token), Err(TokenError::DecryptionFailed));
    }

    #[test]
    fn test_pae_encoding() {
        assert_eq!(pae(&[]), vec![0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            pae(&[b"test".as_slice()]),
            vec![1, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, b't', b'e', b's', b't']
        );
    }
}
