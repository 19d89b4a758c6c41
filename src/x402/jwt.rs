//! CDP-style facilitator authentication. Builds a freshly minted JWT per
//! call, scoped to the exact request path, signed with ES256 (EC PEM key
//! material) or EdDSA (base64 Ed25519 seed) depending on what was
//! configured.
//!
//! The header carries a `nonce` claim the `jsonwebtoken` crate's fixed
//! `Header` struct has no field for, so the token is assembled by hand:
//! base64url-encode header and payload, sign the dot-joined string.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::Signer as Ed25519Signer;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::timestamp::UnixTimestamp;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("CDP key secret is not configured")]
    MissingSecret,
    #[error("malformed EC PEM key: {0}")]
    MalformedEcKey(String),
    #[error("malformed Ed25519 key secret: {0}")]
    MalformedEd25519Key(String),
}

enum SigningMaterial {
    Es256(p256::ecdsa::SigningKey),
    EdDsa(ed25519_dalek::SigningKey),
}

/// Loads the CDP key secret once and mints path-scoped JWTs on demand.
pub struct CdpSigner {
    key_id: String,
    material: SigningMaterial,
}

impl CdpSigner {
    pub fn new(key_id: String, key_secret: &str) -> Result<Self, JwtError> {
        let material = if key_secret.starts_with("-----BEGIN") {
            load_ec_key(key_secret)?
        } else {
            load_ed25519_key(key_secret)?
        };
        Ok(Self { key_id, material })
    }

    /// Mint a JWT authorizing one `POST {host}{path}` call, valid for two
    /// minutes.
    pub fn mint(&self, host: &str, path: &str) -> String {
        let now = UnixTimestamp::now().0;
        let uri = format!("POST {host}{path}");

        let alg = match &self.material {
            SigningMaterial::Es256(_) => "ES256",
            SigningMaterial::EdDsa(_) => "EdDSA",
        };
        let header = json!({
            "alg": alg,
            "typ": "JWT",
            "kid": self.key_id,
            "nonce": random_nonce_hex(),
        });
        let payload = json!({
            "sub": self.key_id,
            "iss": "cdp",
            "aud": ["cdp_service"],
            "nbf": now,
            "exp": now + 120,
            "uris": [uri],
        });

        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
        let signing_input = format!("{header_b64}.{payload_b64}");

        let signature_b64 = match &self.material {
            SigningMaterial::Es256(signing_key) => {
                let digest: [u8; 32] = Sha256::digest(signing_input.as_bytes()).into();
                let sig: p256::ecdsa::Signature = signing_key
                    .sign_prehash(&digest)
                    .expect("32-byte digest is always a valid prehash input");
                URL_SAFE_NO_PAD.encode(sig.to_bytes())
            }
            SigningMaterial::EdDsa(signing_key) => {
                let sig = signing_key.sign(signing_input.as_bytes());
                URL_SAFE_NO_PAD.encode(sig.to_bytes())
            }
        };

        format!("{signing_input}.{signature_b64}")
    }
}

fn random_nonce_hex() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn load_ec_key(pem: &str) -> Result<SigningMaterial, JwtError> {
    use p256::pkcs8::DecodePrivateKey;

    let secret_key = p256::SecretKey::from_sec1_pem(pem)
        .or_else(|_| p256::SecretKey::from_pkcs8_pem(pem))
        .map_err(|e| JwtError::MalformedEcKey(e.to_string()))?;
    Ok(SigningMaterial::Es256(p256::ecdsa::SigningKey::from(secret_key)))
}

fn load_ed25519_key(secret: &str) -> Result<SigningMaterial, JwtError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(secret.trim())
        .map_err(|e| JwtError::MalformedEd25519Key(e.to_string()))?;
    let seed: [u8; 32] = match decoded.len() {
        32 => decoded.try_into().unwrap(),
        64 => decoded[..32].try_into().unwrap(),
        n => return Err(JwtError::MalformedEd25519Key(format!("unexpected length {n}, expected 32 or 64"))),
    };
    Ok(SigningMaterial::EdDsa(ed25519_dalek::SigningKey::from_bytes(&seed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eddsa_jwt_has_three_dot_separated_segments() {
        let seed = [3u8; 32];
        let secret_b64 = base64::engine::general_purpose::STANDARD.encode(seed);
        let signer = CdpSigner::new("key-id".to_string(), &secret_b64).unwrap();
        let token = signer.mint("api.cdp.coinbase.com", "/platform/v2/x402/verify");
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn ed25519_seed_normalizes_from_64_byte_pair() {
        let seed = [5u8; 32];
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        let mut combined = seed.to_vec();
        combined.extend_from_slice(signing_key.verifying_key().as_bytes());
        let secret_b64 = base64::engine::general_purpose::STANDARD.encode(&combined);
        let signer = CdpSigner::new("key-id".to_string(), &secret_b64).unwrap();
        let token = signer.mint("api.cdp.coinbase.com", "/platform/v2/x402/settle");
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn rejects_malformed_secret() {
        assert!(CdpSigner::new("kid".to_string(), "not-base64!!").is_err());
    }
}
