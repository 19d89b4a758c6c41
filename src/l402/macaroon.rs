//! A minimal macaroon bearer credential: a payment-hash identifier and an
//! HMAC-SHA256 tag over it under a server-held secret. No caveats are ever
//! attached — the payment hash alone is enough to prove which invoice the
//! credential was minted for.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct Macaroon {
    pub location: String,
    pub identifier: [u8; 32],
    pub signature: [u8; 32],
}

#[derive(Debug, thiserror::Error)]
pub enum MacaroonError {
    #[error("malformed macaroon token")]
    Malformed,
    #[error("signature verification failed")]
    BadSignature,
}

impl Macaroon {
    /// Mint a macaroon binding `payment_hash` as the identifier, signed
    /// under `secret`.
    pub fn mint(secret: &[u8], location: &str, payment_hash: [u8; 32]) -> Self {
        let signature = hmac_tag(secret, &payment_hash);
        Self { location: location.to_string(), identifier: payment_hash, signature }
    }

    /// Serialize as `hex(identifier || signature)`, the bearer token placed
    /// in the `Authorization: L402 macaroon="...", ...` header.
    pub fn to_hex(&self) -> String {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&self.identifier);
        buf.extend_from_slice(&self.signature);
        hex::encode(buf)
    }

    /// Parse a bearer token back into identifier + signature. `location`
    /// is not carried on the wire since this service only ever mints
    /// macaroons for its own location.
    pub fn from_hex(location: &str, hex_str: &str) -> Result<Self, MacaroonError> {
        let bytes = hex::decode(hex_str).map_err(|_| MacaroonError::Malformed)?;
        if bytes.len() != 64 {
            return Err(MacaroonError::Malformed);
        }
        let mut identifier = [0u8; 32];
        let mut signature = [0u8; 32];
        identifier.copy_from_slice(&bytes[..32]);
        signature.copy_from_slice(&bytes[32..]);
        Ok(Self { location: location.to_string(), identifier, signature })
    }

    /// Recompute the tag under `secret` and compare in constant time.
    pub fn verify(&self, secret: &[u8]) -> Result<(), MacaroonError> {
        let expected = hmac_tag(secret, &self.identifier);
        if expected.ct_eq(&self.signature).into() {
            Ok(())
        } else {
            Err(MacaroonError::BadSignature)
        }
    }
}

fn hmac_tag(secret: &[u8], identifier: &[u8; 32]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(identifier);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_then_verify_round_trips() {
        let secret = b"server-secret";
        let payment_hash = [7u8; 32];
        let mac = Macaroon::mint(secret, "sovereign-oracle", payment_hash);
        assert!(mac.verify(secret).is_ok());

        let token = mac.to_hex();
        let parsed = Macaroon::from_hex("sovereign-oracle", &token).unwrap();
        assert_eq!(parsed.identifier, payment_hash);
        assert!(parsed.verify(secret).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let mac = Macaroon::mint(b"secret-a", "loc", [1u8; 32]);
        assert!(mac.verify(b"secret-b").is_err());
    }

    #[test]
    fn from_hex_rejects_malformed_token() {
        assert!(Macaroon::from_hex("loc", "not-hex").is_err());
        assert!(Macaroon::from_hex("loc", "aabb").is_err());
    }
}
