//! Persistent key management for the two signing schemes the oracle
//! exposes: secp256k1 ECDSA for the L402 price oracle, and Ed25519 for
//! the x402 sub-oracle. Both keys are generated once and reused across
//! restarts; both sign the SHA-256 digest of a message rather than the
//! message itself (for Ed25519 this is a deliberate divergence from the
//! scheme's usual contract, kept for wire compatibility with statements
//! already published under these keys).

use ed25519_dalek::Signer as Ed25519Signer;
use ed25519_dalek::Verifier as Ed25519Verifier;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature as K256Signature, SigningKey as K256SigningKey, VerifyingKey as K256VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::timestamp::UnixTimestamp;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed key material at {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Persistent secp256k1 + Ed25519 identity for this oracle instance.
#[derive(Clone)]
pub struct KeyStore {
    secp256k1: K256SigningKey,
    ed25519: ed25519_dalek::SigningKey,
}

impl KeyStore {
    /// Load both keys from `keys_dir`, generating and persisting (mode
    /// 0600) whichever are missing.
    pub fn load_or_generate(keys_dir: &Path) -> Result<Self, KeyStoreError> {
        fs::create_dir_all(keys_dir)?;
        let secp256k1 = load_or_generate_secp256k1(&keys_dir.join("oracle_secp256k1.key"))?;
        let ed25519 = load_or_generate_ed25519(&keys_dir.join("sho_ed25519.key"))?;
        Ok(Self { secp256k1, ed25519 })
    }

    pub fn secp256k1_compressed_pubkey_hex(&self) -> String {
        hex::encode(
            K256VerifyingKey::from(&self.secp256k1)
                .to_encoded_point(true)
                .as_bytes(),
        )
    }

    pub fn ed25519_pubkey_hex(&self) -> String {
        hex::encode(self.ed25519.verifying_key().to_bytes())
    }

    /// The raw secp256k1 private scalar, reused as the oracle's DLC
    /// attestation key (same key as the L402 price signature).
    pub fn secp256k1_scalar(&self) -> k256::Scalar {
        use k256::elliptic_curve::ff::PrimeField;
        k256::Scalar::from_repr(self.secp256k1.to_bytes()).expect("signing key is always a valid scalar")
    }

    /// Sign a SHA-256 digest with secp256k1 ECDSA, returning the raw
    /// (r, s) signature bytes.
    pub fn sign_secp256k1_digest(&self, digest: &[u8; 32]) -> Vec<u8> {
        let sig: K256Signature = self
            .secp256k1
            .sign_prehash(digest)
            .expect("32-byte digest is always a valid prehash input");
        sig.to_bytes().to_vec()
    }

    /// Sign a SHA-256 digest with Ed25519, treating the digest bytes
    /// themselves as the message (not the canonical statement they were
    /// derived from).
    pub fn sign_ed25519_digest(&self, digest: &[u8; 32]) -> Vec<u8> {
        self.ed25519.sign(digest).to_bytes().to_vec()
    }

    /// Load the persisted cross-certification statement at `path`, or
    /// generate and persist a fresh one if none exists yet, so the
    /// statement is signed once and reused rather than re-signed (with a
    /// new timestamp) on every read.
    pub fn load_or_create_cross_certification(
        &self,
        path: &Path,
        oracle_id: &str,
    ) -> Result<CrossCertification, KeyStoreError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            return serde_json::from_str(&contents).map_err(|e| KeyStoreError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
        let cert = self.cross_certify(oracle_id);
        let json = serde_json::to_string_pretty(&cert).expect("CrossCertification always serializes");
        fs::write(path, json)?;
        Ok(cert)
    }

    /// Build a fresh cross-certification statement proving both keys
    /// belong to the same oracle identity.
    pub fn cross_certify(&self, oracle_id: &str) -> CrossCertification {
        let timestamp = UnixTimestamp::now().to_rfc3339();
        let statement = format!(
            "Oracle cross-certification | oracle_id: {} | secp256k1: {} | ed25519: {} | timestamp: {}",
            oracle_id,
            self.secp256k1_compressed_pubkey_hex(),
            self.ed25519_pubkey_hex(),
            timestamp,
        );
        let digest: [u8; 32] = {
            use sha2::{Digest, Sha256};
            Sha256::digest(statement.as_bytes()).into()
        };
        CrossCertification {
            oracle_id: oracle_id.to_string(),
            statement,
            secp256k1_pubkey: self.secp256k1_compressed_pubkey_hex(),
            ed25519_pubkey: self.ed25519_pubkey_hex(),
            secp256k1_signature: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                self.sign_secp256k1_digest(&digest),
            ),
            ed25519_signature: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                self.sign_ed25519_digest(&digest),
            ),
            timestamp,
        }
    }
}

/// A statement signed by both the secp256k1 and Ed25519 oracle keys,
/// proving they belong to the same logical oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossCertification {
    pub oracle_id: String,
    pub statement: String,
    pub secp256k1_pubkey: String,
    pub ed25519_pubkey: String,
    pub secp256k1_signature: String,
    pub ed25519_signature: String,
    pub timestamp: String,
}

impl CrossCertification {
    pub fn verify(&self) -> bool {
        let digest: [u8; 32] = {
            use sha2::{Digest, Sha256};
            Sha256::digest(self.statement.as_bytes()).into()
        };

        let secp_ok = (|| -> Option<bool> {
            let pk_bytes = hex::decode(&self.secp256k1_pubkey).ok()?;
            let vk = K256VerifyingKey::from_sec1_bytes(&pk_bytes).ok()?;
            let sig_bytes = base64::Engine::decode(
                &base64::engine::general_purpose::STANDARD,
                &self.secp256k1_signature,
            )
            .ok()?;
            let sig = K256Signature::from_slice(&sig_bytes).ok()?;
            Some(vk.verify_prehash(&digest, &sig).is_ok())
        })()
        .unwrap_or(false);

        let ed_ok = (|| -> Option<bool> {
            let pk_bytes = hex::decode(&self.ed25519_pubkey).ok()?;
            let pk_arr: [u8; 32] = pk_bytes.try_into().ok()?;
            let vk = ed25519_dalek::VerifyingKey::from_bytes(&pk_arr).ok()?;
            let sig_bytes = base64::Engine::decode(
                &base64::engine::general_purpose::STANDARD,
                &self.ed25519_signature,
            )
            .ok()?;
            let sig_arr: [u8; 64] = sig_bytes.try_into().ok()?;
            let sig = ed25519_dalek::Signature::from_bytes(&sig_arr);
            Some(vk.verify(&digest, &sig).is_ok())
        })()
        .unwrap_or(false);

        secp_ok && ed_ok
    }
}

fn load_or_generate_secp256k1(path: &Path) -> Result<K256SigningKey, KeyStoreError> {
    if path.exists() {
        let hex_str = fs::read_to_string(path)?;
        let bytes = hex::decode(hex_str.trim()).map_err(|e| KeyStoreError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        K256SigningKey::from_slice(&bytes).map_err(|e| KeyStoreError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    } else {
        let key = K256SigningKey::random(&mut OsRng);
        write_key_file(path, &hex::encode(key.to_bytes()))?;
        Ok(key)
    }
}

fn load_or_generate_ed25519(path: &Path) -> Result<ed25519_dalek::SigningKey, KeyStoreError> {
    if path.exists() {
        let hex_str = fs::read_to_string(path)?;
        let bytes = hex::decode(hex_str.trim()).map_err(|e| KeyStoreError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| KeyStoreError::Malformed {
            path: path.to_path_buf(),
            reason: "expected 32-byte seed".to_string(),
        })?;
        Ok(ed25519_dalek::SigningKey::from_bytes(&arr))
    } else {
        let key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        write_key_file(path, &hex::encode(key.to_bytes()))?;
        Ok(key)
    }
}

fn write_key_file(path: &Path, hex_contents: &str) -> io::Result<()> {
    fs::write(path, hex_contents)?;
    set_owner_only_perms(path)
}

#[cfg(unix)]
fn set_owner_only_perms(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_perms(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_reloads_consistent_keys() {
        let dir = std::env::temp_dir().join(format!(
            "sovereign-oracle-keystore-test-{:?}",
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let ks1 = KeyStore::load_or_generate(&dir).unwrap();
        let pk1 = ks1.secp256k1_compressed_pubkey_hex();
        let ed1 = ks1.ed25519_pubkey_hex();

        let ks2 = KeyStore::load_or_generate(&dir).unwrap();
        assert_eq!(pk1, ks2.secp256k1_compressed_pubkey_hex());
        assert_eq!(ed1, ks2.ed25519_pubkey_hex());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn secp256k1_signature_verifies_over_digest() {
        let dir = std::env::temp_dir().join(format!(
            "sovereign-oracle-keystore-sig-test-{:?}",
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let ks = KeyStore::load_or_generate(&dir).unwrap();
        let digest = [7u8; 32];
        let sig_bytes = ks.sign_secp256k1_digest(&digest);
        let vk = K256VerifyingKey::from(&ks.secp256k1);
        let sig = K256Signature::from_slice(&sig_bytes).unwrap();
        assert!(vk.verify_prehash(&digest, &sig).is_ok());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn cross_certification_round_trips_verify() {
        let dir = std::env::temp_dir().join(format!(
            "sovereign-oracle-keystore-cc-test-{:?}",
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let ks = KeyStore::load_or_generate(&dir).unwrap();
        let cert = ks.cross_certify("mycelia-signal");
        assert!(cert.verify());
        let _ = fs::remove_dir_all(&dir);
    }
}
