//! Per-digit Schnorr nonce commitment and attestation over secp256k1:
//! the oracle pre-commits nonce points `R_i = k_i·G` for each price
//! digit, then later publishes
//! `s_i = k_i + e_i·x (mod n)` where `e_i = SHA256(event_id/i/digit) mod n`
//! and `x` is the oracle's secp256k1 private scalar — the same key used
//! for L402 price attestations.

use k256::elliptic_curve::Field;
use k256::elliptic_curve::ff::PrimeField;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use rand_core::OsRng;
use sha2::{Digest, Sha256};

pub const NUM_DIGITS: usize = 5;

#[derive(Debug, Clone)]
pub struct NonceKeypair {
    pub secret: Scalar,
    /// 33-byte compressed curve point `k·G`.
    pub point_compressed: [u8; 33],
}

/// Generate one fresh per-digit nonce.
pub fn generate_nonce() -> NonceKeypair {
    let secret = Scalar::random(&mut OsRng);
    let point = ProjectivePoint::GENERATOR * secret;
    let encoded = AffinePoint::from(point).to_encoded_point(true);
    let mut point_compressed = [0u8; 33];
    point_compressed.copy_from_slice(encoded.as_bytes());
    NonceKeypair { secret, point_compressed }
}

/// `e_i = SHA256("{event_id}/{digit_index}/{digit_value}") mod n`.
pub fn digit_challenge(event_id: &str, digit_index: usize, digit_value: u8) -> Scalar {
    let msg = format!("{event_id}/{digit_index}/{digit_value}");
    let hash: [u8; 32] = Sha256::digest(msg.as_bytes()).into();
    <Scalar as Reduce<k256::U256>>::reduce_bytes(&FieldBytes::from(hash))
}

/// `s_i = k_i + e_i·x (mod n)`.
pub fn compute_s(nonce_secret: Scalar, challenge: Scalar, oracle_scalar: Scalar) -> Scalar {
    nonce_secret + challenge * oracle_scalar
}

/// Verify `s_i·G == R_i + e_i·P`.
pub fn verify_digit(
    s: Scalar,
    r_point_compressed: &[u8; 33],
    oracle_pubkey_compressed: &[u8; 33],
    challenge: Scalar,
) -> bool {
    let Some(r_point) = decode_point(r_point_compressed) else {
        return false;
    };
    let Some(oracle_point) = decode_point(oracle_pubkey_compressed) else {
        return false;
    };

    let lhs = ProjectivePoint::GENERATOR * s;
    let rhs = r_point + oracle_point * challenge;
    lhs == rhs
}

pub fn decode_point(compressed: &[u8; 33]) -> Option<ProjectivePoint> {
    let encoded = EncodedPoint::from_bytes(compressed).ok()?;
    let affine = AffinePoint::from_encoded_point(&encoded);
    if affine.is_some().into() {
        Some(ProjectivePoint::from(affine.unwrap()))
    } else {
        None
    }
}

pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    let repr = FieldBytes::from(*bytes);
    let opt = Scalar::from_repr(repr);
    if opt.is_some().into() { Some(opt.unwrap()) } else { None }
}

pub fn scalar_to_bytes(scalar: &Scalar) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&scalar.to_repr());
    out
}

/// Decompose a rounded non-negative integer price into exactly
/// [`NUM_DIGITS`] base-10 digits, zero-padded on the left.
pub fn decompose_price(price_rounded: i64) -> Option<[u8; NUM_DIGITS]> {
    if !(0..10i64.pow(NUM_DIGITS as u32)).contains(&price_rounded) {
        return None;
    }
    let s = format!("{price_rounded:0width$}", width = NUM_DIGITS);
    let mut digits = [0u8; NUM_DIGITS];
    for (i, c) in s.chars().enumerate() {
        digits[i] = c.to_digit(10).expect("zero-padded decimal string") as u8;
    }
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attest_then_verify_round_trips_for_every_digit() {
        let oracle_scalar = Scalar::random(&mut OsRng);
        let oracle_point = ProjectivePoint::GENERATOR * oracle_scalar;
        let oracle_pubkey: [u8; 33] = {
            let encoded = AffinePoint::from(oracle_point).to_encoded_point(true);
            let mut buf = [0u8; 33];
            buf.copy_from_slice(encoded.as_bytes());
            buf
        };

        let event_id = "BTCUSD-2026-08-01T15:00:00Z";
        let digits = decompose_price(68867).unwrap();

        for (i, &digit) in digits.iter().enumerate() {
            let nonce = generate_nonce();
            let challenge = digit_challenge(event_id, i, digit);
            let s = compute_s(nonce.secret, challenge, oracle_scalar);
            assert!(verify_digit(s, &nonce.point_compressed, &oracle_pubkey, challenge));
        }
    }

    #[test]
    fn verify_rejects_wrong_digit() {
        let oracle_scalar = Scalar::random(&mut OsRng);
        let oracle_point = ProjectivePoint::GENERATOR * oracle_scalar;
        let oracle_pubkey: [u8; 33] = {
            let encoded = AffinePoint::from(oracle_point).to_encoded_point(true);
            let mut buf = [0u8; 33];
            buf.copy_from_slice(encoded.as_bytes());
            buf
        };

        let event_id = "BTCUSD-2026-08-01T15:00:00Z";
        let nonce = generate_nonce();
        let challenge = digit_challenge(event_id, 0, 7);
        let s = compute_s(nonce.secret, challenge, oracle_scalar);

        let wrong_challenge = digit_challenge(event_id, 0, 8);
        assert!(!verify_digit(s, &nonce.point_compressed, &oracle_pubkey, wrong_challenge));
    }

    #[test]
    fn decompose_price_zero_pads_to_five_digits() {
        assert_eq!(decompose_price(42).unwrap(), [0, 0, 0, 4, 2]);
        assert_eq!(decompose_price(68867).unwrap(), [6, 8, 8, 6, 7]);
    }

    #[test]
    fn decompose_price_rejects_out_of_range() {
        assert!(decompose_price(100_000).is_none());
        assert!(decompose_price(-1).is_none());
    }
}
