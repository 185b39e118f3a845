//! Password hashing and OTP codes.
//!
//! Passwords are stored as bcrypt hashes (`$2b$<cost>$...`). The cost comes
//! from `Config::password_hash_cost`; verification reads it from the hash.

use anyhow::{Context, Result};
use rand::Rng;

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).context("failed to hash password")
}

/// Check a password against a stored bcrypt hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

/// Six decimal digits, leading zeros kept.
pub fn generate_otp_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("s3cret", TEST_COST).unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert!(verify_password("s3cret", &stored));
        assert!(!verify_password("S3cret", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same", TEST_COST).unwrap();
        let b = hash_password("same", TEST_COST).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn cost_is_recorded_in_the_hash() {
        let stored = hash_password("pw", 5).unwrap();
        assert!(stored.starts_with("$2b$05$"));
        assert!(verify_password("pw", &stored));
    }

    #[test]
    fn out_of_range_cost_is_an_error() {
        assert!(hash_password("pw", 3).is_err());
        assert!(hash_password("pw", 32).is_err());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "nodollar"));
        assert!(!verify_password("x", "salt$deadbeef"));
    }

    #[test]
    fn otp_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
