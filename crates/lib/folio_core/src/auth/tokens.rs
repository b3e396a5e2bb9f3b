//! Opaque refresh token generation and hashing.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

/// Length of a generated refresh token.
pub const OPAQUE_TOKEN_LEN: usize = 64;

/// Generate a cryptographically random token (64 alphanumeric chars).
pub fn generate_opaque_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_tokens_are_alphanumeric_and_distinct() {
        let tokens: HashSet<String> = (0..256).map(|_| generate_opaque_token()).collect();
        assert_eq!(tokens.len(), 256);
        for t in &tokens {
            assert_eq!(t.len(), OPAQUE_TOKEN_LEN);
            assert!(t.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn hash_is_stable_hex_digest() {
        let h = hash_token("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(h, hash_token("abc"));
    }
}
