//! Anti-replay `state` values for the authorization request
//!
//! The nonce is the hex-encoded SHA-256 digest of 1024 random bytes. The
//! random source is injected so tests can pin the value.

use sha2::{Digest, Sha256};

/// Number of random bytes hashed into one state value.
pub const STATE_ENTROPY_BYTES: usize = 1024;

/// A cryptographically secure source of random bytes.
pub trait EntropySource: Send + Sync {
    /// Fills `dest` entirely with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Entropy from the thread-local CSPRNG, seeded by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) {
        use rand::RngCore as _;
        rand::rng().fill_bytes(dest);
    }
}

/// Generates a fresh state value from `entropy`.
///
/// # Examples
///
/// ```
/// use seizmeia::auth::state::{new_state, OsEntropy};
///
/// let state = new_state(&OsEntropy);
/// assert_eq!(state.len(), 64);
/// assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn new_state(entropy: &dyn EntropySource) -> String {
    let mut buf = vec![0u8; STATE_ENTROPY_BYTES];
    entropy.fill_bytes(&mut buf);
    format!("{:x}", Sha256::digest(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEntropy(u8);

    impl EntropySource for FixedEntropy {
        fn fill_bytes(&self, dest: &mut [u8]) {
            dest.fill(self.0);
        }
    }

    #[test]
    fn test_state_is_sha256_of_entropy() {
        let expected = format!("{:x}", Sha256::digest([7u8; STATE_ENTROPY_BYTES]));
        assert_eq!(new_state(&FixedEntropy(7)), expected);
    }

    #[test]
    fn test_state_is_deterministic_for_fixed_source() {
        assert_eq!(new_state(&FixedEntropy(1)), new_state(&FixedEntropy(1)));
        assert_ne!(new_state(&FixedEntropy(1)), new_state(&FixedEntropy(2)));
    }

    #[test]
    fn test_os_entropy_states_differ() {
        let a = new_state(&OsEntropy);
        let b = new_state(&OsEntropy);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
