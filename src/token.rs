use rand::rngs::OsRng;
use rand::RngCore;

/// Produces opaque bearer secrets for magic links and session credentials.
///
/// Injected as a trait so tests can substitute a deterministic generator.
pub trait TokenGenerator: Send + Sync {
    /// Hex-encode `byte_length` cryptographically secure random bytes.
    fn generate(&self, byte_length: usize) -> String;
}

/// Generator backed by the operating system's CSPRNG. `OsRng` panics if
/// the entropy source fails, which is the intended behavior: there is no
/// recoverable path for a broken random source.
pub struct OsRngTokenGenerator;

impl TokenGenerator for OsRngTokenGenerator {
    fn generate(&self, byte_length: usize) -> String {
        let mut bytes = vec![0u8; byte_length];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_length_and_charset() {
        let generator = OsRngTokenGenerator;
        let token = generator.generate(32);
        // Hex doubles the byte length
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_unique() {
        let generator = OsRngTokenGenerator;
        let a = generator.generate(32);
        let b = generator.generate(32);
        assert_ne!(a, b);
    }
}
