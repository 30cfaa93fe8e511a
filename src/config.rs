use std::env;

/// Tunables for the authentication core.
///
/// Built once in `main` and handed to the services explicitly, so tests
/// can run with deterministic values instead of reading process state.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Raw entropy per magic link token, before hex encoding.
    pub token_bytes: usize,
    /// Raw entropy per session credential. Independent of the magic
    /// link token length.
    pub session_token_bytes: usize,
    /// Default magic link lifetime in minutes.
    pub ttl_minutes: i64,
    /// Cap on the username suffix search. The search itself only needs
    /// actual uniqueness to terminate, but an unbounded loop is an
    /// availability risk, so it fails distinctly past this point.
    pub max_username_attempts: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_bytes: 32,
            session_token_bytes: 48,
            ttl_minutes: 15,
            max_username_attempts: 100,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_bytes: parse_env("MAGIC_LINK_TOKEN_BYTES", defaults.token_bytes),
            session_token_bytes: parse_env("SESSION_TOKEN_BYTES", defaults.session_token_bytes),
            ttl_minutes: parse_env("MAGIC_LINK_TTL_MINUTES", defaults.ttl_minutes),
            max_username_attempts: parse_env(
                "MAX_USERNAME_ATTEMPTS",
                defaults.max_username_attempts,
            ),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.token_bytes, 32);
        assert_eq!(config.session_token_bytes, 48);
        assert_eq!(config.ttl_minutes, 15);
        assert_eq!(config.max_username_attempts, 100);
    }
}
