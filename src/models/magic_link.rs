use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived lifecycle state of a magic link. `Redeemed` and `Expired` are
/// terminal; which one a token ends in depends on which condition is
/// observed first at redemption time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Pending,
    Redeemed,
    Expired,
}

/// One-time login token. The `token` column is a bearer secret: this
/// record is the only place the plaintext is held, and it is currently
/// stored in clear (hashing it at rest is a hardening opportunity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLink {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl MagicLink {
    /// State is never stored; it is derived from `is_used` and
    /// `expires_at`, with the used flag taking precedence.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.is_used {
            TokenState::Redeemed
        } else if self.expires_at <= now {
            TokenState::Expired
        } else {
            TokenState::Pending
        }
    }

    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == TokenState::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(expires_in_minutes: i64, is_used: bool, now: DateTime<Utc>) -> MagicLink {
        MagicLink {
            id: "id".to_string(),
            user_id: "user".to_string(),
            token: "token".to_string(),
            expires_at: now + Duration::minutes(expires_in_minutes),
            is_used,
            created_at: now,
        }
    }

    #[test]
    fn test_pending_state() {
        let now = Utc::now();
        assert_eq!(link(15, false, now).state(now), TokenState::Pending);
    }

    #[test]
    fn test_redeemed_state_wins_over_expiry() {
        let now = Utc::now();
        // A used token stays Redeemed even after its expiry passes
        assert_eq!(link(-5, true, now).state(now), TokenState::Redeemed);
    }

    #[test]
    fn test_expired_at_exact_boundary() {
        let now = Utc::now();
        assert_eq!(link(0, false, now).state(now), TokenState::Expired);
    }
}
