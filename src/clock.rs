use chrono::{DateTime, Utc};

/// Time source injected into every component that compares timestamps,
/// so expiry-boundary tests don't depend on wall-clock sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
