use std::time::Duration;

use tokio::time::Instant;

use crate::errors::Error;

/// Rules bounding how often a refresh may be started directly.
#[derive(Clone, Debug)]
pub struct RefreshPolicy {
    /// How often the application checks whether the session needs a refresh.
    pub check_interval: Duration,
    /// Minimum spacing between the starts of two refresh attempts.
    pub throttle: Duration,
}

impl RefreshPolicy {
    pub fn new(check_interval: Duration, throttle: Duration) -> Result<Self, Error> {
        if check_interval.is_zero() {
            return Err(Error::Config("Refresh check interval must be > 0".into()));
        }
        if throttle > check_interval {
            return Err(Error::Config(
                "Refresh throttle cannot exceed the check interval".into(),
            ));
        }
        Ok(Self {
            check_interval,
            throttle,
        })
    }

    /// Throttle window is half the check interval.
    pub fn from_check_interval(check_interval: Duration) -> Result<Self, Error> {
        Self::new(check_interval, Self::derive_throttle(check_interval))
    }

    pub fn derive_throttle(check_interval: Duration) -> Duration {
        check_interval / 2
    }

    /// `Err(remaining)` when an attempt started at `last` still blocks a new one.
    pub fn admit(&self, last: Option<Instant>, now: Instant) -> Result<(), Duration> {
        match last {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.throttle {
                    Err(self.throttle - elapsed)
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}
