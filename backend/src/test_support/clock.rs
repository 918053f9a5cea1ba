//! Clock the tests move by hand, for daily caps, monthly resets and token
//! expiry.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

/// # Examples
/// ```
/// use backend::test_support::MutableClock;
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use mockable::Clock;
///
/// let eve = Utc.with_ymd_and_hms(2026, 6, 2, 23, 59, 0).unwrap();
/// let clock = MutableClock::new(eve);
/// clock.advance(TimeDelta::minutes(1));
/// assert_eq!(clock.utc().date_naive().to_string(), "2026-06-03");
/// ```
#[derive(Debug)]
pub struct MutableClock {
    now: Mutex<DateTime<Utc>>,
}

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.instant() += by;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.instant() = now;
    }

    fn instant(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.instant()
    }
}
