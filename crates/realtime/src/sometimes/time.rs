use std::sync::RwLock;

use chrono::{Local, NaiveDate, NaiveDateTime};
use headway_transit::sync;

/// Source of "now" for date applicability and re-apply decisions.
pub trait TimeService: Send + Sync {
    fn current_time(&self) -> NaiveDateTime;

    fn current_date(&self) -> NaiveDate {
        self.current_time().date()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeService;

impl TimeService for SystemTimeService {
    fn current_time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedTimeService {
    now: RwLock<NaiveDateTime>,
}

impl FixedTimeService {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Noon on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_hms_opt(12, 0, 0).unwrap_or_default())
    }

    pub fn set(&self, now: NaiveDateTime) {
        *sync::write(&self.now) = now;
    }
}

impl TimeService for FixedTimeService {
    fn current_time(&self) -> NaiveDateTime {
        *sync::read(&self.now)
    }
}
