//! Service calendars: weekly patterns from `calendar.txt` overlaid with the
//! per-date exceptions of `calendar_dates.txt`.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::identifiers::AgencyAndId;

/// Resolves service ids to the dates on which they are active.
pub trait CalendarService: Send + Sync {
    fn is_active(&self, service_id: &AgencyAndId, date: NaiveDate) -> bool;

    /// Whether the service id is known and runs on at least one date.
    fn has_service_dates(&self, service_id: &AgencyAndId) -> bool;
}

/// Set of weekdays packed into one byte, bit 0 is Monday.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekdayFlags(u8);

impl WeekdayFlags {
    pub const NONE: Self = Self(0);
    pub const WEEKDAYS: Self = Self(0b001_1111);
    pub const WEEKEND: Self = Self(0b110_0000);
    pub const EVERY_DAY: Self = Self(0b111_1111);

    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        days.into_iter().fold(Self::NONE, |flags, day| flags.with(day))
    }

    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | Self::bit(day))
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }
}

/// GTFS `exception_type` of a `calendar_dates.txt` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalendarException {
    Added,
    Removed,
}

#[derive(Clone, Debug)]
pub struct ServiceCalendar {
    pub service_id: AgencyAndId,
    /// Inclusive range of the weekly pattern. `None` for services defined
    /// only through exceptions.
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub weekdays: WeekdayFlags,
    pub exceptions: HashMap<NaiveDate, CalendarException>,
}

impl ServiceCalendar {
    pub fn new(service_id: AgencyAndId, start: NaiveDate, end: NaiveDate, weekdays: WeekdayFlags) -> Self {
        Self {
            service_id,
            range: Some((start, end)),
            weekdays,
            exceptions: HashMap::new(),
        }
    }

    /// A service that runs only on the listed dates.
    pub fn on_dates(service_id: AgencyAndId, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            service_id,
            range: None,
            weekdays: WeekdayFlags::NONE,
            exceptions: dates
                .into_iter()
                .map(|date| (date, CalendarException::Added))
                .collect(),
        }
    }

    pub fn with_exception(mut self, date: NaiveDate, exception: CalendarException) -> Self {
        self.exceptions.insert(date, exception);
        self
    }

    pub fn runs_on(&self, date: NaiveDate) -> bool {
        match self.exceptions.get(&date) {
            Some(CalendarException::Added) => true,
            Some(CalendarException::Removed) => false,
            None => self
                .range
                .is_some_and(|(start, end)| (start..=end).contains(&date))
                && self.weekdays.contains(date.weekday()),
        }
    }

    pub fn has_any_date(&self) -> bool {
        if self
            .exceptions
            .values()
            .any(|exception| *exception == CalendarException::Added)
        {
            return true;
        }
        let Some((start, end)) = self.range else {
            return false;
        };
        if self.weekdays.is_empty() {
            return false;
        }
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| self.weekdays.contains(date.weekday()))
            .any(|date| self.runs_on(date))
    }
}

/// In-memory calendar keyed by service id.
#[derive(Clone, Debug, Default)]
pub struct CalendarData {
    calendars: HashMap<AgencyAndId, ServiceCalendar>,
}

impl CalendarData {
    pub fn new(calendars: impl IntoIterator<Item = ServiceCalendar>) -> Self {
        Self {
            calendars: calendars
                .into_iter()
                .map(|calendar| (calendar.service_id.clone(), calendar))
                .collect(),
        }
    }

    pub fn insert(&mut self, calendar: ServiceCalendar) -> Option<ServiceCalendar> {
        self.calendars.insert(calendar.service_id.clone(), calendar)
    }

    pub fn calendar(&self, service_id: &AgencyAndId) -> Option<&ServiceCalendar> {
        self.calendars.get(service_id)
    }

    /// Every service id running on `date`, sorted.
    pub fn service_ids_for_date(&self, date: NaiveDate) -> Vec<AgencyAndId> {
        let mut ids: Vec<_> = self
            .calendars
            .values()
            .filter(|calendar| calendar.runs_on(date))
            .map(|calendar| calendar.service_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl CalendarService for CalendarData {
    fn is_active(&self, service_id: &AgencyAndId, date: NaiveDate) -> bool {
        self.calendars
            .get(service_id)
            .is_some_and(|calendar| calendar.runs_on(date))
    }

    fn has_service_dates(&self, service_id: &AgencyAndId) -> bool {
        self.calendars
            .get(service_id)
            .is_some_and(ServiceCalendar::has_any_date)
    }
}
