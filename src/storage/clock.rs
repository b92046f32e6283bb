use chrono::{Duration, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;

/// Source of wall-clock time for date directories, clip names and notifications
pub trait Clock: Send + Sync {
    /// Current local date and time
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the host's local zone or a fixed IANA zone
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    pub fn local() -> Self {
        Self { timezone: None }
    }

    pub fn with_timezone(timezone: Tz) -> Self {
        Self {
            timezone: Some(timezone),
        }
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}
