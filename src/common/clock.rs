// src/common/clock.rs

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

/// Fonte de "agora" para os serviços. Os jobs de calendário e as
/// auto-transições dependem do relógio, então ele é injetado.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Data corrente no fuso do negócio.
    fn today(&self, offset: FixedOffset) -> NaiveDate {
        self.now().with_timezone(&offset).date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Relógio parado, avançado manualmente (testes e reprocessamentos).
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { current: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut current) = self.current.lock() {
            *current = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn today_respects_the_business_offset() {
        // 02:00 UTC ainda é o dia anterior em UTC-3
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap());
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();

        assert_eq!(clock.today(brt), NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert_eq!(
            clock.today(FixedOffset::east_opt(0).unwrap()),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
        );
    }

    #[test]
    fn advance_moves_the_fixed_clock() {
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(5));
        assert_eq!(clock.now(), start + Duration::hours(5));
    }
}
