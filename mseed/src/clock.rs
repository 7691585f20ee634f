use chrono::{DateTime, Duration, Utc};

/// Places absolute timestamps on emitted records from a rational sample rate
/// `freqn / freqd` Hz.
///
/// The clock counts samples since the last [set_time](TickClock::set_time)
/// and converts tick offsets back to wall time without accumulating float
/// error.
#[derive(Clone, Debug)]
pub struct TickClock {
    start: DateTime<Utc>,
    ticks: i64,
    freqn: u32,
    freqd: u32,
}

impl TickClock {
    pub fn new(freqn: u32, freqd: u32) -> Self {
        Self {
            start: DateTime::<Utc>::UNIX_EPOCH,
            ticks: 0,
            freqn,
            freqd,
        }
    }

    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.start = time;
        self.ticks = 0;
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    pub fn freqn(&self) -> u32 {
        self.freqn
    }

    pub fn freqd(&self) -> u32 {
        self.freqd
    }

    /// Timestamp of the sample `tick_diff` ticks before the current position.
    ///
    /// `time_of(0)` is the timestamp of the next sample to arrive.
    pub fn time_of(&self, tick_diff: i64) -> DateTime<Utc> {
        let micros =
            (self.ticks - tick_diff) as i128 * self.freqd as i128 * 1_000_000 / self.freqn as i128;
        self.start + Duration::microseconds(micros as i64)
    }

    /// Whether a timestamp deviation stays within half a sample period.
    pub fn contiguous(&self, delta: Duration) -> bool {
        let Some(micros) = delta.num_microseconds() else {
            return false;
        };
        micros as i128 * self.freqn as i128 * 2 / self.freqd as i128 / 1_000_000 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tick_offsets_map_to_wall_time() {
        let mut clock = TickClock::new(100, 1);
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        clock.set_time(start);

        for _ in 0..250 {
            clock.tick();
        }

        assert_eq!(clock.time_of(250), start);
        assert_eq!(clock.time_of(0), start + Duration::milliseconds(2500));
        assert_eq!(clock.time_of(50), start + Duration::seconds(2));
    }

    #[test]
    fn fractional_rates_avoid_float_drift() {
        // 0.1 Hz: one sample every ten seconds.
        let mut clock = TickClock::new(1, 10);
        let start = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
        clock.set_time(start);
        for _ in 0..6 {
            clock.tick();
        }
        assert_eq!(clock.time_of(0), start + Duration::seconds(60));
    }

    #[test]
    fn contiguous_accepts_sub_half_sample_jitter() {
        let clock = TickClock::new(100, 1);
        assert!(clock.contiguous(Duration::microseconds(4_000)));
        assert!(clock.contiguous(Duration::microseconds(-4_000)));
        assert!(!clock.contiguous(Duration::microseconds(6_000)));
        assert!(!clock.contiguous(Duration::seconds(3)));
    }
}
